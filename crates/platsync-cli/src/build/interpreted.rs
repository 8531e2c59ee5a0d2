use super::{BuildArtifact, BuildContext, Invocation, Tool, MIME_ZIP};
use crate::errors::SyncError;
use crate::logger;
use crate::naming::interpreted_artifact_name;
use platsync_manifest::PlatformDescriptor;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// A platform shipped as an archive of its tracked sources
///
/// The archive is produced from `HEAD`, so untracked files and build
/// leftovers in the working tree never end up in it.
#[derive(Debug, Clone)]
pub struct InterpretedModule {
    dir: PathBuf,
}

impl InterpretedModule {
    pub fn new(dir: &Path) -> Self {
        InterpretedModule {
            dir: dir.to_path_buf(),
        }
    }

    pub fn build(
        &self,
        descriptor: &PlatformDescriptor,
        ctx: &BuildContext<'_>,
    ) -> Result<BuildArtifact, SyncError> {
        let module = descriptor.id.as_ref();

        let prefix = ctx.run_step(
            module,
            &Invocation::new(Tool::Git, ["rev-parse", "--show-prefix"], &self.dir),
        )?;
        let tree = tree_ish(&prefix.stdout_lossy());

        let output = ctx
            .dist_dir
            .join(interpreted_artifact_name(module, descriptor.version.as_str()));

        logger::debug(&format!("Archiving '{}' from {}", module, tree));
        let mut output_arg = OsString::from("--output=");
        output_arg.push(output.as_os_str());
        ctx.run_step(
            module,
            &Invocation::new(
                Tool::Git,
                [
                    OsString::from("archive"),
                    OsString::from("--format=zip"),
                    output_arg,
                    OsString::from(tree),
                ],
                &self.dir,
            ),
        )?;

        if !output.is_file() {
            return Err(SyncError::ArtifactNotFound {
                module: module.to_string(),
                path: output,
            });
        }

        Ok(BuildArtifact {
            path: output,
            mime: MIME_ZIP,
        })
    }
}

/// Tree of `HEAD` at the repository-relative `prefix` printed by `git rev-parse --show-prefix`
fn tree_ish(prefix: &str) -> String {
    let prefix = prefix.trim().trim_end_matches('/');
    if prefix.is_empty() {
        "HEAD".to_string()
    } else {
        format!("HEAD:{}", prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_ish() {
        assert_eq!(tree_ish("platforms/tidal/\n"), "HEAD:platforms/tidal");
        assert_eq!(tree_ish("\n"), "HEAD");
        assert_eq!(tree_ish(""), "HEAD");
    }
}
