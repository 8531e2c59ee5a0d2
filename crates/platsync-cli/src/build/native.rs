use super::{BuildArtifact, BuildContext, Invocation, Tool, MIME_OCTET_STREAM, NATIVE_MARKER};
use crate::errors::SyncError;
use crate::logger;
use crate::naming::native_artifact_name;
use platsync_manifest::PlatformDescriptor;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct CargoManifest {
    package: Option<CargoPackage>,
    lib: Option<CargoLib>,
}

#[derive(Debug, Deserialize)]
struct CargoPackage {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CargoLib {
    name: Option<String>,
}

/// A platform compiled to a shared library with cargo
#[derive(Debug, Clone)]
pub struct NativeModule {
    dir: PathBuf,
}

impl NativeModule {
    pub fn new(dir: &Path) -> Self {
        NativeModule {
            dir: dir.to_path_buf(),
        }
    }

    /// Library crate name: `[lib].name` when declared, else the package name
    /// with hyphens replaced by underscores
    pub fn library_name(&self) -> Result<String, String> {
        let path = self.dir.join(NATIVE_MARKER);
        let content = std::fs::read_to_string(&path)
            .map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
        let manifest: CargoManifest = toml::from_str(&content)
            .map_err(|e| format!("failed to parse {}: {}", path.display(), e))?;

        if let Some(name) = manifest.lib.and_then(|lib| lib.name) {
            return Ok(name.replace('-', "_"));
        }
        manifest
            .package
            .map(|pkg| pkg.name.replace('-', "_"))
            .ok_or_else(|| format!("{} has no [package] name", path.display()))
    }

    pub fn build(
        &self,
        descriptor: &PlatformDescriptor,
        ctx: &BuildContext<'_>,
    ) -> Result<BuildArtifact, SyncError> {
        let module = descriptor.id.as_ref();
        let host = ctx.host.ok_or_else(|| {
            SyncError::UnsupportedHost(format!(
                "cannot build native platform '{}' on {}",
                module,
                std::env::consts::OS
            ))
        })?;

        logger::debug(&format!("Refreshing dependency lock for '{}'", module));
        ctx.run_step(module, &Invocation::new(Tool::Cargo, ["update"], &self.dir))?;

        logger::debug(&format!("Compiling '{}' in release mode", module));
        ctx.run_step(
            module,
            &Invocation::new(Tool::Cargo, ["build", "--release"], &self.dir),
        )?;

        let lib_name = self.library_name().map_err(|reason| SyncError::Build {
            module: module.to_string(),
            step: "resolve library name".to_string(),
            reason,
        })?;

        let built = self
            .dir
            .join("target")
            .join("release")
            .join(host.os.library_file_name(&lib_name));
        if !built.is_file() {
            return Err(SyncError::ArtifactNotFound {
                module: module.to_string(),
                path: built,
            });
        }

        let output = ctx.dist_dir.join(native_artifact_name(
            module,
            descriptor.version.as_str(),
            host,
        ));
        std::fs::copy(&built, &output).map_err(|source| SyncError::Artifact {
            module: module.to_string(),
            path: output.clone(),
            source,
        })?;

        logger::debug(&format!(
            "Copied {} to {}",
            built.display(),
            output.display()
        ));

        Ok(BuildArtifact {
            path: output,
            mime: MIME_OCTET_STREAM,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn module_with(cargo_toml: &str) -> Option<(TempDir, NativeModule)> {
        let temp_dir = TempDir::new().ok()?;
        std::fs::write(temp_dir.path().join(NATIVE_MARKER), cargo_toml).ok()?;
        let module = NativeModule::new(temp_dir.path());
        Some((temp_dir, module))
    }

    #[test]
    fn test_library_name_from_package() {
        let Some((_dir, module)) = module_with("[package]\nname = \"onetagger-platform-deezer\"\n") else {
            return;
        };
        assert_eq!(
            module.library_name().ok().as_deref(),
            Some("onetagger_platform_deezer")
        );
    }

    #[test]
    fn test_library_name_prefers_lib_section() {
        let Some((_dir, module)) = module_with(
            "[package]\nname = \"deezer\"\n\n[lib]\nname = \"deezer-plugin\"\ncrate-type = [\"cdylib\"]\n",
        ) else {
            return;
        };
        assert_eq!(module.library_name().ok().as_deref(), Some("deezer_plugin"));
    }

    #[test]
    fn test_library_name_without_package() {
        let Some((_dir, module)) = module_with("[workspace]\nmembers = []\n") else {
            return;
        };
        assert!(module.library_name().is_err());
    }
}
