//! Publishing artifacts and the registry manifest
//!
//! A [`ReleaseStore`] is the remote side: it accepts artifact uploads and
//! holds a revisioned copy of the manifest. The [`Publisher`] drives it for
//! one run and guards the manifest commit with a compare-and-swap against
//! the revision seen when the run started.

pub mod github;
pub mod local;

pub use github::GithubReleaseStore;
pub use local::DirectoryReleaseStore;

use crate::build::BuildArtifact;
use crate::errors::StoreError;
use crate::logger;
use std::fmt;

/// Opaque revision marker of a stored file
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RevisionToken(pub String);

impl fmt::Display for RevisionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A stored file and the revision it was read at
#[derive(Debug, Clone)]
pub struct RemoteFile {
    pub content: Vec<u8>,
    pub revision: RevisionToken,
}

/// Reference to an uploaded asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRef {
    pub name: String,
    pub url: Option<String>,
}

/// Remote storage for release assets and the manifest document
pub trait ReleaseStore {
    /// Upload `bytes` as a release asset named `file_name`
    ///
    /// Uploading a name that already exists is rejected.
    fn upload_asset(
        &mut self,
        bytes: Vec<u8>,
        file_name: &str,
        mime: &str,
    ) -> Result<AssetRef, StoreError>;

    /// Current content and revision of a file, `None` if it does not exist
    fn get_file_revision(&mut self, path: &str) -> Result<Option<RemoteFile>, StoreError>;

    /// Replace a file if its revision is still `expected` (`None`: file must not exist)
    ///
    /// Returns the new revision, or [`StoreError::Conflict`] if the file changed.
    fn update_file(
        &mut self,
        path: &str,
        bytes: &[u8],
        expected: Option<&RevisionToken>,
        message: &str,
    ) -> Result<RevisionToken, StoreError>;
}

impl<S: ReleaseStore + ?Sized> ReleaseStore for Box<S> {
    fn upload_asset(
        &mut self,
        bytes: Vec<u8>,
        file_name: &str,
        mime: &str,
    ) -> Result<AssetRef, StoreError> {
        (**self).upload_asset(bytes, file_name, mime)
    }

    fn get_file_revision(&mut self, path: &str) -> Result<Option<RemoteFile>, StoreError> {
        (**self).get_file_revision(path)
    }

    fn update_file(
        &mut self,
        path: &str,
        bytes: &[u8],
        expected: Option<&RevisionToken>,
        message: &str,
    ) -> Result<RevisionToken, StoreError> {
        (**self).update_file(path, bytes, expected, message)
    }
}

/// Outcome of a manifest commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Updated(RevisionToken),
    /// The remote document already had identical content
    Unchanged,
}

/// Uploads artifacts and commits the manifest for one run
pub struct Publisher<S> {
    store: S,
    manifest_path: String,
    commit_message: String,
    /// Remote manifest revision when the run started; outer `None` until pinned
    pinned: Option<Option<RevisionToken>>,
}

impl<S: ReleaseStore> Publisher<S> {
    pub fn new(store: S, manifest_path: impl Into<String>, commit_message: impl Into<String>) -> Self {
        Publisher {
            store,
            manifest_path: manifest_path.into(),
            commit_message: commit_message.into(),
            pinned: None,
        }
    }

    pub fn manifest_path(&self) -> &str {
        &self.manifest_path
    }

    /// Upload a built artifact under its file name
    pub fn publish(&mut self, artifact: &BuildArtifact) -> Result<AssetRef, StoreError> {
        let bytes = std::fs::read(&artifact.path)?;
        let file_name = artifact.file_name();
        logger::debug(&format!(
            "Uploading {} ({} bytes, {})",
            file_name,
            bytes.len(),
            artifact.mime
        ));
        self.store.upload_asset(bytes, &file_name, artifact.mime)
    }

    /// Remember the remote manifest revision so a concurrent run can be detected at commit time
    pub fn pin_manifest_revision(&mut self) -> Result<Option<RevisionToken>, StoreError> {
        let revision = self
            .store
            .get_file_revision(&self.manifest_path)?
            .map(|file| file.revision);
        logger::debug(&format!(
            "Remote manifest revision at start: {}",
            revision.as_ref().map_or("<none>", |r| r.0.as_str())
        ));
        self.pinned = Some(revision.clone());
        Ok(revision)
    }

    /// Compare-and-swap the remote manifest
    pub fn commit_manifest(&mut self, bytes: &[u8]) -> Result<CommitOutcome, StoreError> {
        let current = self.store.get_file_revision(&self.manifest_path)?;
        let current_revision = current.as_ref().map(|file| file.revision.clone());

        if let Some(pinned) = &self.pinned {
            if *pinned != current_revision {
                return Err(StoreError::Conflict {
                    path: self.manifest_path.clone(),
                    expected: pinned.as_ref().map(|r| r.0.clone()),
                    found: current_revision.map(|r| r.0),
                });
            }
        }

        if current.as_ref().is_some_and(|file| file.content == bytes) {
            logger::info("Remote manifest already up to date");
            return Ok(CommitOutcome::Unchanged);
        }

        let revision = self.store.update_file(
            &self.manifest_path,
            bytes,
            current_revision.as_ref(),
            &self.commit_message,
        )?;
        self.pinned = Some(Some(revision.clone()));
        Ok(CommitOutcome::Updated(revision))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn new_publisher(dir: &TempDir) -> Publisher<DirectoryReleaseStore> {
        Publisher::new(
            DirectoryReleaseStore::new(dir.path().join("store")),
            "platforms.json",
            "update",
        )
    }

    #[test]
    fn test_commit_without_pin_creates_file() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let mut publisher = new_publisher(&temp_dir);
        let outcome = publisher.commit_manifest(b"[]\n");
        assert!(matches!(outcome, Ok(CommitOutcome::Updated(_))));

        let again = publisher.commit_manifest(b"[]\n");
        assert!(matches!(again, Ok(CommitOutcome::Unchanged)));
    }

    #[test]
    fn test_commit_detects_concurrent_update() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let mut publisher = new_publisher(&temp_dir);
        assert!(publisher.commit_manifest(b"[1]").is_ok());
        assert!(publisher.pin_manifest_revision().is_ok_and(|r| r.is_some()));

        // Another run commits in between
        let mut other = new_publisher(&temp_dir);
        assert!(other.commit_manifest(b"[2]").is_ok());

        let result = publisher.commit_manifest(b"[3]");
        assert!(matches!(result, Err(StoreError::Conflict { .. })));
    }

    #[test]
    fn test_publish_uses_artifact_file_name() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let artifact_path = temp_dir.path().join("tidal_1.0.0.zip");
        assert!(std::fs::write(&artifact_path, b"PK").is_ok());

        let mut publisher = new_publisher(&temp_dir);
        let artifact = BuildArtifact {
            path: artifact_path,
            mime: crate::build::MIME_ZIP,
        };
        assert!(publisher
            .publish(&artifact)
            .is_ok_and(|asset| asset.name == "tidal_1.0.0.zip"));
        assert!(matches!(
            publisher.publish(&artifact),
            Err(StoreError::Rejected { .. })
        ));
    }
}
