//! Release store backed by a local directory
//!
//! Layout:
//! ```text
//! <root>/assets/<file name>     uploaded artifacts
//! <root>/<manifest path>        committed manifest
//! ```
//! The revision of a file is the hex SHA-256 of its content.

use super::{AssetRef, ReleaseStore, RemoteFile, RevisionToken};
use crate::errors::StoreError;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

pub const ASSETS_DIR: &str = "assets";

#[derive(Debug, Clone)]
pub struct DirectoryReleaseStore {
    root: PathBuf,
}

impl DirectoryReleaseStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirectoryReleaseStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.root.join(ASSETS_DIR)
    }

    /// Names of all uploaded assets, sorted
    pub fn asset_names(&self) -> Result<Vec<String>, StoreError> {
        let dir = self.assets_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }

    fn file_path(&self, path: &str) -> Result<PathBuf, StoreError> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, std::path::Component::Normal(_)))
        {
            return Err(StoreError::Rejected {
                status: None,
                reason: format!("path '{}' escapes the store", path),
            });
        }
        Ok(self.root.join(relative))
    }
}

pub fn revision_of(bytes: &[u8]) -> RevisionToken {
    RevisionToken(hex::encode(Sha256::digest(bytes)))
}

impl ReleaseStore for DirectoryReleaseStore {
    fn upload_asset(
        &mut self,
        bytes: Vec<u8>,
        file_name: &str,
        _mime: &str,
    ) -> Result<AssetRef, StoreError> {
        let target = self.file_path(&format!("{}/{}", ASSETS_DIR, file_name))?;
        if target.exists() {
            return Err(StoreError::Rejected {
                status: None,
                reason: format!("asset '{}' already exists", file_name),
            });
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, bytes)?;
        Ok(AssetRef {
            name: file_name.to_string(),
            url: Some(target.display().to_string()),
        })
    }

    fn get_file_revision(&mut self, path: &str) -> Result<Option<RemoteFile>, StoreError> {
        let target = self.file_path(path)?;
        if !target.is_file() {
            return Ok(None);
        }
        let content = fs::read(&target)?;
        let revision = revision_of(&content);
        Ok(Some(RemoteFile { content, revision }))
    }

    fn update_file(
        &mut self,
        path: &str,
        bytes: &[u8],
        expected: Option<&RevisionToken>,
        _message: &str,
    ) -> Result<RevisionToken, StoreError> {
        let target = self.file_path(path)?;
        let current = self.get_file_revision(path)?.map(|file| file.revision);
        if current.as_ref() != expected {
            return Err(StoreError::Conflict {
                path: path.to_string(),
                expected: expected.map(|r| r.0.clone()),
                found: current.map(|r| r.0),
            });
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut tmp = target.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, &target)?;
        Ok(revision_of(bytes))
    }
}
