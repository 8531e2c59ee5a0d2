//! Error types for the release pipeline
//!
//! Every error aborts the whole run. Errors raised while a platform is being
//! processed carry its id so the operator knows where to look.

use platsync_config::ConfigError;
use platsync_manifest::{DescriptorError, ManifestError, VersionError};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors reported by a release store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("rejected by release store: {reason}")]
    Rejected { status: Option<u16>, reason: String },

    #[error("revision of '{path}' changed (expected {}, found {})", display_rev(.expected), display_rev(.found))]
    Conflict {
        path: String,
        expected: Option<String>,
        found: Option<String>,
    },

    #[error("release '{0}' not found")]
    ReleaseNotFound(String),

    #[error("invalid credentials: {0}")]
    Credentials(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected response from release store: {0}")]
    InvalidResponse(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

fn display_rev(rev: &Option<String>) -> &str {
    rev.as_deref().unwrap_or("<none>")
}

/// Errors that abort a sync run
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("platform '{module}': invalid version: {source}")]
    Validation {
        module: String,
        #[source]
        source: VersionError,
    },

    #[error("platform '{module}': invalid descriptor: {source}")]
    Schema {
        module: String,
        #[source]
        source: DescriptorError,
    },

    #[error("platform '{module}': `{step}` failed ({reason})")]
    Build {
        module: String,
        step: String,
        reason: String,
    },

    #[error("platform '{module}': could not start `{step}`: {source}")]
    Spawn {
        module: String,
        step: String,
        #[source]
        source: io::Error,
    },

    #[error("platform '{module}': build artifact not found at {}", path.display())]
    ArtifactNotFound { module: String, path: PathBuf },

    #[error("platform '{module}': failed to handle artifact {}: {source}", path.display())]
    Artifact {
        module: String,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("platform '{module}': upload of '{asset}' failed: {source}")]
    Publish {
        module: String,
        asset: String,
        #[source]
        source: StoreError,
    },

    #[error("manifest commit conflict, another run updated it: {0}")]
    Conflict(#[source] StoreError),

    #[error("manifest commit failed: {0}")]
    Commit(#[source] StoreError),

    #[error("release store unavailable: {0}")]
    Store(#[source] StoreError),

    #[error("platform '{0}' is not in the manifest")]
    UnknownPlatform(String),

    #[error("failed to list platforms in {}: {source}", path.display())]
    Discovery {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Unsupported host: {0}")]
    UnsupportedHost(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl SyncError {
    /// Id (or directory name) of the platform the error is about
    pub fn module(&self) -> Option<&str> {
        match self {
            SyncError::Validation { module, .. }
            | SyncError::Schema { module, .. }
            | SyncError::Build { module, .. }
            | SyncError::Spawn { module, .. }
            | SyncError::ArtifactNotFound { module, .. }
            | SyncError::Artifact { module, .. }
            | SyncError::Publish { module, .. } => Some(module),
            _ => None,
        }
    }

    /// Attach a platform to a descriptor error, splitting out version problems
    pub fn descriptor(module: &str, err: DescriptorError) -> Self {
        match err {
            DescriptorError::Version(source) => SyncError::Validation {
                module: module.to_string(),
                source,
            },
            source => SyncError::Schema {
                module: module.to_string(),
                source,
            },
        }
    }

    /// Attach a platform to a manifest error raised while deciding eligibility
    pub fn manifest(module: &str, err: ManifestError) -> Self {
        match err {
            ManifestError::InvalidVersion { source, .. } => SyncError::Validation {
                module: module.to_string(),
                source,
            },
            other => SyncError::Manifest(other),
        }
    }

    /// Map a failed manifest commit, keeping conflicts distinguishable
    pub fn commit(err: StoreError) -> Self {
        match err {
            conflict @ StoreError::Conflict { .. } => SyncError::Conflict(conflict),
            other => SyncError::Commit(other),
        }
    }
}
