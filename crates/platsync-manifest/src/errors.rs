use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// A version string that is not 2 or 3 dot-separated non-negative integers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("invalid version '{input}': empty component")]
    EmptyComponent { input: String },

    #[error("invalid version '{input}': component '{component}' is not a non-negative integer")]
    NonNumeric { input: String, component: String },

    #[error("invalid version '{input}': expected 2 or 3 components, found {found}")]
    ComponentCount { input: String, found: usize },
}

/// Errors raised while loading a platform's `info.json`
#[derive(Error, Debug)]
pub enum DescriptorError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{} is not valid JSON: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("descriptor must be a JSON object, found {found}")]
    NotAnObject { found: &'static str },

    #[error("missing required field '{field}'")]
    MissingField { field: &'static str },

    #[error("field '{field}' must be {expected}, found {found}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
        found: String,
    },

    #[error("field 'version': {0}")]
    Version(#[from] VersionError),
}

impl DescriptorError {
    /// Name of the offending descriptor field, when the error concerns one
    pub fn field(&self) -> Option<&'static str> {
        match self {
            DescriptorError::MissingField { field } | DescriptorError::WrongType { field, .. } => {
                Some(field)
            }
            DescriptorError::Version(_) => Some("version"),
            _ => None,
        }
    }
}

/// Errors that can occur during manifest operations
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to parse manifest: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Duplicate platform id '{0}' in manifest")]
    DuplicateId(String),

    #[error("Platform '{id}' has an invalid published version: {source}")]
    InvalidVersion {
        id: String,
        #[source]
        source: VersionError,
    },
}
