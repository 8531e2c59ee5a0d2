//! Published artifact file names
//!
//! - Interpreted: `{id}_{version}.zip`
//! - Native: `{id}_{version}_{os}_{arch}.{ext}`
//!
//! Names depend only on their inputs, so every host publishing the same
//! platform version agrees on them.

use platsync_config::HostPlatform;
use platsync_manifest::Language;

pub const ARCHIVE_EXTENSION: &str = "zip";

/// Name of the source archive of an interpreted platform
pub fn interpreted_artifact_name(id: &str, version: &str) -> String {
    format!("{}_{}.{}", id, version, ARCHIVE_EXTENSION)
}

/// Name of the shared library of a native platform built on `host`
pub fn native_artifact_name(id: &str, version: &str, host: &HostPlatform) -> String {
    format!(
        "{}_{}_{}_{}.{}",
        id,
        version,
        host.os.label(),
        host.arch,
        host.os.library_extension()
    )
}

/// Artifact name for either kind; native names need a host
pub fn artifact_name(
    id: &str,
    version: &str,
    language: Language,
    host: Option<&HostPlatform>,
) -> Option<String> {
    match language {
        Language::Interpreted => Some(interpreted_artifact_name(id, version)),
        Language::Native => host.map(|h| native_artifact_name(id, version, h)),
    }
}
