//! Platform Registry Manifest
//!
//! This crate holds the data side of platform publishing: dotted version
//! ordering, validated platform descriptors (`info.json`), and the
//! `platforms.json` registry with its append-only release history.
//!
//! The registry is a JSON array of entries, one per platform id. An entry's
//! `versions` map is never pruned, and `version` always names its newest key.

pub mod descriptor;
pub mod errors;
pub mod manifest;
pub mod manifest_writer;
pub mod types;
pub mod version;

pub use descriptor::{PlatformDescriptor, DESCRIPTOR_FILE};
pub use errors::{DescriptorError, ManifestError, VersionError};
pub use manifest::Eligibility;
pub use types::{Language, Manifest, ManifestEntry, VersionHistory};
pub use version::{compare_versions, Version};
