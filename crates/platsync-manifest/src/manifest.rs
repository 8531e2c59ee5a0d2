//! Manifest operations - loading, saving, and the release update policy
//!
//! A manifest is loaded once at the start of a run, mutated in place while
//! platforms are processed, and written back wholesale at the end.

use crate::descriptor::PlatformDescriptor;
use crate::errors::{ManifestError, VersionError};
use crate::manifest_writer;
use crate::types::{Language, Manifest, ManifestEntry, VersionHistory};
use crate::version::Version;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

/// Whether a loaded descriptor should be released
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Eligibility {
    /// The platform id is not in the manifest yet
    New,
    /// The descriptor is strictly newer than the published version
    Upgrade { previous: Arc<str> },
    /// The descriptor is not newer than the published version
    UpToDate { published: Arc<str> },
}

impl Eligibility {
    pub fn is_eligible(&self) -> bool {
        !matches!(self, Eligibility::UpToDate { .. })
    }
}

impl Manifest {
    /// Load manifest from a path, returning an empty manifest if the file doesn't exist
    pub fn load_from_path(path: &Path) -> Result<Self, ManifestError> {
        if !path.exists() {
            debug!("No manifest at {:?}, starting empty", path);
            return Ok(Manifest::default());
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Parse a manifest document and rebuild its index
    pub fn from_json_str(content: &str) -> Result<Self, ManifestError> {
        let mut manifest: Manifest = serde_json::from_str(content)?;
        if let Some(duplicate) = manifest.rebuild_indexes() {
            return Err(ManifestError::DuplicateId(duplicate.to_string()));
        }
        manifest.check_current_versions();
        Ok(manifest)
    }

    /// Save manifest to a specific path with atomic write
    pub fn save_to_path(&self, path: &Path) -> Result<(), ManifestError> {
        manifest_writer::write_atomic(self, path)
    }

    /// Serialize to the on-disk representation
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, ManifestError> {
        manifest_writer::to_json_bytes(self)
    }

    /// O(1) entry lookup by platform id
    #[inline]
    pub fn get(&self, id: &str) -> Option<&ManifestEntry> {
        self.index.get(id).and_then(|&idx| self.entries.get(idx))
    }

    #[inline]
    fn get_mut(&mut self, id: &str) -> Option<&mut ManifestEntry> {
        self.index
            .get(id)
            .copied()
            .and_then(move |idx| self.entries.get_mut(idx))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ManifestEntry> {
        self.entries.iter()
    }

    /// Entries in publication order
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// Decide whether a descriptor is new or strictly newer than what is published
    pub fn eligibility(&self, descriptor: &PlatformDescriptor) -> Result<Eligibility, ManifestError> {
        let Some(existing) = self.get(&descriptor.id) else {
            return Ok(Eligibility::New);
        };

        let published =
            Version::parse(&existing.version).map_err(|source| ManifestError::InvalidVersion {
                id: existing.id.to_string(),
                source,
            })?;

        if descriptor.version > published {
            Ok(Eligibility::Upgrade {
                previous: existing.version.clone(),
            })
        } else {
            Ok(Eligibility::UpToDate {
                published: existing.version.clone(),
            })
        }
    }

    /// Record a release of `descriptor` in the manifest
    ///
    /// New ids get a fresh entry. Existing entries gain the version in their
    /// history and have every descriptor field refreshed; no history key is
    /// ever removed.
    pub fn record_release(&mut self, descriptor: &PlatformDescriptor, language: Language) {
        let version = descriptor.version.as_arc();

        if let Some(entry) = self.get_mut(&descriptor.id) {
            entry
                .versions
                .record(version.clone(), descriptor.supported_version.clone());
            entry.version = version;
            entry.name = descriptor.name.clone();
            entry.description = descriptor.description.clone();
            entry.max_threads = descriptor.max_threads;
            entry.requires_auth = descriptor.requires_auth;
            entry.language = language;
            entry.author = descriptor.author.clone();
            return;
        }

        let mut versions = VersionHistory::new();
        versions.record(version.clone(), descriptor.supported_version.clone());

        let idx = self.entries.len();
        self.entries.push(ManifestEntry {
            id: descriptor.id.clone(),
            name: descriptor.name.clone(),
            description: descriptor.description.clone(),
            max_threads: descriptor.max_threads,
            requires_auth: descriptor.requires_auth,
            language,
            author: descriptor.author.clone(),
            versions,
            version,
        });
        self.index.insert(descriptor.id.clone(), idx);
    }

    /// Warn about entries whose current version is not the greatest history key
    fn check_current_versions(&self) {
        for entry in &self.entries {
            match latest_in_history(&entry.versions) {
                Ok(Some(latest)) if latest.as_str() != entry.version.as_ref() => {
                    let same = Version::parse(&entry.version).is_ok_and(|v| v == latest);
                    if !same {
                        warn!(
                            "Platform '{}' lists version {} but its history goes up to {}",
                            entry.id, entry.version, latest
                        );
                    }
                }
                Ok(_) => {}
                Err(e) => warn!("Platform '{}' has a malformed history key: {}", entry.id, e),
            }
        }
    }
}

fn latest_in_history(history: &VersionHistory) -> Result<Option<Version>, VersionError> {
    let mut latest: Option<Version> = None;
    for (key, _) in history.iter() {
        let version = Version::parse(key)?;
        if latest.as_ref().map_or(true, |l| version > *l) {
            latest = Some(version);
        }
    }
    Ok(latest)
}
