//! Registry types persisted in `platforms.json`
//!
//! This module provides:
//! - `Manifest`, the ordered list of published platforms with an id index
//! - `ManifestEntry`, one published platform and its release history
//! - `VersionHistory`, an insertion-ordered map of version -> supported host version

use ahash::AHashMap;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Number;
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

// =============================================================================
// MANIFEST - Ordered entries with index for O(1) lookup
// =============================================================================

/// The published platform registry
///
/// Serialized as a bare JSON array of entries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    /// Kept in step with `index`; read through [`Manifest::entries`]
    pub(crate) entries: Vec<ManifestEntry>,

    /// Runtime only - rebuilt on load for O(1) lookup by id
    #[serde(skip)]
    pub(crate) index: AHashMap<Arc<str>, usize>,
}

impl Manifest {
    /// Rebuild the id index after the entry list was replaced
    ///
    /// Returns the first id that occurs more than once, if any.
    pub fn rebuild_indexes(&mut self) -> Option<Arc<str>> {
        self.index.clear();
        self.index.reserve(self.entries.len());
        let mut duplicate = None;
        for (idx, entry) in self.entries.iter().enumerate() {
            if self.index.insert(entry.id.clone(), idx).is_some() && duplicate.is_none() {
                duplicate = Some(entry.id.clone());
            }
        }
        duplicate
    }
}

// =============================================================================
// ENTRY
// =============================================================================

/// Implementation kind of a platform, derived from its build markers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    /// Compiled to a shared library with cargo
    #[serde(rename = "rust")]
    Native,
    /// Shipped as a source archive
    #[serde(rename = "python")]
    Interpreted,
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::Native => f.write_str("rust"),
            Language::Interpreted => f.write_str("python"),
        }
    }
}

/// One published platform
///
/// Field order here is the key order of the serialized entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestEntry {
    pub id: Arc<str>,
    pub name: Arc<str>,
    pub description: Arc<str>,
    pub max_threads: u32,
    pub requires_auth: bool,
    pub language: Language,
    pub author: Arc<str>,
    pub versions: VersionHistory,
    /// Current published version, always the greatest key of `versions`
    pub version: Arc<str>,
}

// =============================================================================
// VERSION HISTORY - append-or-update only
// =============================================================================

/// Every version ever published for a platform, in first-seen order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VersionHistory {
    releases: SmallVec<[(Arc<str>, Number); 4]>,
}

impl VersionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a release, or overwrite the supported host version of an existing key
    pub fn record(&mut self, version: Arc<str>, supported_version: Number) {
        if let Some(slot) = self.releases.iter_mut().find(|(v, _)| *v == version) {
            slot.1 = supported_version;
        } else {
            self.releases.push((version, supported_version));
        }
    }

    pub fn get(&self, version: &str) -> Option<&Number> {
        self.releases
            .iter()
            .find(|(v, _)| v.as_ref() == version)
            .map(|(_, n)| n)
    }

    pub fn contains(&self, version: &str) -> bool {
        self.get(version).is_some()
    }

    pub fn len(&self) -> usize {
        self.releases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.releases.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Number)> {
        self.releases.iter().map(|(v, n)| (v.as_ref(), n))
    }
}

impl Serialize for VersionHistory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.releases.len()))?;
        for (version, supported) in &self.releases {
            map.serialize_entry(version.as_ref(), supported)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for VersionHistory {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct HistoryVisitor;

        impl<'de> Visitor<'de> for HistoryVisitor {
            type Value = VersionHistory;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of version strings to supported host versions")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut history = VersionHistory::new();
                while let Some((version, supported)) = access.next_entry::<String, Number>()? {
                    history.record(Arc::from(version), supported);
                }
                Ok(history)
            }
        }

        deserializer.deserialize_map(HistoryVisitor)
    }
}
