//! Manifest serialization
//!
//! The registry is written as pretty-printed JSON with 4-space indentation,
//! non-ASCII characters kept as UTF-8, and a trailing newline. Writes go to
//! a sibling temp file which is then renamed over the target.

use crate::errors::ManifestError;
use crate::types::Manifest;
use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

const INDENT: &[u8] = b"    ";

/// Serialize a manifest to its on-disk bytes
pub fn to_json_bytes(manifest: &Manifest) -> Result<Vec<u8>, ManifestError> {
    let mut buf = Vec::with_capacity(4 * 1024);
    let formatter = PrettyFormatter::with_indent(INDENT);
    let mut serializer = Serializer::with_formatter(&mut buf, formatter);
    manifest.serialize(&mut serializer)?;
    buf.push(b'\n');
    Ok(buf)
}

/// Write manifest to `output_path`, replacing it atomically
pub fn write_atomic(manifest: &Manifest, output_path: &Path) -> Result<(), ManifestError> {
    debug!("Writing manifest to: {:?}", output_path);

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let content = to_json_bytes(manifest)?;

    let temp_path = output_path.with_extension("json.tmp");
    {
        let file = std::fs::File::create(&temp_path)?;
        let mut writer = std::io::BufWriter::with_capacity(64 * 1024, file);
        writer.write_all(&content)?;
        writer.flush()?;
    }

    std::fs::rename(&temp_path, output_path)?;

    info!(
        "Manifest written to {:?} ({} platforms)",
        output_path,
        manifest.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Language, ManifestEntry, VersionHistory};
    use serde_json::Number;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn entry(id: &str) -> ManifestEntry {
        let mut versions = VersionHistory::new();
        versions.record(Arc::from("1.0.0"), Number::from(39));
        ManifestEntry {
            id: Arc::from(id),
            name: Arc::from("Beatport"),
            description: Arc::from("Hudební štítky"),
            max_threads: 0,
            requires_auth: false,
            language: Language::Native,
            author: Arc::from("Marekkon5"),
            versions,
            version: Arc::from("1.0.0"),
        }
    }

    #[test]
    fn test_layout_and_key_order() {
        let mut manifest = Manifest::default();
        manifest.entries.push(entry("beatport"));
        manifest.rebuild_indexes();

        let bytes = to_json_bytes(&manifest).unwrap_or_default();
        let text = String::from_utf8(bytes).unwrap_or_default();

        let expected = r#"[
    {
        "id": "beatport",
        "name": "Beatport",
        "description": "Hudební štítky",
        "maxThreads": 0,
        "requiresAuth": false,
        "language": "rust",
        "author": "Marekkon5",
        "versions": {
            "1.0.0": 39
        },
        "version": "1.0.0"
    }
]
"#;
        assert_eq!(text, expected);
    }

    #[test]
    fn test_write_and_read_back() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let path = temp_dir.path().join("nested").join("platforms.json");

        let mut manifest = Manifest::default();
        manifest.entries.push(entry("a"));
        manifest.entries.push(entry("b"));
        manifest.rebuild_indexes();

        assert!(write_atomic(&manifest, &path).is_ok());
        assert!(!path.with_extension("json.tmp").exists());

        let loaded = Manifest::load_from_path(&path);
        assert!(loaded.is_ok());
        let loaded = loaded.unwrap_or_default();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.entries, manifest.entries);
        assert!(loaded.get("b").is_some());
    }

    #[test]
    fn test_missing_file_loads_empty() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let loaded = Manifest::load_from_path(&temp_dir.path().join("absent.json"));
        assert!(loaded.is_ok_and(|m| m.is_empty()));
    }
}
