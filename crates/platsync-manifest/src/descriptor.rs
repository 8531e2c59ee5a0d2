//! Platform descriptor loading
//!
//! Every platform directory carries an `info.json` describing the platform.
//! The document is validated field by field so that the first problem can be
//! reported by name instead of falling back to defaults.

use crate::errors::DescriptorError;
use crate::version::Version;
use serde_json::{Map, Number, Value};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// File name of the per-platform metadata document
pub const DESCRIPTOR_FILE: &str = "info.json";

/// Validated metadata of one platform module
#[derive(Debug, Clone)]
pub struct PlatformDescriptor {
    pub id: Arc<str>,
    pub name: Arc<str>,
    pub description: Arc<str>,
    pub version: Version,
    pub max_threads: u32,
    pub requires_auth: bool,
    /// Host ABI version the platform targets, kept as the exact JSON number
    pub supported_version: Number,
    pub author: Arc<str>,
}

impl PlatformDescriptor {
    /// Read and validate `info.json` from a platform directory
    pub fn load(platform_dir: &Path) -> Result<Self, DescriptorError> {
        let path = platform_dir.join(DESCRIPTOR_FILE);
        debug!("Loading platform descriptor: {:?}", path);

        let content = std::fs::read_to_string(&path).map_err(|source| DescriptorError::Read {
            path: path.clone(),
            source,
        })?;
        let value: Value = serde_json::from_str(&content)
            .map_err(|source| DescriptorError::Json { path, source })?;

        Self::from_value(&value)
    }

    /// Validate an already-parsed descriptor document
    pub fn from_value(value: &Value) -> Result<Self, DescriptorError> {
        let object = value.as_object().ok_or(DescriptorError::NotAnObject {
            found: json_type(value),
        })?;

        let id = string_field(object, "id")?;
        let name = string_field(object, "name")?;
        let version = string_field(object, "version")?;
        let description = string_field(object, "description")?;
        let max_threads = max_threads_field(object)?;
        let requires_auth = match required(object, "requiresAuth")? {
            Value::Bool(b) => *b,
            other => return Err(wrong_type("requiresAuth", "a boolean", other)),
        };
        let supported_version = match required(object, "supportedVersion")? {
            Value::Number(n) => n.clone(),
            other => return Err(wrong_type("supportedVersion", "a number", other)),
        };
        let author = string_field(object, "author")?;

        let version = Version::parse(&version)?;

        Ok(PlatformDescriptor {
            id,
            name,
            description,
            version,
            max_threads,
            requires_auth,
            supported_version,
            author,
        })
    }
}

fn required<'a>(object: &'a Map<String, Value>, field: &'static str) -> Result<&'a Value, DescriptorError> {
    object
        .get(field)
        .ok_or(DescriptorError::MissingField { field })
}

fn string_field(object: &Map<String, Value>, field: &'static str) -> Result<Arc<str>, DescriptorError> {
    match required(object, field)? {
        Value::String(s) => Ok(Arc::from(s.as_str())),
        other => Err(wrong_type(field, "a string", other)),
    }
}

fn max_threads_field(object: &Map<String, Value>) -> Result<u32, DescriptorError> {
    let field = "maxThreads";
    let value = required(object, field)?;
    let Value::Number(n) = value else {
        return Err(wrong_type(field, "a number", value));
    };

    // Integral floats such as `4.0` are accepted, the schema only asks for a number
    let integral = n
        .as_u64()
        .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64));

    integral
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(|| wrong_type(field, "a non-negative integer", value))
}

fn wrong_type(field: &'static str, expected: &'static str, found: &Value) -> DescriptorError {
    let found = match found {
        Value::Number(n) => format!("number {}", n),
        other => json_type(other).to_string(),
    };
    DescriptorError::WrongType {
        field,
        expected,
        found,
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::VersionError;
    use serde_json::json;
    use tempfile::TempDir;

    fn sample() -> Value {
        json!({
            "id": "tidal",
            "name": "Tidal",
            "description": "Tags from Tidal",
            "version": "1.0.0",
            "maxThreads": 4,
            "requiresAuth": true,
            "supportedVersion": 39,
            "author": "Marekkon5"
        })
    }

    #[test]
    fn test_valid_descriptor() {
        let descriptor = PlatformDescriptor::from_value(&sample());
        assert!(descriptor.is_ok(), "{:?}", descriptor.err());
        let Ok(descriptor) = descriptor else { return };

        assert_eq!(descriptor.id.as_ref(), "tidal");
        assert_eq!(descriptor.version.as_str(), "1.0.0");
        assert_eq!(descriptor.max_threads, 4);
        assert!(descriptor.requires_auth);
        assert_eq!(descriptor.supported_version, Number::from(39));
    }

    #[test]
    fn test_missing_requires_auth_is_named() {
        let mut value = sample();
        if let Some(object) = value.as_object_mut() {
            object.remove("requiresAuth");
        }
        let err = PlatformDescriptor::from_value(&value).err();
        assert!(matches!(
            err,
            Some(DescriptorError::MissingField { field: "requiresAuth" })
        ));
        assert_eq!(err.and_then(|e| e.field()), Some("requiresAuth"));
    }

    #[test]
    fn test_wrong_types_are_named() {
        let cases = [
            ("id", json!(5), "id"),
            ("maxThreads", json!("4"), "maxThreads"),
            ("requiresAuth", json!("yes"), "requiresAuth"),
            ("supportedVersion", json!("39"), "supportedVersion"),
            ("author", json!(null), "author"),
        ];
        for (key, bad, expected_field) in cases {
            let mut value = sample();
            value[key] = bad;
            let err = PlatformDescriptor::from_value(&value).err();
            assert_eq!(err.and_then(|e| e.field()), Some(expected_field), "{key}");
        }
    }

    #[test]
    fn test_max_threads_must_be_non_negative_integer() {
        let mut value = sample();
        value["maxThreads"] = json!(-1);
        assert!(PlatformDescriptor::from_value(&value).is_err());

        value["maxThreads"] = json!(1.5);
        assert!(PlatformDescriptor::from_value(&value).is_err());

        value["maxThreads"] = json!(0);
        assert!(PlatformDescriptor::from_value(&value).is_ok_and(|d| d.max_threads == 0));
    }

    #[test]
    fn test_malformed_version_is_a_validation_error() {
        let mut value = sample();
        value["version"] = json!("1.0-beta");
        assert!(matches!(
            PlatformDescriptor::from_value(&value),
            Err(DescriptorError::Version(VersionError::NonNumeric { .. }))
        ));
    }

    #[test]
    fn test_non_object_document() {
        assert!(matches!(
            PlatformDescriptor::from_value(&json!([1, 2])),
            Err(DescriptorError::NotAnObject { found: "array" })
        ));
    }

    #[test]
    fn test_load_from_directory() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        let written = std::fs::write(
            temp_dir.path().join(DESCRIPTOR_FILE),
            sample().to_string(),
        );
        assert!(written.is_ok());

        let descriptor = PlatformDescriptor::load(temp_dir.path());
        assert!(descriptor.is_ok_and(|d| d.name.as_ref() == "Tidal"));
    }

    #[test]
    fn test_load_missing_file() {
        let Ok(temp_dir) = TempDir::new() else {
            return;
        };
        assert!(matches!(
            PlatformDescriptor::load(temp_dir.path()),
            Err(DescriptorError::Read { .. })
        ));
    }
}
