//! Dotted platform versions
//!
//! Platform versions are `MAJOR.MINOR` or `MAJOR.MINOR.PATCH`. A missing patch
//! component compares equal to `0`, so `1.2` and `1.2.0` name the same release.

use crate::errors::VersionError;
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// A parsed platform version that keeps its original spelling
#[derive(Debug, Clone)]
pub struct Version {
    raw: Arc<str>,
    parts: (u64, u64, u64),
}

impl Version {
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let mut parts = [0u64; 3];
        let mut count = 0;

        for component in input.split('.') {
            if count == 3 {
                return Err(VersionError::ComponentCount {
                    input: input.to_string(),
                    found: input.split('.').count(),
                });
            }
            if component.is_empty() {
                return Err(VersionError::EmptyComponent {
                    input: input.to_string(),
                });
            }
            // u64::from_str accepts a leading '+', which is not a version digit
            if !component.bytes().all(|b| b.is_ascii_digit()) {
                return Err(VersionError::NonNumeric {
                    input: input.to_string(),
                    component: component.to_string(),
                });
            }
            parts[count] = component
                .parse()
                .map_err(|_| VersionError::NonNumeric {
                    input: input.to_string(),
                    component: component.to_string(),
                })?;
            count += 1;
        }

        if count < 2 {
            return Err(VersionError::ComponentCount {
                input: input.to_string(),
                found: count,
            });
        }

        Ok(Version {
            raw: Arc::from(input),
            parts: (parts[0], parts[1], parts[2]),
        })
    }

    /// The version exactly as written in the descriptor
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn as_arc(&self) -> Arc<str> {
        self.raw.clone()
    }

    /// `(major, minor, patch)` with a missing patch normalized to zero
    pub fn normalized(&self) -> (u64, u64, u64) {
        self.parts
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.parts == other.parts
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.parts.cmp(&other.parts)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl std::str::FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

/// Compare two version strings, failing if either is malformed
pub fn compare_versions(a: &str, b: &str) -> Result<Ordering, VersionError> {
    Ok(Version::parse(a)?.cmp(&Version::parse(b)?))
}
