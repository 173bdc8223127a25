//! Package-related type definitions

use crate::{Version, VersionSpec};
use kiln_errors::VersionError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a package
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PackageId {
    pub name: String,
    pub version: Version,
}

impl PackageId {
    /// Create a new package ID
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }
}

impl fmt::Display for PackageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.name, self.version)
    }
}

/// Package specification with optional version constraints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageSpec {
    pub name: String,
    pub version_spec: VersionSpec,
}

impl PackageSpec {
    /// Create a spec that accepts any version of `name`
    pub fn any(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version_spec: VersionSpec::any(),
        }
    }

    /// Parse a package spec from a string (e.g., "flask>=2.0,<3.0")
    ///
    /// # Errors
    ///
    /// Returns `VersionError` if the name is empty or contains characters
    /// outside `[A-Za-z0-9._-]`, or if the version constraints are malformed.
    pub fn parse(s: &str) -> Result<Self, VersionError> {
        let s = s.trim();
        let split_pos = s.find(['=', '>', '<', '!', '~']);

        let (name, version_str) = match split_pos {
            Some(pos) => (s[..pos].trim(), s[pos..].trim()),
            // No version constraint means any version
            None => (s, "*"),
        };

        if !is_valid_name(name) {
            return Err(VersionError::InvalidConstraint {
                input: s.to_string(),
            });
        }

        Ok(Self {
            name: name.to_string(),
            version_spec: version_str.parse()?,
        })
    }

    /// Check whether a concrete package satisfies this spec
    #[must_use]
    pub fn matches(&self, id: &PackageId) -> bool {
        self.name == id.name && self.version_spec.matches(&id.version)
    }
}

impl fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.version_spec.is_any() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}{}", self.name, self.version_spec)
        }
    }
}

impl std::str::FromStr for PackageSpec {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Dependency kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DepKind {
    Build,
    Runtime,
}

impl fmt::Display for DepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Build => write!(f, "build"),
            Self::Runtime => write!(f, "runtime"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_spec_parse() {
        let spec = PackageSpec::parse("flask>=2.0.0").unwrap();
        assert_eq!(spec.name, "flask");
        assert_eq!(spec.version_spec.to_string(), ">=2.0.0");

        let spec = PackageSpec::parse("boltons").unwrap();
        assert_eq!(spec.name, "boltons");
        assert!(spec.version_spec.is_any());

        let spec = PackageSpec::parse("werkzeug >=2.0,<3").unwrap();
        assert_eq!(spec.name, "werkzeug");
        assert_eq!(spec.version_spec.to_string(), ">=2.0.0,<3.0.0");
    }

    #[test]
    fn test_package_spec_rejects_bad_names() {
        assert!(PackageSpec::parse(">=1.0").is_err());
        assert!(PackageSpec::parse("").is_err());
        assert!(PackageSpec::parse("has space").is_err());
    }

    #[test]
    fn test_package_spec_matches_id() {
        let spec = PackageSpec::parse("boltons>=24").unwrap();
        assert!(spec.matches(&PackageId::new("boltons", Version::new(24, 1, 0))));
        assert!(!spec.matches(&PackageId::new("boltons", Version::new(23, 0, 0))));
        assert!(!spec.matches(&PackageId::new("flask", Version::new(24, 1, 0))));
    }

    #[test]
    fn test_package_id_display() {
        let id = PackageId::new("smokey", Version::parse("0.1.0").unwrap());
        assert_eq!(id.to_string(), "smokey-0.1.0");
    }
}
