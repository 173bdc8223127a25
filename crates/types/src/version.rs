//! Version specification and constraint parsing
//!
//! Implements comparison-style version constraints:
//! - `==1.2.3` - Exact version
//! - `>=1.2.0` - Minimum version
//! - `<=2.0.0` - Maximum version
//! - `~=1.2.0` - Compatible release (>=1.2.0,<1.3.0)
//! - `!=1.5.0` - Exclude version
//! - Multiple constraints: `>=1.2,<2.0,!=1.5.0`
//!
//! Versions may omit trailing components (`2`, `2.0`); missing components
//! are filled with zero before semantic-version parsing.

use semver::Version;
use serde::{Deserialize, Serialize};
use kiln_errors::VersionError;
use std::fmt;
use std::str::FromStr;

/// Parse a version, padding missing minor/patch components with zero
///
/// # Errors
///
/// Returns `VersionError::InvalidVersion` if the input is not a version.
pub fn parse_version(input: &str) -> Result<Version, VersionError> {
    let input = input.trim();
    if let Ok(version) = Version::parse(input) {
        return Ok(version);
    }

    // Split off pre-release/build suffixes before counting numeric components
    let split_at = input.find(['-', '+']).unwrap_or(input.len());
    let (core, suffix) = input.split_at(split_at);
    let components = core.split('.').count();
    let padded = match components {
        1 => format!("{core}.0.0{suffix}"),
        2 => format!("{core}.0{suffix}"),
        _ => {
            return Err(VersionError::InvalidVersion {
                input: input.to_string(),
            })
        }
    };

    Version::parse(&padded).map_err(|_| VersionError::InvalidVersion {
        input: input.to_string(),
    })
}

/// A single version constraint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersionConstraint {
    Exact(Version),
    GreaterEqual(Version),
    LessEqual(Version),
    Greater(Version),
    Less(Version),
    Compatible(Version),
    NotEqual(Version),
}

impl VersionConstraint {
    /// Check if a version satisfies this constraint
    #[must_use]
    pub fn matches(&self, version: &Version) -> bool {
        match self {
            Self::Exact(v) => version == v,
            Self::GreaterEqual(v) => version >= v,
            Self::LessEqual(v) => version <= v,
            Self::Greater(v) => version > v,
            Self::Less(v) => version < v,
            Self::NotEqual(v) => version != v,
            // ~=1.2.3 means >=1.2.3,<1.3.0
            Self::Compatible(v) => {
                version >= v && version.major == v.major && version.minor == v.minor
            }
        }
    }

    /// Parse a single constraint from a string
    fn parse(s: &str) -> Result<Self, VersionError> {
        let s = s.trim();

        // Two-character operators must be tried before their one-character prefixes
        let operators: [(&str, fn(Version) -> Self); 7] = [
            ("==", Self::Exact),
            (">=", Self::GreaterEqual),
            ("<=", Self::LessEqual),
            ("!=", Self::NotEqual),
            ("~=", Self::Compatible),
            (">", Self::Greater),
            ("<", Self::Less),
        ];

        for (op, make) in operators {
            if let Some(version_str) = s.strip_prefix(op) {
                return parse_version(version_str).map(make);
            }
        }

        // A bare version is shorthand for an exact match
        if s.starts_with(|c: char| c.is_ascii_digit()) {
            return parse_version(s).map(Self::Exact);
        }

        Err(VersionError::InvalidConstraint {
            input: s.to_string(),
        })
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Exact(v) => write!(f, "=={v}"),
            Self::GreaterEqual(v) => write!(f, ">={v}"),
            Self::LessEqual(v) => write!(f, "<={v}"),
            Self::Greater(v) => write!(f, ">{v}"),
            Self::Less(v) => write!(f, "<{v}"),
            Self::Compatible(v) => write!(f, "~={v}"),
            Self::NotEqual(v) => write!(f, "!={v}"),
        }
    }
}

/// A version specification that can contain multiple constraints
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VersionSpec {
    constraints: Vec<VersionConstraint>,
}

impl VersionSpec {
    /// A spec that accepts every version
    #[must_use]
    pub fn any() -> Self {
        Self::default()
    }

    /// Create a version spec from a single constraint
    #[must_use]
    pub fn single(constraint: VersionConstraint) -> Self {
        Self {
            constraints: vec![constraint],
        }
    }

    /// Create an exact version spec
    #[must_use]
    pub fn exact(version: Version) -> Self {
        Self::single(VersionConstraint::Exact(version))
    }

    /// Check if a version satisfies all constraints
    #[must_use]
    pub fn matches(&self, version: &Version) -> bool {
        self.constraints.iter().all(|c| c.matches(version))
    }

    /// Get the constraints
    #[must_use]
    pub fn constraints(&self) -> &[VersionConstraint] {
        &self.constraints
    }

    /// Check if this spec has no constraints
    #[must_use]
    pub fn is_any(&self) -> bool {
        self.constraints.is_empty()
    }
}

impl FromStr for VersionSpec {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();

        if s.is_empty() || s == "*" {
            return Ok(Self::any());
        }

        let constraints = s
            .split(',')
            .map(|part| VersionConstraint::parse(part.trim()))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { constraints })
    }
}

impl fmt::Display for VersionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.constraints.is_empty() {
            write!(f, "*")
        } else {
            let strs: Vec<_> = self.constraints.iter().map(ToString::to_string).collect();
            write!(f, "{}", strs.join(","))
        }
    }
}
