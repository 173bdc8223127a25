//! Build artifact types

use crate::{PackageId, PackageSpec, Platform, Version};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// File extension of package artifacts, without the leading dot
pub const ARTIFACT_EXTENSION: &str = "conda";

/// Canonical artifact filename: `<name>-<version>-<build>.conda`
#[must_use]
pub fn artifact_filename(name: &str, version: &Version, build: &str) -> String {
    format!("{name}-{version}-{build}.{ARTIFACT_EXTENSION}")
}

/// Output of a successful build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildArtifact {
    /// File name inside the output directory
    pub filename: String,
    /// Absolute location of the artifact
    pub path: PathBuf,
    /// BLAKE3 hex digest of the artifact bytes
    pub hash: String,
    /// Target platform
    pub platform: Platform,
    /// Package identity
    pub package: PackageId,
    /// Build string, e.g. `h1a2b3c4_0`
    pub build: String,
}

impl BuildArtifact {
    /// Name of the packaged project
    #[must_use]
    pub fn name(&self) -> &str {
        &self.package.name
    }
}

/// Package metadata stored as `info/index.json` inside every artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageIndex {
    pub name: String,
    pub version: Version,
    pub build: String,
    #[serde(default)]
    pub build_number: u64,
    pub platform: Platform,
    /// Runtime requirements as spec strings
    #[serde(default)]
    pub depends: Vec<String>,
}

impl PackageIndex {
    #[must_use]
    pub fn package_id(&self) -> PackageId {
        PackageId::new(self.name.clone(), self.version.clone())
    }

    #[must_use]
    pub fn filename(&self) -> String {
        artifact_filename(&self.name, &self.version, &self.build)
    }

    /// Parse the declared requirements
    ///
    /// # Errors
    ///
    /// Returns `VersionError` if any entry is not a valid package spec.
    pub fn runtime_specs(&self) -> Result<Vec<PackageSpec>, kiln_errors::VersionError> {
        self.depends.iter().map(|d| PackageSpec::parse(d)).collect()
    }
}
