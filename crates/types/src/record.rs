//! Installed package metadata records

use crate::{PackageId, Platform, Version};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Metadata written for every package installed into an environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstalledRecord {
    pub name: String,
    pub version: Version,
    pub build: String,
    pub platform: Platform,
    /// Environment root the package was installed into
    pub install_path: PathBuf,
    /// Paths relative to `install_path` owned by this package
    #[serde(default)]
    pub files: Vec<String>,
    /// BLAKE3 hex digest of the installed artifact
    pub hash: String,
    #[serde(default)]
    pub depends: Vec<String>,
    pub installed_at: DateTime<Utc>,
}

impl InstalledRecord {
    /// Record file name: `<name>-<version>-<build>.json`
    #[must_use]
    pub fn filename(&self) -> String {
        format!("{}-{}-{}.json", self.name, self.version, self.build)
    }

    #[must_use]
    pub fn package_id(&self) -> PackageId {
        PackageId::new(self.name.clone(), self.version.clone())
    }

    /// Same package, version and build
    #[must_use]
    pub fn is_same_build(&self, name: &str, version: &Version, build: &str) -> bool {
        self.name == name && &self.version == version && self.build == build
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_json_shape() {
        let record = InstalledRecord {
            name: "smokey".into(),
            version: Version::new(0, 1, 0),
            build: "h0a1b2c3_0".into(),
            platform: Platform::NoArch,
            install_path: PathBuf::from("/envs/default"),
            files: vec!["bin/smokey".into()],
            hash: "00".into(),
            depends: vec![],
            installed_at: Utc::now(),
        };
        assert_eq!(record.filename(), "smokey-0.1.0-h0a1b2c3_0.json");

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["name"], "smokey");
        assert_eq!(value["version"], "0.1.0");
        assert_eq!(value["install_path"], "/envs/default");
        assert_eq!(value["platform"], "noarch");
    }
}
