//! Local channel index
//!
//! A channel is a directory of artifacts with an `index.json` describing
//! them, keyed by package name and then version.

use kiln_errors::{Error, ResolveError};
use kiln_types::{parse_version, PackageIndex, Platform, Version};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// File name of the channel index
pub const CHANNEL_INDEX: &str = "index.json";

/// One artifact available in a channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelEntry {
    pub build: String,
    #[serde(default)]
    pub build_number: u64,
    pub platform: Platform,
    /// Artifact file name relative to the channel directory
    pub file: String,
    /// BLAKE3 hex digest of the artifact
    pub hash: String,
    #[serde(default)]
    pub depends: Vec<String>,
}

/// Parsed `index.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelIndex {
    packages: BTreeMap<String, BTreeMap<String, ChannelEntry>>,
}

/// A parsed version and its channel entry
#[derive(Debug, Clone)]
pub struct Candidate<'a> {
    pub version: Version,
    pub entry: &'a ChannelEntry,
}

impl ChannelIndex {
    /// Create an empty index
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load `index.json` from a channel directory; a missing index is empty
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::ChannelIndex` if the index exists but cannot be parsed.
    pub async fn load(channel_dir: &Path) -> Result<Self, Error> {
        let path = channel_dir.join(CHANNEL_INDEX);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => return Err(Error::io_with_path(&e, path)),
        };

        let index: Self = serde_json::from_str(&content).map_err(|e| ResolveError::ChannelIndex {
            channel: channel_dir.display().to_string(),
            message: e.to_string(),
        })?;

        // Reject unparsable version keys up front so candidates() can't fail
        for (name, versions) in &index.packages {
            for version in versions.keys() {
                parse_version(version).map_err(|e| ResolveError::ChannelIndex {
                    channel: channel_dir.display().to_string(),
                    message: format!("{name} {version}: {e}"),
                })?;
            }
        }
        Ok(index)
    }

    /// Write `index.json` atomically
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub async fn save(&self, channel_dir: &Path) -> Result<(), Error> {
        let content = serde_json::to_vec_pretty(self)?;
        kiln_root::atomic_write(&channel_dir.join(CHANNEL_INDEX), &content).await
    }

    /// Add or replace the entry for an artifact
    pub fn insert(&mut self, index: &PackageIndex, file: impl Into<String>, hash: impl Into<String>) {
        self.packages
            .entry(index.name.clone())
            .or_default()
            .insert(
                index.version.to_string(),
                ChannelEntry {
                    build: index.build.clone(),
                    build_number: index.build_number,
                    platform: index.platform,
                    file: file.into(),
                    hash: hash.into(),
                    depends: index.depends.clone(),
                },
            );
    }

    /// Whether any version of `name` is listed
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.packages.contains_key(name)
    }

    /// All versions of `name`, newest first
    #[must_use]
    pub fn candidates(&self, name: &str) -> Vec<Candidate<'_>> {
        let mut candidates: Vec<Candidate<'_>> = self
            .packages
            .get(name)
            .into_iter()
            .flatten()
            .filter_map(|(version, entry)| {
                parse_version(version)
                    .ok()
                    .map(|version| Candidate { version, entry })
            })
            .collect();
        candidates.sort_by(|a, b| {
            b.version
                .cmp(&a.version)
                .then(b.entry.build_number.cmp(&a.entry.build_number))
        });
        candidates
    }

    /// Package names in the index
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.packages.keys().map(String::as_str)
    }
}

/// A loaded channel
#[derive(Debug, Clone)]
pub struct Channel {
    pub dir: PathBuf,
    pub index: ChannelIndex,
}

impl Channel {
    /// Load the channel rooted at `dir`
    ///
    /// # Errors
    ///
    /// Returns an error if the channel index cannot be parsed.
    pub async fn load(dir: &Path) -> Result<Self, Error> {
        Ok(Self {
            dir: dir.to_path_buf(),
            index: ChannelIndex::load(dir).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index(name: &str, version: &str, build_number: u64) -> PackageIndex {
        PackageIndex {
            name: name.into(),
            version: parse_version(version).unwrap(),
            build: format!("h0_{build_number}"),
            build_number,
            platform: Platform::NoArch,
            depends: vec![],
        }
    }

    #[test]
    fn test_candidates_newest_first() {
        let mut channel = ChannelIndex::new();
        channel.insert(&index("boltons", "23.0", 0), "a.conda", "00");
        channel.insert(&index("boltons", "24.1", 0), "b.conda", "00");
        channel.insert(&index("boltons", "9.0", 0), "c.conda", "00");

        let versions: Vec<String> = channel
            .candidates("boltons")
            .iter()
            .map(|c| c.version.to_string())
            .collect();
        assert_eq!(versions, vec!["24.1.0", "23.0.0", "9.0.0"]);
        assert!(channel.candidates("flask").is_empty());
    }

    #[tokio::test]
    async fn test_missing_index_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let channel = Channel::load(dir.path()).await.unwrap();
        assert_eq!(channel.index.names().count(), 0);
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut channel = ChannelIndex::new();
        channel.insert(&index("boltons", "24.0.0", 1), "boltons.conda", "ab");
        channel.save(dir.path()).await.unwrap();

        let loaded = ChannelIndex::load(dir.path()).await.unwrap();
        assert_eq!(loaded, channel);
    }

    #[tokio::test]
    async fn test_bad_version_key_rejected() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(
            dir.path().join(CHANNEL_INDEX),
            r#"{"boltons": {"newest": {"build": "h0_0", "platform": "noarch", "file": "x", "hash": "00"}}}"#,
        )
        .await
        .unwrap();

        let err = ChannelIndex::load(dir.path()).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Resolve(ResolveError::ChannelIndex { .. })
        ));
    }
}
