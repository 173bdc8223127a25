//! Report type definitions for operations

use crate::{BuildArtifact, InstalledRecord, PackageId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Installation report
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InstallReport {
    /// Environment root the install targeted
    pub env_root: PathBuf,
    /// Records for every package of the target set, new or pre-existing
    pub records: Vec<InstalledRecord>,
    /// Packages newly installed by this run
    pub installed: Vec<PackageId>,
    /// Packages whose previous build was replaced
    pub replaced: Vec<PackageId>,
    /// Total execution time
    pub duration_ms: u64,
}

impl InstallReport {
    /// True when the environment already matched and nothing was written
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.installed.is_empty() && self.replaced.is_empty()
    }
}

/// Build report
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildReport {
    /// Artifact that was produced
    pub artifact: BuildArtifact,
    /// Backend that produced it
    pub backend: String,
    /// Build duration
    pub duration_ms: u64,
}
