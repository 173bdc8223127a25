use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::FailureContext;

/// Environment installer events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum InstallEvent {
    Started {
        env_root: PathBuf,
        packages: usize,
    },

    /// Every target is already recorded in the environment
    UpToDate {
        env_root: PathBuf,
        packages: usize,
    },

    FetchStarted {
        package: String,
    },

    FetchRetrying {
        package: String,
        attempt: u32,
        delay_ms: u64,
    },

    FetchCompleted {
        package: String,
        cached: bool,
        bytes: u64,
    },

    ConflictDetected {
        path: String,
        first: String,
        second: String,
    },

    PackageInstalled {
        package: String,
        files: usize,
    },

    RolledBack {
        packages: Vec<String>,
    },

    Completed {
        env_root: PathBuf,
        installed: usize,
        duration_ms: u64,
    },

    Failed {
        failure: FailureContext,
    },
}
