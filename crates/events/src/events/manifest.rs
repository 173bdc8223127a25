use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Manifest model events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ManifestEvent {
    Loaded {
        path: PathBuf,
        name: String,
        dependencies: usize,
    },

    DependencyAdded {
        path: PathBuf,
        spec: String,
    },

    Saved {
        path: PathBuf,
    },
}
