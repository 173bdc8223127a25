use serde::{Deserialize, Serialize};

use super::FailureContext;

/// Resolver domain events for dependency resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ResolverEvent {
    Started {
        requested: usize,
        channels: usize,
    },

    Completed {
        packages: Vec<String>,
        duration_ms: u64,
    },

    Failed {
        failure: FailureContext,
        conflicting_packages: Vec<String>,
    },
}
