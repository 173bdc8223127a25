use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::FailureContext;

/// Build orchestration and backend events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BuildEvent {
    /// Orchestrator moved to a new state
    StateChanged {
        session_id: String,
        from: String,
        to: String,
    },

    BackendSelected {
        session_id: String,
        package: String,
        backend: String,
    },

    /// Recipe script step started
    StepStarted {
        session_id: String,
        package: String,
        /// 1-based position in the script
        index: usize,
        total: usize,
        command: String,
    },

    /// Output line from a script step
    StepOutput {
        session_id: String,
        package: String,
        line: String,
        is_stderr: bool,
    },

    StepCompleted {
        session_id: String,
        package: String,
        index: usize,
        duration: Duration,
    },

    PackagingStarted {
        session_id: String,
        package: String,
        files: usize,
    },

    Completed {
        session_id: String,
        package: String,
        artifact: PathBuf,
        duration: Duration,
    },

    Failed {
        session_id: String,
        package: Option<String>,
        stage: String,
        failure: FailureContext,
    },

    Cancelled {
        session_id: String,
        stage: String,
    },
}
