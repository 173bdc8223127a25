#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! High-level operations orchestration for kiln
//!
//! This crate sits between the CLI and the specialized crates: it loads
//! manifests, drives the build state machine and hands artifacts to the
//! environment installer.

mod add;
mod build;
mod context;
mod install;
mod orchestrator;

pub use add::add;
pub use build::build;
pub use context::{OpsContextBuilder, OpsCtx};
pub use install::{default_env_root, install, install_artifacts, DEFAULT_ENV_DIR};
pub use orchestrator::{BuildOrchestrator, BuildStage};

use kiln_errors::Error;
use kiln_types::{BuildReport, InstallReport};
use std::path::PathBuf;

/// Operation result that can be serialized for CLI output
#[derive(Clone, Debug, serde::Serialize)]
#[serde(tag = "type", content = "data")]
pub enum OperationResult {
    BuildReport(BuildReport),
    InstallReport(InstallReport),
    /// Manifest after `add`
    ManifestUpdated {
        path: PathBuf,
        runtime: Vec<String>,
        build: Vec<String>,
    },
}

impl OperationResult {
    /// Convert to JSON string
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
