//! Build backends
//!
//! A [`BackendHandle`] is chosen from the manifest's backend descriptor and
//! turns a [`BuildRequest`] into exactly one [`BuildArtifact`].

mod generic;
mod recipe;

pub use generic::GenericBackend;
pub use recipe::{locate_recipe, RecipeBackend, RECIPE_FILENAME};

use async_trait::async_trait;
use kiln_errors::Error;
use kiln_events::{EventEmitter, EventSender};
use kiln_manifest::{BackendDescriptor, Manifest};
use kiln_types::BuildArtifact;
use std::path::{Path, PathBuf};

/// Default zstd level for artifacts
pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Everything a backend needs for one build
#[derive(Debug, Clone)]
pub struct BuildRequest {
    pub manifest: Manifest,
    /// Project directory holding the manifest
    pub working_dir: PathBuf,
    /// Directory the artifact is written to
    pub output_dir: PathBuf,
    /// Resolved build dependencies, `name-version` strings
    pub build_pins: Vec<String>,
    pub compression_level: i32,
    /// Parallelism hint exported to scripts as `CPU_COUNT`
    pub jobs: usize,
    pub session_id: String,
    pub event_sender: Option<EventSender>,
}

impl BuildRequest {
    #[must_use]
    pub fn new(manifest: Manifest, working_dir: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            manifest,
            working_dir,
            output_dir,
            build_pins: Vec::new(),
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            jobs: 1,
            session_id: String::new(),
            event_sender: None,
        }
    }

    #[must_use]
    pub fn with_build_pins(mut self, pins: Vec<String>) -> Self {
        self.build_pins = pins;
        self
    }

    #[must_use]
    pub fn with_compression_level(mut self, level: i32) -> Self {
        self.compression_level = level;
        self
    }

    #[must_use]
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    #[must_use]
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    #[must_use]
    pub fn with_event_sender(mut self, sender: EventSender) -> Self {
        self.event_sender = Some(sender);
        self
    }
}

impl EventEmitter for BuildRequest {
    fn event_sender(&self) -> Option<&EventSender> {
        self.event_sender.as_ref()
    }
}

/// A strategy that turns a project into a packaged artifact
#[async_trait]
pub trait Backend: Send + Sync {
    /// Name recorded in events and build strings
    fn name(&self) -> &'static str;

    /// Build and package the project
    ///
    /// On success exactly one artifact exists in `request.output_dir`; on
    /// failure none is left behind.
    async fn build(&self, request: &BuildRequest) -> Result<BuildArtifact, Error>;
}

/// The closed set of backends a manifest can select
#[derive(Debug, Clone)]
pub enum BackendHandle {
    Generic(GenericBackend),
    Recipe(RecipeBackend),
}

impl BackendHandle {
    /// Construct the backend for a descriptor
    #[must_use]
    pub fn from_descriptor(descriptor: &BackendDescriptor, manifest_dir: &Path) -> Self {
        match descriptor {
            BackendDescriptor::Generic => Self::Generic(GenericBackend::new()),
            BackendDescriptor::Recipe { recipe } => Self::Recipe(RecipeBackend::new(
                manifest_dir.to_path_buf(),
                recipe.clone(),
            )),
        }
    }
}

#[async_trait]
impl Backend for BackendHandle {
    fn name(&self) -> &'static str {
        match self {
            Self::Generic(backend) => backend.name(),
            Self::Recipe(backend) => backend.name(),
        }
    }

    async fn build(&self, request: &BuildRequest) -> Result<BuildArtifact, Error> {
        match self {
            Self::Generic(backend) => backend.build(request).await,
            Self::Recipe(backend) => backend.build(request).await,
        }
    }
}

/// Pick the backend named by the manifest; no `[build-backend]` means generic
///
/// # Errors
///
/// Returns `BuildError::UnsupportedBackend` for unknown backend names.
pub fn select_backend(manifest: &Manifest, manifest_dir: &Path) -> Result<BackendHandle, Error> {
    let descriptor = manifest.backend_descriptor()?;
    Ok(BackendHandle::from_descriptor(&descriptor, manifest_dir))
}

/// Fail unless `path` is an existing directory
pub(crate) async fn require_dir(path: &Path, error: kiln_errors::BuildError) -> Result<(), Error> {
    if kiln_root::is_dir(path).await {
        Ok(())
    } else {
        Err(error.into())
    }
}
