//! Build orchestration state machine
//!
//! One [`BuildOrchestrator::run`] drives a manifest through
//! `Idle → ManifestLoaded → DependenciesResolved → BackendInvoked` and ends
//! in exactly one of `Succeeded` or `Failed`. Every transition is reported
//! as a [`BuildEvent::StateChanged`]. Errors keep their kind and gain the
//! name of the stage they surfaced in.

use crate::OpsCtx;
use kiln_builder::{select_backend, Backend, BuildRequest};
use kiln_errors::{BuildError, Error};
use kiln_events::{
    AppEvent, BuildEvent, EventEmitter, FailureContext, ManifestEvent, ResolverEvent,
};
use kiln_manifest::{manifest_dir, resolve_manifest_path, Manifest};
use kiln_resolver::ResolveRequest;
use kiln_types::{BuildReport, Platform};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Orchestrator states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStage {
    Idle,
    ManifestLoaded,
    DependenciesResolved,
    BackendInvoked,
    Succeeded,
    Failed,
}

impl BuildStage {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ManifestLoaded => "manifest-loaded",
            Self::DependenciesResolved => "dependencies-resolved",
            Self::BackendInvoked => "backend-invoked",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Stage label attached to errors raised while leaving this state
    fn activity(self) -> &'static str {
        match self {
            Self::Idle => "loading manifest",
            Self::ManifestLoaded => "resolving dependencies",
            Self::DependenciesResolved | Self::BackendInvoked => "invoking backend",
            Self::Succeeded | Self::Failed => "finished",
        }
    }
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Drives one build from manifest to artifact
#[derive(Debug)]
pub struct BuildOrchestrator<'a> {
    ctx: &'a OpsCtx,
    session_id: String,
    stage: BuildStage,
    package: Option<String>,
}

struct Loaded {
    manifest: Manifest,
    manifest_dir: PathBuf,
}

impl<'a> BuildOrchestrator<'a> {
    #[must_use]
    pub fn new(ctx: &'a OpsCtx) -> Self {
        Self {
            ctx,
            session_id: uuid::Uuid::new_v4().to_string(),
            stage: BuildStage::Idle,
            package: None,
        }
    }

    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    #[must_use]
    pub fn stage(&self) -> BuildStage {
        self.stage
    }

    /// Build the project at `manifest_path` into `output_dir`
    ///
    /// # Errors
    ///
    /// Returns the underlying manifest, resolution or build error wrapped in
    /// `Error::Stage`, or `Error::Cancelled` (also stage-wrapped) when the
    /// context's cancellation token fires.
    pub async fn run(
        &mut self,
        manifest_path: &Path,
        output_dir: &Path,
    ) -> Result<BuildReport, Error> {
        let start = Instant::now();
        match self.drive(manifest_path, output_dir, start).await {
            Ok(report) => {
                self.transition(BuildStage::Succeeded);
                Ok(report)
            }
            Err(e) => {
                let stage = self.stage.activity();
                let err = e.in_stage(stage);
                if matches!(err.root(), Error::Cancelled) {
                    self.ctx.emit(AppEvent::Build(BuildEvent::Cancelled {
                        session_id: self.session_id.clone(),
                        stage: stage.to_string(),
                    }));
                } else {
                    self.ctx.emit(AppEvent::Build(BuildEvent::Failed {
                        session_id: self.session_id.clone(),
                        package: self.package.clone(),
                        stage: stage.to_string(),
                        failure: FailureContext::from_error(&err),
                    }));
                }
                self.transition(BuildStage::Failed);
                Err(err)
            }
        }
    }

    async fn drive(
        &mut self,
        manifest_path: &Path,
        output_dir: &Path,
        start: Instant,
    ) -> Result<BuildReport, Error> {
        self.ctx.check_cancelled()?;
        let loaded = self.load(manifest_path).await?;
        self.transition(BuildStage::ManifestLoaded);

        self.ctx.check_cancelled()?;
        let pins = self.resolve(&loaded).await?;
        self.transition(BuildStage::DependenciesResolved);

        self.ctx.check_cancelled()?;
        if !kiln_root::is_dir(output_dir).await {
            return Err(BuildError::InvalidOutputDir {
                path: output_dir.display().to_string(),
            }
            .into());
        }
        let backend = select_backend(&loaded.manifest, &loaded.manifest_dir)?;
        let package = loaded.manifest.package.name.clone();
        self.ctx.emit(AppEvent::Build(BuildEvent::BackendSelected {
            session_id: self.session_id.clone(),
            package: package.clone(),
            backend: backend.name().to_string(),
        }));

        let request = BuildRequest::new(
            loaded.manifest,
            loaded.manifest_dir,
            output_dir.to_path_buf(),
        )
        .with_build_pins(pins)
        .with_compression_level(self.ctx.config.build.compression_level)
        .with_jobs(self.ctx.config.build_jobs())
        .with_session(self.session_id.clone())
        .with_event_sender(self.ctx.tx.clone());

        self.transition(BuildStage::BackendInvoked);
        // Dropping the build future removes its temporary files and kills
        // any running script
        let artifact = tokio::select! {
            biased;
            () = self.ctx.cancel.cancelled() => return Err(Error::Cancelled),
            result = backend.build(&request) => result?,
        };

        let duration = start.elapsed();
        self.ctx.emit(AppEvent::Build(BuildEvent::Completed {
            session_id: self.session_id.clone(),
            package,
            artifact: artifact.path.clone(),
            duration,
        }));

        Ok(BuildReport {
            artifact,
            backend: backend.name().to_string(),
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
        })
    }

    async fn load(&mut self, manifest_path: &Path) -> Result<Loaded, Error> {
        let path = resolve_manifest_path(manifest_path);
        let manifest = Manifest::load(&path).await?;
        self.package = Some(manifest.package.name.clone());
        self.ctx.emit(AppEvent::Manifest(ManifestEvent::Loaded {
            path: path.clone(),
            name: manifest.package.name.clone(),
            dependencies: manifest.dependencies.runtime.len() + manifest.dependencies.build.len(),
        }));
        Ok(Loaded {
            manifest,
            manifest_dir: manifest_dir(&path),
        })
    }

    /// Resolve runtime and build dependencies, returning build pins
    async fn resolve(&self, loaded: &Loaded) -> Result<Vec<String>, Error> {
        let name = loaded.manifest.package.name.as_str();
        let request = ResolveRequest::new(Platform::current())
            .require_all(loaded.manifest.runtime_deps()?, name)
            .require_all(loaded.manifest.build_deps()?, name);
        if request.is_empty() {
            return Ok(Vec::new());
        }

        let channels = loaded.manifest.channels(&loaded.manifest_dir);
        self.ctx.emit(AppEvent::Resolver(ResolverEvent::Started {
            requested: request.requirements.len(),
            channels: self.ctx.search_path(channels.clone()).len(),
        }));
        let started = Instant::now();
        let resolved = match self.ctx.resolver_for(channels).resolve(&request).await {
            Ok(resolved) => resolved,
            Err(e) => {
                let conflicting_packages = match e.root() {
                    Error::Resolve(resolve) => resolve.conflicting_packages().to_vec(),
                    _ => Vec::new(),
                };
                self.ctx.emit(AppEvent::Resolver(ResolverEvent::Failed {
                    failure: FailureContext::from_error(&e),
                    conflicting_packages,
                }));
                return Err(e);
            }
        };
        self.ctx.emit(AppEvent::Resolver(ResolverEvent::Completed {
            packages: resolved.packages.iter().map(|p| p.id.to_string()).collect(),
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        }));

        let build_names: Vec<String> = loaded
            .manifest
            .build_deps()?
            .into_iter()
            .map(|spec| spec.name)
            .collect();
        Ok(resolved
            .packages
            .iter()
            .filter(|p| build_names.contains(&p.id.name))
            .map(|p| format!("{}-{}", p.id, p.build))
            .collect())
    }

    fn transition(&mut self, to: BuildStage) {
        let from = self.stage;
        if from.is_terminal() {
            return;
        }
        self.stage = to;
        self.ctx.emit(AppEvent::Build(BuildEvent::StateChanged {
            session_id: self.session_id.clone(),
            from: from.to_string(),
            to: to.to_string(),
        }));
    }
}
