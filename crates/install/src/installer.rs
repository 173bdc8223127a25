//! Installing artifacts and their dependency closure into an environment

use crate::commit::Transaction;
use crate::config::InstallConfig;
use crate::conflict::{detect_conflicts, detect_untracked};
use crate::fetch::PackageFetcher;
use crate::metadata::MetadataStore;
use crate::staging::{StagedPackage, StagingArea};
use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use kiln_builder::read_package_index;
use kiln_config::{acquire_semaphore_permit, create_semaphore};
use kiln_errors::{Error, InstallError, ResolveError};
use kiln_events::{AppEvent, EventEmitter, EventSender, FailureContext, InstallEvent};
use kiln_hash::Hash;
use kiln_resolver::{DependencyResolver, ResolveRequest, ResolvedPackage};
use kiln_types::{InstallReport, InstalledRecord, PackageId, PackageIndex, PackageSpec, Platform};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// What to install
#[derive(Debug, Clone)]
pub struct InstallRequest {
    /// Local artifact files, installed as given
    pub artifacts: Vec<PathBuf>,
    /// Additional packages to resolve from channels
    pub specs: Vec<PackageSpec>,
    pub platform: Platform,
}

impl InstallRequest {
    /// Install local artifacts on the current platform
    #[must_use]
    pub fn from_artifacts(artifacts: Vec<PathBuf>) -> Self {
        Self {
            artifacts,
            specs: Vec::new(),
            platform: Platform::current(),
        }
    }

    #[must_use]
    pub fn with_spec(mut self, spec: PackageSpec) -> Self {
        self.specs.push(spec);
        self
    }

    #[must_use]
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }
}

#[derive(Debug, Clone)]
enum Source {
    Local(PathBuf),
    Channel(ResolvedPackage),
}

/// One package of the target set
#[derive(Debug, Clone)]
struct Target {
    index: PackageIndex,
    hash: String,
    source: Source,
}

impl Target {
    fn label(&self) -> String {
        self.index.package_id().to_string()
    }

    fn origin(&self) -> String {
        match &self.source {
            Source::Local(path) => path.display().to_string(),
            Source::Channel(package) => package.artifact.display().to_string(),
        }
    }

    fn record(&self, env_root: &Path, files: Vec<String>) -> InstalledRecord {
        InstalledRecord {
            name: self.index.name.clone(),
            version: self.index.version.clone(),
            build: self.index.build.clone(),
            platform: self.index.platform,
            install_path: env_root.to_path_buf(),
            files,
            hash: self.hash.clone(),
            depends: self.index.depends.clone(),
            installed_at: Utc::now(),
        }
    }
}

enum Plan {
    Keep(InstalledRecord),
    Replace(InstalledRecord),
    Fresh,
}

/// Installs package sets into environment roots
pub struct Installer {
    config: InstallConfig,
    resolver: Arc<dyn DependencyResolver>,
    fetcher: Arc<dyn PackageFetcher>,
    event_sender: Option<EventSender>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for Installer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Installer")
            .field("config", &self.config)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl EventEmitter for Installer {
    fn event_sender(&self) -> Option<&EventSender> {
        self.event_sender.as_ref()
    }
}

impl Installer {
    #[must_use]
    pub fn new(
        config: InstallConfig,
        resolver: Arc<dyn DependencyResolver>,
        fetcher: Arc<dyn PackageFetcher>,
    ) -> Self {
        Self {
            config,
            resolver,
            fetcher,
            event_sender: None,
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_event_sender(mut self, sender: EventSender) -> Self {
        self.event_sender = Some(sender);
        self
    }

    /// Stop between install steps once `token` is cancelled
    ///
    /// Cancellation is honoured up to the commit; a started commit runs to
    /// completion or rolls back.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    fn check_cancelled(&self) -> Result<(), Error> {
        if self.cancel.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Install `request` and its runtime closure into `env_root`
    ///
    /// Either every package of the target set ends up installed with a
    /// record, or the environment is left as it was found.
    ///
    /// # Errors
    ///
    /// Returns resolution, fetch, conflict or filesystem errors, and
    /// `Error::Cancelled` if cancelled before the commit. When a rollback
    /// cannot complete, `InstallError::RollbackFailed` is returned.
    pub async fn install(
        &self,
        request: &InstallRequest,
        env_root: &Path,
    ) -> Result<InstallReport, Error> {
        let result = self.run(request, env_root).await;
        if let Err(e) = &result {
            self.emit(AppEvent::Install(InstallEvent::Failed {
                failure: FailureContext::from_error(e),
            }));
        }
        result
    }

    #[allow(clippy::too_many_lines)]
    async fn run(&self, request: &InstallRequest, env_root: &Path) -> Result<InstallReport, Error> {
        let start = Instant::now();
        self.check_cancelled()?;
        let targets = self.collect_targets(request).await?;
        if targets.is_empty() {
            return Err(InstallError::NothingToInstall.into());
        }

        let store = MetadataStore::new(env_root);
        let existing = store.load_all().await?;
        let plans: Vec<Plan> = targets.iter().map(|t| plan_for(t, &existing)).collect();

        if plans.iter().all(|p| matches!(p, Plan::Keep(_))) {
            self.emit(AppEvent::Install(InstallEvent::UpToDate {
                env_root: env_root.to_path_buf(),
                packages: targets.len(),
            }));
            let records = plans
                .into_iter()
                .filter_map(|p| match p {
                    Plan::Keep(record) => Some(record),
                    _ => None,
                })
                .collect();
            return Ok(InstallReport {
                env_root: env_root.to_path_buf(),
                records,
                installed: Vec::new(),
                replaced: Vec::new(),
                duration_ms: elapsed_ms(start),
            });
        }

        let work: Vec<&Target> = targets
            .iter()
            .zip(&plans)
            .filter(|(_, plan)| !matches!(plan, Plan::Keep(_)))
            .map(|(target, _)| target)
            .collect();
        self.emit(AppEvent::Install(InstallEvent::Started {
            env_root: env_root.to_path_buf(),
            packages: work.len(),
        }));

        self.check_cancelled()?;
        store.ensure().await?;
        let staging = StagingArea::create(store.dir())?;
        let staged = tokio::select! {
            biased;
            () = self.cancel.cancelled() => return Err(Error::Cancelled),
            staged = self.prepare(&work, &staging, request.platform) => staged?,
        };

        let replaced: Vec<&InstalledRecord> = plans
            .iter()
            .filter_map(|p| match p {
                Plan::Replace(record) => Some(record),
                _ => None,
            })
            .collect();
        let kept: Vec<&InstalledRecord> = existing
            .iter()
            .filter(|record| !replaced.iter().any(|r| r.name == record.name))
            .collect();
        if let Err(conflict) = detect_conflicts(&staged, &kept) {
            if let InstallError::Conflict {
                path,
                first,
                second,
            } = &conflict
            {
                self.emit(AppEvent::Install(InstallEvent::ConflictDetected {
                    path: path.clone(),
                    first: first.clone(),
                    second: second.clone(),
                }));
            }
            return Err(conflict.into());
        }
        detect_untracked(env_root, &staged, &existing).await?;
        self.check_cancelled()?;

        let mut new_records = Vec::with_capacity(work.len());
        let mut tx = Transaction::new(env_root, &store, staging.backup_dir());
        let committed = commit(&mut tx, env_root, &work, &staged, &replaced, &mut new_records).await;
        if let Err(e) = committed {
            tx.rollback().await?;
            self.emit(AppEvent::Install(InstallEvent::RolledBack {
                packages: work.iter().map(|t| t.label()).collect(),
            }));
            return Err(e);
        }

        for record in &new_records {
            self.emit(AppEvent::Install(InstallEvent::PackageInstalled {
                package: record.package_id().to_string(),
                files: record.files.len(),
            }));
        }

        let replaced: Vec<PackageId> = replaced.iter().map(|r| r.package_id()).collect();
        let mut fresh = new_records.into_iter();
        let records = plans
            .into_iter()
            .filter_map(|plan| match plan {
                Plan::Keep(record) => Some(record),
                Plan::Replace(_) | Plan::Fresh => fresh.next(),
            })
            .collect::<Vec<_>>();
        let installed = work.iter().map(|t| t.index.package_id()).collect::<Vec<_>>();
        let duration_ms = elapsed_ms(start);

        self.emit(AppEvent::Install(InstallEvent::Completed {
            env_root: env_root.to_path_buf(),
            installed: installed.len(),
            duration_ms,
        }));

        Ok(InstallReport {
            env_root: env_root.to_path_buf(),
            records,
            installed,
            replaced,
            duration_ms,
        })
    }

    /// Local artifacts plus whatever the resolver picks for their closure,
    /// dependencies first
    async fn collect_targets(&self, request: &InstallRequest) -> Result<Vec<Target>, Error> {
        let mut locals: Vec<Target> = Vec::with_capacity(request.artifacts.len());
        for path in &request.artifacts {
            let index = read_package_index(path).await?;
            if !index.platform.installable_on(request.platform) {
                return Err(InstallError::InvalidArtifact {
                    path: path.display().to_string(),
                    message: format!(
                        "built for {}, cannot install on {}",
                        index.platform, request.platform
                    ),
                }
                .into());
            }
            if locals.iter().any(|t| t.index.name == index.name) {
                return Err(InstallError::InvalidArtifact {
                    path: path.display().to_string(),
                    message: format!("another artifact for {} was already given", index.name),
                }
                .into());
            }
            let hash = Hash::hash_file(path).await?.to_hex();
            locals.push(Target {
                index,
                hash,
                source: Source::Local(path.clone()),
            });
        }

        let mut resolve = ResolveRequest::new(request.platform);
        for local in &locals {
            resolve = resolve.provide(local.index.name.clone());
        }
        for local in &locals {
            let label = local.label();
            for spec in local.index.runtime_specs()? {
                match locals.iter().find(|t| t.index.name == spec.name) {
                    Some(provider) if !spec.matches(&provider.index.package_id()) => {
                        return Err(ResolveError::Unsatisfiable {
                            package: spec.name.clone(),
                            constraints: spec.version_spec.to_string(),
                            conflicting: vec![label],
                        }
                        .into());
                    }
                    Some(_) => {}
                    None => resolve = resolve.require(spec, label.clone()),
                }
            }
        }
        for spec in &request.specs {
            resolve = resolve.require(spec.clone(), "request");
        }

        let mut targets = Vec::new();
        if !resolve.is_empty() {
            let resolved = self.resolver.resolve(&resolve).await?;
            targets.extend(resolved.packages.into_iter().map(|package| Target {
                index: PackageIndex {
                    name: package.id.name.clone(),
                    version: package.id.version.clone(),
                    build: package.build.clone(),
                    build_number: package.build_number,
                    platform: package.platform,
                    depends: package.depends.clone(),
                },
                hash: package.hash.clone(),
                source: Source::Channel(package),
            }));
        }
        targets.extend(locals);
        Ok(targets)
    }

    /// Fetch and unpack every target, bounded by `parallel_fetches`
    async fn prepare(
        &self,
        work: &[&Target],
        staging: &StagingArea,
        platform: Platform,
    ) -> Result<Vec<StagedPackage>, Error> {
        let semaphore = create_semaphore(self.config.parallel_fetches);
        let mut pending = FuturesUnordered::new();

        for (slot, target) in work.iter().enumerate() {
            let semaphore = semaphore.clone();
            pending.push(async move {
                let _permit = acquire_semaphore_permit(semaphore, "fetch").await?;
                let artifact = self.materialize(target).await?;
                let staged = staging
                    .stage(&slot.to_string(), &artifact, target.hash.clone(), platform)
                    .await?;
                if staged.index.name != target.index.name
                    || staged.index.version != target.index.version
                    || staged.index.build != target.index.build
                {
                    return Err(Error::from(InstallError::InvalidArtifact {
                        path: target.origin(),
                        message: format!(
                            "contains {} instead of {}",
                            staged.index.filename(),
                            target.index.filename()
                        ),
                    }));
                }
                Ok::<_, Error>((slot, staged))
            });
        }

        let mut slots: BTreeMap<usize, StagedPackage> = BTreeMap::new();
        while let Some(result) = pending.next().await {
            let (slot, staged) = result?;
            slots.insert(slot, staged);
        }
        Ok(slots.into_values().collect())
    }

    async fn materialize(&self, target: &Target) -> Result<PathBuf, Error> {
        match &target.source {
            Source::Local(path) => Ok(path.clone()),
            Source::Channel(package) => {
                let label = target.label();
                self.emit(AppEvent::Install(InstallEvent::FetchStarted {
                    package: label.clone(),
                }));
                let fetched = self.fetcher.fetch(package).await?;
                self.emit(AppEvent::Install(InstallEvent::FetchCompleted {
                    package: label,
                    cached: fetched.cached,
                    bytes: fetched.bytes,
                }));
                Ok(fetched.path)
            }
        }
    }
}

async fn commit(
    tx: &mut Transaction<'_>,
    env_root: &Path,
    work: &[&Target],
    staged: &[StagedPackage],
    replaced: &[&InstalledRecord],
    records: &mut Vec<InstalledRecord>,
) -> Result<(), Error> {
    for record in replaced {
        tx.retire(record).await?;
    }
    for (target, package) in work.iter().zip(staged) {
        tx.place(package).await?;
        let record = target.record(env_root, package.paths.clone());
        tx.record(record.clone()).await?;
        records.push(record);
    }
    Ok(())
}

/// Keep an installed package only if it is the very same artifact
///
/// A rebuilt artifact with an unchanged build string still differs in hash
/// and replaces the installed one.
fn plan_for(target: &Target, existing: &[InstalledRecord]) -> Plan {
    let index = &target.index;
    match existing.iter().find(|r| r.name == index.name) {
        Some(record)
            if record.is_same_build(&index.name, &index.version, &index.build)
                && record.hash == target.hash =>
        {
            Plan::Keep(record.clone())
        }
        Some(record) => Plan::Replace(record.clone()),
        None => Plan::Fresh,
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
