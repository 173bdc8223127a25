//! Install command implementation
//!
//! `install` always builds the project first, into the package cache, and
//! then installs the fresh artifact with its runtime closure. Installing
//! pre-built artifacts goes through `install_artifacts`.

use crate::{BuildOrchestrator, OpsCtx};
use kiln_errors::Error;
use kiln_install::InstallRequest;
use kiln_manifest::{manifest_dir, resolve_manifest_path, Manifest};
use kiln_types::InstallReport;
use std::path::{Path, PathBuf};

/// Environment used when `install` is given no explicit root
pub const DEFAULT_ENV_DIR: &str = ".kiln/envs/default";

/// Default environment root for a project directory
#[must_use]
pub fn default_env_root(project_dir: &Path) -> PathBuf {
    project_dir.join(DEFAULT_ENV_DIR)
}

/// Build the project, then install it into `env_root`
///
/// Without `env_root` the project's default environment is used.
///
/// # Errors
///
/// Returns build errors as produced by the orchestrator, or install errors
/// annotated with the `installing` stage.
pub async fn install(
    ctx: &OpsCtx,
    manifest_path: &Path,
    env_root: Option<&Path>,
) -> Result<InstallReport, Error> {
    let path = resolve_manifest_path(manifest_path);
    let project_dir = manifest_dir(&path);
    let output_dir = ctx.config.pkgs_dir();
    kiln_root::create_dir_all(&output_dir).await?;

    let built = BuildOrchestrator::new(ctx).run(&path, &output_dir).await?;

    let run = async {
        ctx.check_cancelled()?;
        let manifest = Manifest::load(&path).await?;
        let env_root = env_root.map_or_else(|| default_env_root(&project_dir), Path::to_path_buf);
        let resolver = ctx.resolver_for(manifest.channels(&project_dir));
        ctx.installer(resolver)
            .install(
                &InstallRequest::from_artifacts(vec![built.artifact.path]),
                &env_root,
            )
            .await
    };
    run.await.map_err(|e| e.in_stage("installing"))
}

/// Install pre-built artifacts and their runtime closure into `env_root`
///
/// Dependencies are resolved from the configured channels.
///
/// # Errors
///
/// Returns resolution, fetch, conflict or filesystem errors.
pub async fn install_artifacts(
    ctx: &OpsCtx,
    artifacts: &[PathBuf],
    env_root: &Path,
) -> Result<InstallReport, Error> {
    ctx.check_cancelled()?;
    let resolver = ctx.resolver_for(Vec::new());
    ctx.installer(resolver)
        .install(&InstallRequest::from_artifacts(artifacts.to_vec()), env_root)
        .await
}
