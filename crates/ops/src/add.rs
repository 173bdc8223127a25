//! Add command implementation

use crate::OpsCtx;
use kiln_errors::{Error, ManifestError};
use kiln_events::{AppEvent, EventEmitter, ManifestEvent};
use kiln_manifest::{resolve_manifest_path, Manifest};
use kiln_types::{DepKind, PackageSpec};
use std::path::Path;

/// Append `specs` to the manifest and save it
///
/// All specs are validated before anything is written; a duplicate or
/// malformed entry leaves the manifest file untouched.
///
/// # Errors
///
/// Returns `ManifestError::InvalidDependency` for malformed specs,
/// `ManifestError::DuplicateDependency` for names already declared, or the
/// load/save error.
pub async fn add(
    ctx: &OpsCtx,
    manifest_path: &Path,
    specs: &[String],
    kind: DepKind,
) -> Result<Manifest, Error> {
    let parsed = specs
        .iter()
        .map(|raw| {
            PackageSpec::parse(raw).map_err(|e| {
                Error::from(ManifestError::InvalidDependency {
                    spec: raw.clone(),
                    message: e.to_string(),
                })
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let path = resolve_manifest_path(manifest_path);
    let mut manifest = Manifest::load(&path).await?;
    for spec in &parsed {
        manifest.add_dependency_of_kind(spec, kind)?;
    }
    manifest.save(&path).await?;

    for spec in &parsed {
        ctx.emit(AppEvent::Manifest(ManifestEvent::DependencyAdded {
            path: path.clone(),
            spec: spec.to_string(),
        }));
    }
    ctx.emit(AppEvent::Manifest(ManifestEvent::Saved { path }));
    Ok(manifest)
}
