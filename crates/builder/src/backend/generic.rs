//! Generic backend: package project sources as-is

use super::{require_dir, Backend, BuildRequest};
use crate::packaging::{build_string, create_package};
use async_trait::async_trait;
use kiln_errors::{BuildError, Error};
use kiln_events::{AppEvent, BuildEvent, EventEmitter};
use kiln_hash::Hash;
use kiln_types::{BuildArtifact, PackageIndex, Platform, ARTIFACT_EXTENSION};
use std::path::{Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Install location of the sources inside the environment
const SITE_PACKAGES: &str = "site-packages";

/// Copies the project tree into `site-packages/<name>/` of a noarch package
#[derive(Debug, Clone, Default)]
pub struct GenericBackend;

impl GenericBackend {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Backend for GenericBackend {
    fn name(&self) -> &'static str {
        kiln_manifest::BackendDescriptor::GENERIC
    }

    async fn build(&self, request: &BuildRequest) -> Result<BuildArtifact, Error> {
        require_dir(
            &request.working_dir,
            BuildError::WorkingDirNotFound {
                path: request.working_dir.display().to_string(),
            },
        )
        .await?;
        require_dir(
            &request.output_dir,
            BuildError::InvalidOutputDir {
                path: request.output_dir.display().to_string(),
            },
        )
        .await?;

        let manifest = &request.manifest;
        let name = manifest.package.name.clone();
        let version = manifest.version()?;

        let stage = tempfile::tempdir().map_err(|e| BuildError::Failed {
            message: format!("failed to create staging directory: {e}"),
        })?;
        let payload = stage.path().join("payload");
        let sources = stage_sources(
            &request.working_dir,
            &request.output_dir,
            &payload.join(SITE_PACKAGES).join(&name),
        )
        .await?;

        let depends: Vec<String> = manifest
            .runtime_deps()?
            .iter()
            .map(ToString::to_string)
            .collect();
        let inputs = std::iter::once(self.name().to_string())
            .chain(request.build_pins.clone())
            .chain(depends.iter().map(|d| format!("run:{d}")))
            .chain(std::iter::once(format!("src:{}", sources.digest)));
        let index = PackageIndex {
            build: build_string(&name, &version, inputs, 0),
            name: name.clone(),
            version,
            build_number: 0,
            platform: Platform::NoArch,
            depends,
        };

        request.emit(AppEvent::Build(BuildEvent::PackagingStarted {
            session_id: request.session_id.clone(),
            package: name,
            files: sources.files,
        }));

        create_package(&payload, &index, &request.output_dir, request.compression_level).await
    }
}

/// Result of copying a project tree
#[derive(Debug)]
struct StagedSources {
    files: usize,
    /// Hash over every copied path and its content
    digest: String,
}

/// Copy the project tree into `dest`
///
/// Hidden entries, existing artifacts and the output directory are skipped.
async fn stage_sources(src: &Path, output_dir: &Path, dest: &Path) -> Result<StagedSources, Error> {
    let src = src.to_path_buf();
    let output_dir = output_dir.to_path_buf();
    let dest = dest.to_path_buf();

    tokio::task::spawn_blocking(move || -> Result<StagedSources, Error> {
        let src = std::fs::canonicalize(&src).map_err(|e| Error::io_with_path(&e, &src))?;
        let output_dir: Option<PathBuf> = std::fs::canonicalize(&output_dir).ok();
        std::fs::create_dir_all(&dest).map_err(|e| Error::io_with_path(&e, &dest))?;

        let keep = |entry: &DirEntry| {
            if entry.depth() == 0 {
                return true;
            }
            let hidden = entry.file_name().to_string_lossy().starts_with('.');
            let artifact = entry.file_type().is_file()
                && entry
                    .path()
                    .extension()
                    .is_some_and(|ext| ext == ARTIFACT_EXTENSION);
            let is_output = output_dir.as_deref() == Some(entry.path());
            !(hidden || artifact || is_output)
        };

        let mut parts = Vec::new();
        for entry in WalkDir::new(&src).sort_by_file_name().into_iter().filter_entry(keep) {
            let entry = entry.map_err(|e| BuildError::Failed {
                message: format!("failed to read sources: {e}"),
            })?;
            let relative = entry
                .path()
                .strip_prefix(&src)
                .map_err(|e| Error::internal(format!("walked outside sources: {e}")))?;
            let target = dest.join(relative);

            if entry.file_type().is_dir() {
                std::fs::create_dir_all(&target).map_err(|e| Error::io_with_path(&e, &target))?;
            } else {
                let data =
                    std::fs::read(entry.path()).map_err(|e| Error::io_with_path(&e, entry.path()))?;
                std::fs::copy(entry.path(), &target)
                    .map_err(|e| Error::io_with_path(&e, entry.path()))?;
                parts.push(format!(
                    "{}:{}",
                    relative.to_string_lossy(),
                    Hash::from_data(&data).to_hex()
                ));
            }
        }
        Ok(StagedSources {
            files: parts.len(),
            digest: Hash::from_parts(&parts).to_hex(),
        })
    })
    .await
    .map_err(|e| Error::internal(format!("staging task failed: {e}")))?
}
