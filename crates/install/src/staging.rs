//! Extraction of artifacts into a scratch area before they touch the env

use kiln_builder::packaging::{extract_package, FILES_DIR};
use kiln_errors::{Error, InstallError};
use kiln_root::TEMP_PREFIX;
use kiln_types::{PackageIndex, Platform};
use std::path::{Path, PathBuf};

/// An artifact unpacked and ready to be moved into place
#[derive(Debug, Clone)]
pub struct StagedPackage {
    pub index: PackageIndex,
    /// Payload paths relative to the environment root
    pub paths: Vec<String>,
    /// BLAKE3 hex digest of the artifact
    pub hash: String,
    dir: PathBuf,
}

impl StagedPackage {
    /// Location of a payload file inside the staging area
    #[must_use]
    pub fn payload_path(&self, relative: &str) -> PathBuf {
        self.dir.join(FILES_DIR).join(relative)
    }

    /// `name-version` label used in messages
    #[must_use]
    pub fn label(&self) -> String {
        self.index.package_id().to_string()
    }
}

/// Scratch directory inside the metadata dir, removed when dropped
#[derive(Debug)]
pub struct StagingArea {
    dir: tempfile::TempDir,
}

impl StagingArea {
    /// Create a fresh staging area under `meta_dir`
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn create(meta_dir: &Path) -> Result<Self, Error> {
        let dir = tempfile::Builder::new()
            .prefix(&format!("{TEMP_PREFIX}staging-"))
            .tempdir_in(meta_dir)
            .map_err(|e| Error::io_with_path(&e, meta_dir))?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Directory used to park files displaced during commit
    #[must_use]
    pub fn backup_dir(&self) -> PathBuf {
        self.dir.path().join("backup")
    }

    /// Unpack `artifact` into its own slot and check it is installable
    ///
    /// # Errors
    ///
    /// Returns `InstallError::InvalidArtifact` if the archive is corrupt,
    /// targets another platform, or lists payload files it does not contain.
    pub async fn stage(
        &self,
        slot: &str,
        artifact: &Path,
        hash: String,
        platform: Platform,
    ) -> Result<StagedPackage, Error> {
        let dir = self.dir.path().join("packages").join(slot);
        let contents = extract_package(artifact, &dir).await?;

        if !contents.index.platform.installable_on(platform) {
            return Err(invalid(
                artifact,
                format!(
                    "built for {}, cannot install on {platform}",
                    contents.index.platform
                ),
            ));
        }

        let staged = StagedPackage {
            index: contents.index,
            paths: contents.paths,
            hash,
            dir,
        };
        for relative in &staged.paths {
            let payload = staged.payload_path(relative);
            if tokio::fs::symlink_metadata(&payload).await.is_err() {
                return Err(invalid(artifact, format!("listed file {relative} is missing")));
            }
        }
        Ok(staged)
    }
}

fn invalid(artifact: &Path, message: String) -> Error {
    InstallError::InvalidArtifact {
        path: artifact.display().to_string(),
        message,
    }
    .into()
}
