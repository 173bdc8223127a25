//! Moving staged packages into the environment with rollback

use crate::metadata::MetadataStore;
use crate::staging::StagedPackage;
use kiln_errors::{Error, InstallError};
use kiln_types::InstalledRecord;
use std::path::{Path, PathBuf};

/// Journal of every environment mutation made by one install
///
/// Each step is recorded before the next one starts so that a failure at
/// any point can be undone in reverse order.
#[derive(Debug)]
pub struct Transaction<'a> {
    env_root: &'a Path,
    store: &'a MetadataStore,
    backup_dir: PathBuf,
    placed: Vec<PathBuf>,
    displaced: Vec<(PathBuf, PathBuf)>,
    retired: Vec<InstalledRecord>,
    written: Vec<InstalledRecord>,
}

impl<'a> Transaction<'a> {
    #[must_use]
    pub fn new(env_root: &'a Path, store: &'a MetadataStore, backup_dir: PathBuf) -> Self {
        Self {
            env_root,
            store,
            backup_dir,
            placed: Vec::new(),
            displaced: Vec::new(),
            retired: Vec::new(),
            written: Vec::new(),
        }
    }

    /// Take an installed package out of the environment
    ///
    /// Its files are parked in the backup dir and its record is removed.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be moved or the record removed.
    pub async fn retire(&mut self, record: &InstalledRecord) -> Result<(), Error> {
        for relative in &record.files {
            let path = self.env_root.join(relative);
            if tokio::fs::symlink_metadata(&path).await.is_ok() {
                self.displace(&path).await?;
                if let Some(parent) = path.parent() {
                    kiln_root::prune_empty_dirs(parent, self.env_root).await;
                }
            }
        }
        self.store.remove(record).await?;
        self.retired.push(record.clone());
        Ok(())
    }

    /// Move a staged payload into the environment
    ///
    /// Destinations must be free: files of replaced packages are retired
    /// first, and nothing else is ever overwritten.
    ///
    /// # Errors
    ///
    /// Returns `InstallError::UntrackedFile` if a destination is occupied, or
    /// an error if any file cannot be moved.
    pub async fn place(&mut self, staged: &StagedPackage) -> Result<(), Error> {
        for relative in &staged.paths {
            let dest = self.env_root.join(relative);
            if tokio::fs::symlink_metadata(&dest).await.is_ok() {
                return Err(InstallError::UntrackedFile {
                    path: relative.clone(),
                    package: staged.label(),
                }
                .into());
            }
            if let Some(parent) = dest.parent() {
                kiln_root::create_dir_all(parent).await?;
            }
            kiln_root::move_file(&staged.payload_path(relative), &dest).await?;
            self.placed.push(dest);
        }
        Ok(())
    }

    /// Write the record of a placed package
    ///
    /// # Errors
    ///
    /// Returns an error if the record cannot be written.
    pub async fn record(&mut self, record: InstalledRecord) -> Result<(), Error> {
        self.store.write(&record).await?;
        self.written.push(record);
        Ok(())
    }

    async fn displace(&mut self, path: &Path) -> Result<(), Error> {
        let backup = self.backup_dir.join(self.displaced.len().to_string());
        kiln_root::create_dir_all(&self.backup_dir).await?;
        kiln_root::move_file(path, &backup).await?;
        self.displaced.push((path.to_path_buf(), backup));
        Ok(())
    }

    /// Undo every recorded step, newest first
    ///
    /// # Errors
    ///
    /// Returns `InstallError::RollbackFailed` listing the steps that could
    /// not be undone; the environment may then be inconsistent.
    pub async fn rollback(self) -> Result<(), Error> {
        let mut failures = Vec::new();

        for record in self.written.iter().rev() {
            if let Err(e) = self.store.remove(record).await {
                failures.push(format!("record {}: {e}", record.filename()));
            }
        }

        for path in self.placed.iter().rev() {
            if let Err(e) = kiln_root::remove_file(path).await {
                failures.push(e.to_string());
            } else if let Some(parent) = path.parent() {
                kiln_root::prune_empty_dirs(parent, self.env_root).await;
            }
        }

        for (original, backup) in self.displaced.iter().rev() {
            let restored = match original.parent() {
                Some(parent) => kiln_root::create_dir_all(parent).await,
                None => Ok(()),
            };
            if let Err(e) = restored {
                failures.push(e.to_string());
            } else if let Err(e) = kiln_root::move_file(backup, original).await {
                failures.push(e.to_string());
            }
        }

        for record in self.retired.iter().rev() {
            if let Err(e) = self.store.write(record).await {
                failures.push(format!("record {}: {e}", record.filename()));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(InstallError::RollbackFailed {
                message: failures.join("; "),
            }
            .into())
        }
    }
}
