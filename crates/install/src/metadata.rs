//! Installed-package records under `<env>/.kiln-meta`

use kiln_errors::{Error, InstallError};
use kiln_root::TEMP_PREFIX;
use kiln_types::InstalledRecord;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Metadata directory inside an environment root
pub const META_DIR: &str = ".kiln-meta";

/// Reads and writes the JSON records of one environment
///
/// Writes are serialized through a mutex and each record is replaced
/// atomically, so concurrent writers never interleave partial files.
#[derive(Debug)]
pub struct MetadataStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl MetadataStore {
    /// Store for the environment at `env_root`
    #[must_use]
    pub fn new(env_root: &Path) -> Self {
        Self {
            dir: env_root.join(META_DIR),
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the record for `record`
    #[must_use]
    pub fn record_path(&self, record: &InstalledRecord) -> PathBuf {
        self.dir.join(record.filename())
    }

    /// Create the metadata directory
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub async fn ensure(&self) -> Result<(), Error> {
        kiln_root::create_dir_all(&self.dir).await
    }

    /// Load every record, sorted by name
    ///
    /// A missing metadata directory means an empty environment.
    ///
    /// # Errors
    ///
    /// Returns `InstallError::MetadataCorrupted` for unreadable records.
    pub async fn load_all(&self) -> Result<Vec<InstalledRecord>, Error> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io_with_path(&e, &self.dir)),
        };

        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            if !file_name.ends_with(".json")
                || file_name.starts_with(TEMP_PREFIX)
                || !entry.file_type().await?.is_file()
            {
                continue;
            }

            let content = tokio::fs::read(&path)
                .await
                .map_err(|e| Error::io_with_path(&e, &path))?;
            let record: InstalledRecord =
                serde_json::from_slice(&content).map_err(|e| InstallError::MetadataCorrupted {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?;
            records.push(record);
        }

        records.sort_by(|a, b| a.name.cmp(&b.name).then(a.version.cmp(&b.version)));
        Ok(records)
    }

    /// Atomically write a record, returning its path
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub async fn write(&self, record: &InstalledRecord) -> Result<PathBuf, Error> {
        let content = serde_json::to_vec_pretty(record)?;
        let path = self.record_path(record);

        let _guard = self.lock.lock().await;
        kiln_root::atomic_write(&path, &content).await?;
        Ok(path)
    }

    /// Remove a record; a missing record is not an error
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    pub async fn remove(&self, record: &InstalledRecord) -> Result<(), Error> {
        let path = self.record_path(record);
        let _guard = self.lock.lock().await;
        kiln_root::remove_file(&path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use kiln_types::{Platform, Version};
    use std::sync::Arc;

    fn record(name: &str, env: &Path) -> InstalledRecord {
        InstalledRecord {
            name: name.into(),
            version: Version::new(1, 0, 0),
            build: "h0_0".into(),
            platform: Platform::NoArch,
            install_path: env.to_path_buf(),
            files: vec![format!("bin/{name}")],
            hash: "00".into(),
            depends: vec![],
            installed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_missing_dir_is_empty() {
        let env = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(env.path());
        assert!(store.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_writes_all_land() {
        let env = tempfile::tempdir().unwrap();
        let store = Arc::new(MetadataStore::new(env.path()));
        store.ensure().await.unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            let record = record(&format!("pkg{i}"), env.path());
            handles.push(tokio::spawn(async move { store.write(&record).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let records = store.load_all().await.unwrap();
        assert_eq!(records.len(), 8);
        assert_eq!(records[0].name, "pkg0");
        assert!(env
            .path()
            .join(META_DIR)
            .join("pkg3-1.0.0-h0_0.json")
            .is_file());
    }

    #[tokio::test]
    async fn test_corrupted_record() {
        let env = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(env.path());
        store.ensure().await.unwrap();
        std::fs::write(store.dir().join("bad-1.0.0-h0_0.json"), "{not json").unwrap();

        assert!(matches!(
            store.load_all().await,
            Err(Error::Install(InstallError::MetadataCorrupted { .. }))
        ));
    }

    #[tokio::test]
    async fn test_remove_record() {
        let env = tempfile::tempdir().unwrap();
        let store = MetadataStore::new(env.path());
        store.ensure().await.unwrap();
        let record = record("smokey", env.path());

        let path = store.write(&record).await.unwrap();
        assert!(path.is_file());
        store.remove(&record).await.unwrap();
        assert!(!path.exists());
        store.remove(&record).await.unwrap();
    }
}
