//! Fetching resolved artifacts into the package cache

use crate::config::RetryConfig;
use async_trait::async_trait;
use kiln_errors::{Error, InstallError, UserFacingError};
use kiln_events::{AppEvent, EventEmitter, EventSender, InstallEvent};
use kiln_hash::Hash;
use kiln_resolver::ResolvedPackage;
use kiln_root::TEMP_PREFIX;
use std::path::{Path, PathBuf};

/// A locally available artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedArtifact {
    pub path: PathBuf,
    /// Served from the cache without copying
    pub cached: bool,
    pub bytes: u64,
}

/// Makes resolved packages available on the local filesystem
#[async_trait]
pub trait PackageFetcher: Send + Sync {
    /// Fetch `package`, verifying its advertised hash
    ///
    /// # Errors
    ///
    /// Returns `InstallError::Fetch` once retries are exhausted.
    async fn fetch(&self, package: &ResolvedPackage) -> Result<FetchedArtifact, Error>;
}

/// Copies artifacts out of local channel directories into the cache
#[derive(Debug, Clone)]
pub struct ChannelFetcher {
    cache_dir: PathBuf,
    retry: RetryConfig,
    event_sender: Option<EventSender>,
}

impl ChannelFetcher {
    #[must_use]
    pub fn new(cache_dir: PathBuf, retry: RetryConfig) -> Self {
        Self {
            cache_dir,
            retry,
            event_sender: None,
        }
    }

    #[must_use]
    pub fn with_event_sender(mut self, sender: EventSender) -> Self {
        self.event_sender = Some(sender);
        self
    }

    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    async fn cached_copy(dest: &Path, expected: &Hash) -> Option<u64> {
        let metadata = tokio::fs::metadata(dest).await.ok()?;
        match kiln_hash::verify_file(dest, expected).await {
            Ok(true) => Some(metadata.len()),
            _ => None,
        }
    }

    async fn copy_once(
        &self,
        package: &ResolvedPackage,
        dest: &Path,
        expected: &Hash,
    ) -> Result<u64, Error> {
        let name = package.id.to_string();
        let source = tokio::fs::File::open(&package.artifact)
            .await
            .map_err(|e| fetch_error(&name, &package.artifact, &e))?;

        let tmp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .tempfile_in(&self.cache_dir)
            .map_err(|e| Error::io_with_path(&e, &self.cache_dir))?;
        let mut writer = tokio::fs::File::from_std(tmp.as_file().try_clone()?);

        let (actual, bytes) = Hash::hash_and_copy(source, &mut writer).await?;
        writer.sync_all().await?;

        if actual != *expected {
            return Err(InstallError::Fetch {
                package: name,
                message: format!("hash mismatch: expected {expected}, got {actual}"),
                retryable: true,
            }
            .into());
        }

        tmp.persist(dest).map_err(|e| InstallError::Fetch {
            package: name,
            message: format!("failed to store {}: {}", dest.display(), e.error),
            retryable: true,
        })?;
        Ok(bytes)
    }
}

fn fetch_error(package: &str, path: &Path, err: &std::io::Error) -> Error {
    InstallError::Fetch {
        package: package.to_string(),
        message: format!("{}: {err}", path.display()),
        retryable: !matches!(
            err.kind(),
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied
        ),
    }
    .into()
}

impl EventEmitter for ChannelFetcher {
    fn event_sender(&self) -> Option<&EventSender> {
        self.event_sender.as_ref()
    }
}

#[async_trait]
impl PackageFetcher for ChannelFetcher {
    async fn fetch(&self, package: &ResolvedPackage) -> Result<FetchedArtifact, Error> {
        let name = package.id.to_string();
        let expected = Hash::from_hex(&package.hash).map_err(|e| InstallError::Fetch {
            package: name.clone(),
            message: format!("channel advertises an invalid hash: {e}"),
            retryable: false,
        })?;

        kiln_root::create_dir_all(&self.cache_dir).await?;
        let dest = self.cache_dir.join(package.filename());

        if let Some(bytes) = Self::cached_copy(&dest, &expected).await {
            return Ok(FetchedArtifact {
                path: dest,
                cached: true,
                bytes,
            });
        }

        let mut attempt = 0;
        loop {
            match self.copy_once(package, &dest, &expected).await {
                Ok(bytes) => {
                    return Ok(FetchedArtifact {
                        path: dest,
                        cached: false,
                        bytes,
                    })
                }
                Err(e) if e.is_retryable() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    let delay = self.retry.delay_for(attempt);
                    self.emit(AppEvent::Install(InstallEvent::FetchRetrying {
                        package: name.clone(),
                        attempt,
                        delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    }));
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_types::{PackageId, Platform, Version};
    use std::time::Duration;

    fn package(artifact: PathBuf, hash: &str) -> ResolvedPackage {
        ResolvedPackage {
            id: PackageId::new("boltons", Version::new(24, 0, 0)),
            build: "h1_0".into(),
            build_number: 0,
            platform: Platform::NoArch,
            depends: vec![],
            artifact,
            hash: hash.into(),
        }
    }

    fn quick_retry() -> RetryConfig {
        RetryConfig {
            max_retries: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            ..RetryConfig::default()
        }
    }

    #[tokio::test]
    async fn test_fetch_copies_then_hits_cache() {
        let channel = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let artifact = channel.path().join("boltons-24.0.0-h1_0.conda");
        std::fs::write(&artifact, b"artifact bytes").unwrap();
        let hash = Hash::from_data(b"artifact bytes").to_hex();

        let fetcher = ChannelFetcher::new(cache.path().to_path_buf(), quick_retry());
        let first = fetcher.fetch(&package(artifact.clone(), &hash)).await.unwrap();
        assert!(!first.cached);
        assert_eq!(first.bytes, 14);
        assert_eq!(first.path, cache.path().join("boltons-24.0.0-h1_0.conda"));

        let second = fetcher.fetch(&package(artifact, &hash)).await.unwrap();
        assert!(second.cached);
    }

    #[tokio::test]
    async fn test_hash_mismatch_retries_then_fails() {
        let channel = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let artifact = channel.path().join("boltons-24.0.0-h1_0.conda");
        std::fs::write(&artifact, b"tampered").unwrap();
        let hash = Hash::from_data(b"original").to_hex();

        let (tx, mut rx) = kiln_events::channel();
        let fetcher =
            ChannelFetcher::new(cache.path().to_path_buf(), quick_retry()).with_event_sender(tx);
        let err = fetcher.fetch(&package(artifact, &hash)).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Install(InstallError::Fetch { retryable: true, .. })
        ));

        let mut retries = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, AppEvent::Install(InstallEvent::FetchRetrying { .. })) {
                retries += 1;
            }
        }
        assert_eq!(retries, 2);
        assert!(!cache.path().join("boltons-24.0.0-h1_0.conda").exists());
    }

    #[tokio::test]
    async fn test_missing_artifact_is_not_retried() {
        let cache = tempfile::tempdir().unwrap();
        let hash = Hash::from_data(b"x").to_hex();
        let fetcher = ChannelFetcher::new(cache.path().to_path_buf(), quick_retry());

        let err = fetcher
            .fetch(&package(PathBuf::from("/nonexistent/pkg.conda"), &hash))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Install(InstallError::Fetch { retryable: false, .. })
        ));
    }
}
