//! Operations context for dependency injection

use kiln_config::Config;
use kiln_errors::Error;
use kiln_events::{EventEmitter, EventSender};
use kiln_install::{ChannelFetcher, InstallConfig, Installer, PackageFetcher};
use kiln_resolver::{ChannelResolver, DependencyResolver};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Operations context providing access to all collaborators
pub struct OpsCtx {
    /// Effective configuration
    pub config: Config,
    /// Event sender for progress reporting
    pub tx: EventSender,
    /// Cancels the running operation between stages
    pub cancel: CancellationToken,
    resolver: Option<Arc<dyn DependencyResolver>>,
    fetcher: Arc<dyn PackageFetcher>,
}

impl std::fmt::Debug for OpsCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpsCtx")
            .field("config", &self.config)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl EventEmitter for OpsCtx {
    fn event_sender(&self) -> Option<&EventSender> {
        Some(&self.tx)
    }
}

impl OpsCtx {
    /// Resolver for a project declaring `channels`
    ///
    /// An injected resolver always wins; otherwise the manifest's channels
    /// are searched before the configured ones.
    #[must_use]
    pub fn resolver_for(&self, channels: Vec<PathBuf>) -> Arc<dyn DependencyResolver> {
        if let Some(resolver) = &self.resolver {
            return resolver.clone();
        }
        Arc::new(ChannelResolver::new(self.search_path(channels)))
    }

    /// Project channels followed by the configured ones, without repeats
    #[must_use]
    pub fn search_path(&self, channels: Vec<PathBuf>) -> Vec<PathBuf> {
        let mut all = channels;
        for channel in &self.config.paths.channels {
            if !all.contains(channel) {
                all.push(channel.clone());
            }
        }
        all
    }

    /// Installer wired to this context's fetcher, events and cancellation
    #[must_use]
    pub fn installer(&self, resolver: Arc<dyn DependencyResolver>) -> Installer {
        Installer::new(
            InstallConfig::from_config(&self.config),
            resolver,
            self.fetcher.clone(),
        )
        .with_event_sender(self.tx.clone())
        .with_cancellation(self.cancel.clone())
    }

    /// Fail with `Error::Cancelled` once cancellation was requested
    ///
    /// # Errors
    ///
    /// Returns `Error::Cancelled` if the token is cancelled.
    pub fn check_cancelled(&self) -> Result<(), Error> {
        if self.cancel.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Builder for operations context
#[derive(Default)]
pub struct OpsContextBuilder {
    config: Option<Config>,
    tx: Option<EventSender>,
    cancel: Option<CancellationToken>,
    resolver: Option<Arc<dyn DependencyResolver>>,
    fetcher: Option<Arc<dyn PackageFetcher>>,
}

impl OpsContextBuilder {
    /// Create new context builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    #[must_use]
    pub fn with_event_sender(mut self, tx: EventSender) -> Self {
        self.tx = Some(tx);
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Use a fixed resolver instead of one built from channels
    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn DependencyResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    #[must_use]
    pub fn with_fetcher(mut self, fetcher: Arc<dyn PackageFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Build the context
    ///
    /// # Errors
    ///
    /// Returns an error if no event sender was provided.
    pub fn build(self) -> Result<OpsCtx, Error> {
        let tx = self
            .tx
            .ok_or_else(|| Error::internal("event sender is required"))?;
        let config = self.config.unwrap_or_default();
        let fetcher = self.fetcher.unwrap_or_else(|| {
            let install = InstallConfig::from_config(&config);
            Arc::new(
                ChannelFetcher::new(install.pkgs_dir, install.retry).with_event_sender(tx.clone()),
            )
        });

        Ok(OpsCtx {
            config,
            tx,
            cancel: self.cancel.unwrap_or_default(),
            resolver: self.resolver,
            fetcher,
        })
    }
}
