//! Installer settings

use kiln_config::Config;
use std::path::PathBuf;
use std::time::Duration;

/// Retry behaviour for fetching artifacts
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (starting at 1)
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        #[allow(clippy::cast_precision_loss)]
        let base_delay = self.initial_delay.as_millis().min(u128::from(u64::MAX)) as f64;
        #[allow(clippy::cast_precision_loss)]
        let max_delay = self.max_delay.as_millis().min(u128::from(u64::MAX)) as f64;

        // Attempts stay small, the cast cannot wrap
        #[allow(clippy::cast_possible_wrap)]
        let exponent = attempt.saturating_sub(1) as i32;
        let delay = (base_delay * self.backoff_multiplier.powi(exponent)).min(max_delay);

        let jitter = delay * self.jitter_factor * (rand::random::<f64>() - 0.5);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let final_delay = (delay + jitter).max(0.0).round() as u64;

        Duration::from_millis(final_delay)
    }
}

/// Installer configuration
#[derive(Debug, Clone)]
pub struct InstallConfig {
    /// Width of the fetch and staging pool
    pub parallel_fetches: usize,
    pub retry: RetryConfig,
    /// Where fetched artifacts are cached
    pub pkgs_dir: PathBuf,
}

impl InstallConfig {
    #[must_use]
    pub fn new(pkgs_dir: PathBuf) -> Self {
        Self {
            parallel_fetches: 4,
            retry: RetryConfig::default(),
            pkgs_dir,
        }
    }

    /// Derive installer settings from the application config
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            parallel_fetches: config.install.parallel_fetches,
            retry: RetryConfig {
                max_retries: config.install.fetch_retries,
                initial_delay: Duration::from_millis(config.install.retry_delay_ms),
                max_delay: Duration::from_millis(config.install.max_retry_delay_ms),
                ..RetryConfig::default()
            },
            pkgs_dir: config.pkgs_dir(),
        }
    }

    #[must_use]
    pub fn with_parallel_fetches(mut self, width: usize) -> Self {
        self.parallel_fetches = width;
        self
    }

    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_is_capped() {
        let retry = RetryConfig {
            jitter_factor: 0.0,
            ..RetryConfig::default()
        };
        assert_eq!(retry.delay_for(1), Duration::from_millis(200));
        assert_eq!(retry.delay_for(2), Duration::from_millis(400));
        assert_eq!(retry.delay_for(3), Duration::from_millis(800));
        assert_eq!(retry.delay_for(20), Duration::from_secs(5));
    }

    #[test]
    fn test_jitter_stays_within_factor() {
        let retry = RetryConfig::default();
        for _ in 0..50 {
            let delay = retry.delay_for(2).as_millis();
            assert!((380..=420).contains(&delay), "delay {delay} out of range");
        }
    }

    #[test]
    fn test_from_config() {
        let config = Config::default();
        let install = InstallConfig::from_config(&config);
        assert_eq!(install.parallel_fetches, config.install.parallel_fetches);
        assert_eq!(install.retry.max_retries, config.install.fetch_retries);
        assert!(install.pkgs_dir.ends_with("pkgs"));
    }
}
