#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Configuration management for kiln
//!
//! This crate handles loading and merging configuration from:
//! - Default values (hard-coded)
//! - Configuration file (~/.config/kiln/config.toml)
//! - Environment variables (`KILN_*`)
//! - CLI flags (applied by the caller)

pub mod resources;

use kiln_errors::{ConfigError, Error};
use kiln_types::{ColorChoice, OutputFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

pub use resources::{acquire_semaphore_permit, create_semaphore};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub install: InstallConfig,

    #[serde(default)]
    pub paths: PathConfig,
}

/// General configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GeneralConfig {
    #[serde(default)]
    pub default_output: OutputFormat,
    #[serde(default)]
    pub color: ColorChoice,
}

/// Build configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    #[serde(default)]
    pub jobs: usize, // 0 = auto-detect
    /// zstd level used when packaging artifacts
    #[serde(default = "default_compression_level")]
    pub compression_level: i32,
}

/// Install configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallConfig {
    #[serde(default = "default_parallel_fetches")]
    pub parallel_fetches: usize,
    #[serde(default = "default_fetch_retries")]
    pub fetch_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_max_retry_delay_ms")]
    pub max_retry_delay_ms: u64,
}

/// Path configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PathConfig {
    pub cache_dir: Option<PathBuf>,
    /// Channels consulted after the ones a manifest declares
    #[serde(default)]
    pub channels: Vec<PathBuf>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            jobs: 0,
            compression_level: default_compression_level(),
        }
    }
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            parallel_fetches: default_parallel_fetches(),
            fetch_retries: default_fetch_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            max_retry_delay_ms: default_max_retry_delay_ms(),
        }
    }
}

fn default_compression_level() -> i32 {
    3
}

fn default_parallel_fetches() -> usize {
    4
}

fn default_fetch_retries() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    200
}

fn default_max_retry_delay_ms() -> u64 {
    5_000
}

fn env_parse<T: std::str::FromStr>(var: &str) -> Result<Option<T>, Error> {
    match std::env::var(var) {
        Ok(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                field: var.to_string(),
                value,
            }
            .into()),
        Err(_) => Ok(None),
    }
}

impl Config {
    /// Get the default config file path
    ///
    /// # Errors
    ///
    /// Returns an error if the system config directory cannot be determined.
    pub fn default_path() -> Result<PathBuf, Error> {
        let config_dir = dirs::config_dir().ok_or_else(|| ConfigError::NotFound {
            path: "config directory".to_string(),
        })?;
        Ok(config_dir.join("kiln").join("config.toml"))
    }

    /// Load configuration from file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, contains invalid TOML,
    /// or holds out-of-range values.
    pub async fn load_from_file(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|_| ConfigError::NotFound {
                path: path.display().to_string(),
            })?;

        let config: Self = toml::from_str(&contents).map_err(|e| ConfigError::Malformed {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with fallback to defaults
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file exists but cannot be read
    /// or contains invalid TOML syntax.
    pub async fn load() -> Result<Self, Error> {
        match Self::default_path() {
            Ok(path) if fs::try_exists(&path).await.unwrap_or(false) => {
                Self::load_from_file(&path).await
            }
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from an optional path or use default
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self, Error> {
        match path {
            Some(config_path) => Self::load_from_file(config_path).await,
            None => Self::load().await,
        }
    }

    /// Merge with environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables contain invalid values
    /// that cannot be parsed into the expected types.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        if let Some(color) = env_parse::<ColorChoice>("KILN_COLOR")? {
            self.general.color = color;
        }

        if let Some(jobs) = env_parse("KILN_BUILD_JOBS")? {
            self.build.jobs = jobs;
        }

        if let Some(fetches) = env_parse("KILN_PARALLEL_FETCHES")? {
            self.install.parallel_fetches = fetches;
        }

        if let Some(retries) = env_parse("KILN_FETCH_RETRIES")? {
            self.install.fetch_retries = retries;
        }

        if let Ok(cache) = std::env::var("KILN_CACHE_DIR") {
            self.paths.cache_dir = Some(PathBuf::from(cache));
        }

        // KILN_CHANNELS uses the platform path-list separator
        if let Some(channels) = std::env::var_os("KILN_CHANNELS") {
            self.paths.channels = std::env::split_paths(&channels).collect();
        }

        self.validate()
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for out-of-range settings.
    pub fn validate(&self) -> Result<(), Error> {
        if !(1..=22).contains(&self.build.compression_level) {
            return Err(ConfigError::InvalidValue {
                field: "build.compression_level".to_string(),
                value: self.build.compression_level.to_string(),
            }
            .into());
        }
        if self.install.parallel_fetches == 0 {
            return Err(ConfigError::InvalidValue {
                field: "install.parallel_fetches".to_string(),
                value: "0".to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Package cache root (with default)
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.paths.cache_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir().map_or_else(|| PathBuf::from(".kiln-cache"), |d| d.join("kiln"))
        })
    }

    /// Directory holding fetched and locally built artifacts
    #[must_use]
    pub fn pkgs_dir(&self) -> PathBuf {
        self.cache_dir().join("pkgs")
    }

    /// Effective number of build jobs
    #[must_use]
    pub fn build_jobs(&self) -> usize {
        calculate_build_jobs(self.build.jobs)
    }
}

/// Calculate build jobs based on CPU count
#[must_use]
pub fn calculate_build_jobs(config_value: usize) -> usize {
    if config_value > 0 {
        config_value // User override
    } else {
        // Use 75% of CPUs for builds, minimum 1
        let cpus = num_cpus::get();
        (cpus * 3 / 4).max(1)
    }
}
