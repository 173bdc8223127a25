#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Core type definitions for kiln
//!
//! This crate provides the fundamental types shared by every kiln crate:
//! version specifications, package identities, target platforms, build
//! artifacts and installed-package records.

pub mod artifact;
pub mod package;
pub mod platform;
pub mod record;
pub mod reports;
pub mod version;

// Re-export commonly used types
pub use artifact::{artifact_filename, BuildArtifact, PackageIndex, ARTIFACT_EXTENSION};
pub use package::{DepKind, PackageId, PackageSpec};
pub use platform::Platform;
pub use record::InstalledRecord;
pub use reports::{BuildReport, InstallReport};
pub use semver::Version;
pub use version::{parse_version, VersionConstraint, VersionSpec};

use serde::{Deserialize, Serialize};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Plain,
    #[default]
    Tty,
    Json,
}

/// Color output choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorChoice {
    Always,
    #[default]
    Auto,
    Never,
}

impl clap::ValueEnum for ColorChoice {
    fn value_variants<'a>() -> &'a [Self] {
        &[Self::Always, Self::Auto, Self::Never]
    }

    fn to_possible_value(&self) -> Option<clap::builder::PossibleValue> {
        Some(match self {
            Self::Always => clap::builder::PossibleValue::new("always"),
            Self::Auto => clap::builder::PossibleValue::new("auto"),
            Self::Never => clap::builder::PossibleValue::new("never"),
        })
    }
}

impl std::str::FromStr for ColorChoice {
    type Err = kiln_errors::ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "always" => Ok(Self::Always),
            "auto" => Ok(Self::Auto),
            "never" => Ok(Self::Never),
            _ => Err(kiln_errors::ConfigError::InvalidValue {
                field: "color".to_string(),
                value: s.to_string(),
            }),
        }
    }
}
