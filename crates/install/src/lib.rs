#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Environment installer for kiln
//!
//! Installs built artifacts and their runtime dependency closure into an
//! environment root. Every installed package gets a JSON record under
//! `<env>/.kiln-meta`. Installation is all-or-nothing: artifacts are
//! fetched and unpacked into a staging area first, file conflicts and
//! untracked files are checked before the environment is touched, and a
//! failed commit is rolled back.

mod commit;
mod config;
mod conflict;
mod fetch;
mod installer;
mod metadata;
mod staging;

pub use config::{InstallConfig, RetryConfig};
pub use conflict::{detect_conflicts, detect_untracked};
pub use fetch::{ChannelFetcher, FetchedArtifact, PackageFetcher};
pub use installer::{InstallRequest, Installer};
pub use metadata::{MetadataStore, META_DIR};
pub use staging::{StagedPackage, StagingArea};
