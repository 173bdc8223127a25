#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Dependency resolution for kiln
//!
//! Resolution is a narrow collaborator: callers hand a [`ResolveRequest`] to
//! a [`DependencyResolver`] and get back a [`ResolvedSet`] in dependency-first
//! order. [`ChannelResolver`] implements it over local channel directories.

mod channel;
mod graph;
mod resolver;

pub use channel::{Candidate, Channel, ChannelEntry, ChannelIndex, CHANNEL_INDEX};
pub use graph::DependencyGraph;
pub use resolver::ChannelResolver;

use async_trait::async_trait;
use kiln_errors::Error;
use kiln_types::{artifact_filename, PackageId, PackageSpec, Platform};
use std::collections::BTreeSet;
use std::path::PathBuf;

/// A requirement and the package (or project) that declared it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub spec: PackageSpec,
    pub required_by: String,
}

/// Input to a resolver
#[derive(Debug, Clone)]
pub struct ResolveRequest {
    pub requirements: Vec<Requirement>,
    /// Names supplied by the caller (e.g. freshly built artifacts);
    /// requirements on them are not resolved from channels
    pub provided: BTreeSet<String>,
    pub platform: Platform,
}

impl ResolveRequest {
    /// Empty request targeting `platform`
    #[must_use]
    pub fn new(platform: Platform) -> Self {
        Self {
            requirements: Vec::new(),
            provided: BTreeSet::new(),
            platform,
        }
    }

    /// Add a requirement
    #[must_use]
    pub fn require(mut self, spec: PackageSpec, required_by: impl Into<String>) -> Self {
        self.requirements.push(Requirement {
            spec,
            required_by: required_by.into(),
        });
        self
    }

    /// Add several requirements from the same origin
    #[must_use]
    pub fn require_all(
        mut self,
        specs: impl IntoIterator<Item = PackageSpec>,
        required_by: &str,
    ) -> Self {
        for spec in specs {
            self = self.require(spec, required_by);
        }
        self
    }

    /// Mark a package name as supplied by the caller
    #[must_use]
    pub fn provide(mut self, name: impl Into<String>) -> Self {
        self.provided.insert(name.into());
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }
}

/// A concrete package chosen by the resolver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPackage {
    pub id: PackageId,
    pub build: String,
    pub build_number: u64,
    pub platform: Platform,
    pub depends: Vec<String>,
    /// Location of the artifact inside its channel
    pub artifact: PathBuf,
    /// BLAKE3 hex digest advertised by the channel
    pub hash: String,
}

impl ResolvedPackage {
    /// Canonical artifact filename
    #[must_use]
    pub fn filename(&self) -> String {
        artifact_filename(&self.id.name, &self.id.version, &self.build)
    }

    /// Parsed dependency specs
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::ChannelIndex` if a dependency string is malformed.
    pub fn depend_specs(&self) -> Result<Vec<PackageSpec>, Error> {
        resolver::parse_depends(&self.id.to_string(), &self.depends)
    }
}

/// Resolver output, every package after its dependencies
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedSet {
    pub packages: Vec<ResolvedPackage>,
}

impl ResolvedSet {
    #[must_use]
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ResolvedPackage> {
        self.packages.iter().find(|p| p.id.name == name)
    }

    /// `name-version` strings in resolution order
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.packages.iter().map(|p| p.id.to_string()).collect()
    }
}

/// External collaborator turning constraints into an installable set
#[async_trait]
pub trait DependencyResolver: Send + Sync {
    /// Resolve the transitive closure of `request`
    ///
    /// # Errors
    ///
    /// Returns a `ResolveError` when a package is unknown, constraints cannot
    /// be satisfied, or the dependency graph has a cycle.
    async fn resolve(&self, request: &ResolveRequest) -> Result<ResolvedSet, Error>;
}
