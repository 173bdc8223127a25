//! Greedy resolver over local channels

use crate::channel::Channel;
use crate::graph::DependencyGraph;
use crate::{DependencyResolver, ResolveRequest, ResolvedPackage, ResolvedSet};
use async_trait::async_trait;
use kiln_errors::{Error, ResolveError};
use kiln_types::{PackageId, PackageSpec, Platform, VersionSpec};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Upper bound on selection rounds before giving up
const MAX_ROUNDS: usize = 64;

/// A constraint on a package name and the package that imposed it
type Constraint = (VersionSpec, String);

/// Resolver that picks the newest matching build from a list of channels
///
/// Channels are consulted in order; the first channel offering a build that
/// satisfies every constraint wins. Selection is repeated until the chosen
/// set stops changing, so constraints introduced by a newly selected package
/// are applied to packages chosen in earlier rounds.
#[derive(Debug, Clone, Default)]
pub struct ChannelResolver {
    channels: Vec<PathBuf>,
}

impl ChannelResolver {
    #[must_use]
    pub fn new(channels: Vec<PathBuf>) -> Self {
        Self { channels }
    }

    #[must_use]
    pub fn channels(&self) -> &[PathBuf] {
        &self.channels
    }

    fn select(
        channels: &[Channel],
        name: &str,
        constraints: &[Constraint],
        platform: Platform,
    ) -> Result<ResolvedPackage, Error> {
        let mut listed = false;

        for channel in channels {
            listed |= channel.index.contains(name);
            let chosen = channel.index.candidates(name).into_iter().find(|c| {
                c.entry.platform.installable_on(platform)
                    && constraints.iter().all(|(spec, _)| spec.matches(&c.version))
            });

            if let Some(candidate) = chosen {
                let entry = candidate.entry;
                return Ok(ResolvedPackage {
                    id: PackageId::new(name, candidate.version),
                    build: entry.build.clone(),
                    build_number: entry.build_number,
                    platform: entry.platform,
                    depends: entry.depends.clone(),
                    artifact: channel.dir.join(&entry.file),
                    hash: entry.hash.clone(),
                });
            }
        }

        if !listed {
            return Err(ResolveError::PackageNotFound {
                name: name.to_string(),
            }
            .into());
        }

        let mut conflicting: Vec<String> = Vec::new();
        for (_, by) in constraints {
            if !conflicting.contains(by) {
                conflicting.push(by.clone());
            }
        }
        let rendered: Vec<String> = constraints
            .iter()
            .map(|(spec, by)| format!("{spec} (from {by})"))
            .collect();

        Err(ResolveError::Unsatisfiable {
            package: name.to_string(),
            constraints: rendered.join(", "),
            conflicting,
        }
        .into())
    }

    fn gather_constraints(
        request: &ResolveRequest,
        selected: &BTreeMap<String, ResolvedPackage>,
    ) -> Result<BTreeMap<String, Vec<Constraint>>, Error> {
        let mut constraints: BTreeMap<String, Vec<Constraint>> = BTreeMap::new();

        for requirement in &request.requirements {
            if request.provided.contains(&requirement.spec.name) {
                continue;
            }
            constraints
                .entry(requirement.spec.name.clone())
                .or_default()
                .push((requirement.spec.version_spec.clone(), requirement.required_by.clone()));
        }

        for package in selected.values() {
            for spec in package.depend_specs()? {
                if request.provided.contains(&spec.name) {
                    continue;
                }
                constraints
                    .entry(spec.name)
                    .or_default()
                    .push((spec.version_spec, package.id.name.clone()));
            }
        }

        Ok(constraints)
    }

    fn order(mut selected: BTreeMap<String, ResolvedPackage>) -> Result<ResolvedSet, Error> {
        let mut graph = DependencyGraph::new();
        for package in selected.values() {
            graph.add_node(package.id.name.clone());
            for spec in package.depend_specs()? {
                if selected.contains_key(&spec.name) {
                    graph.add_edge(&package.id.name, &spec.name);
                }
            }
        }

        let packages = graph
            .dependency_order()?
            .into_iter()
            .filter_map(|name| selected.remove(&name))
            .collect();
        Ok(ResolvedSet { packages })
    }
}

#[async_trait]
impl DependencyResolver for ChannelResolver {
    async fn resolve(&self, request: &ResolveRequest) -> Result<ResolvedSet, Error> {
        let mut channels = Vec::with_capacity(self.channels.len());
        for dir in &self.channels {
            channels.push(Channel::load(dir).await?);
        }

        let mut selected: BTreeMap<String, ResolvedPackage> = BTreeMap::new();
        for _ in 0..MAX_ROUNDS {
            let constraints = Self::gather_constraints(request, &selected)?;

            let mut next = BTreeMap::new();
            for (name, constraints) in &constraints {
                let package = Self::select(&channels, name, constraints, request.platform)?;
                next.insert(name.clone(), package);
            }

            if next == selected {
                return Self::order(selected);
            }
            selected = next;
        }

        Err(ResolveError::NotConverged { rounds: MAX_ROUNDS }.into())
    }
}

/// Parse dependency strings carried by channel metadata
pub(crate) fn parse_depends(owner: &str, depends: &[String]) -> Result<Vec<PackageSpec>, Error> {
    depends
        .iter()
        .map(|raw| {
            PackageSpec::parse(raw).map_err(|e| {
                ResolveError::ChannelIndex {
                    channel: owner.to_string(),
                    message: format!("invalid dependency {raw}: {e}"),
                }
                .into()
            })
        })
        .collect()
}
