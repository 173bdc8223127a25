//! Dependency graph ordering

use kiln_errors::{Error, ResolveError};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Dependency graph over package names
///
/// An edge `a -> b` means `a` depends on `b`.
#[derive(Clone, Debug, Default)]
pub struct DependencyGraph {
    edges: BTreeMap<String, BTreeSet<String>>,
}

impl DependencyGraph {
    /// Create new empty graph
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add node to graph
    pub fn add_node(&mut self, name: impl Into<String>) {
        self.edges.entry(name.into()).or_default();
    }

    /// Add a dependency edge; both ends become nodes
    pub fn add_edge(&mut self, from: &str, to: &str) {
        self.add_node(to);
        self.edges
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
    }

    /// Number of nodes
    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Order nodes so every package comes after its dependencies
    ///
    /// Ties are broken by name, so the order is deterministic.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError::Cycle` naming the packages left on a cycle.
    pub fn dependency_order(&self) -> Result<Vec<String>, Error> {
        // Remaining unsatisfied dependencies per node
        let mut pending: BTreeMap<&str, usize> = self
            .edges
            .iter()
            .map(|(name, deps)| (name.as_str(), deps.len()))
            .collect();

        let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for (name, deps) in &self.edges {
            for dep in deps {
                dependents.entry(dep.as_str()).or_default().push(name.as_str());
            }
        }

        let mut ready: VecDeque<&str> = pending
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(name, _)| *name)
            .collect();

        let mut order = Vec::with_capacity(self.edges.len());
        while let Some(name) = ready.pop_front() {
            order.push(name.to_string());
            for dependent in dependents.get(name).into_iter().flatten() {
                if let Some(count) = pending.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push_back(*dependent);
                    }
                }
            }
        }

        if order.len() != self.edges.len() {
            let stuck: Vec<&str> = pending
                .into_iter()
                .filter(|(_, count)| *count > 0)
                .map(|(name, _)| name)
                .collect();
            return Err(ResolveError::Cycle {
                packages: stuck.join(" -> "),
            }
            .into());
        }

        Ok(order)
    }
}
