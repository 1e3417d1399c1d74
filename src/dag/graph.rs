// src/dag/graph.rs

use std::collections::{BTreeMap, BTreeSet};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{MonobuildError, Result};
use crate::types::{Artifact, ArtifactName};

/// Mapping from artifact name to its direct dependency names.
///
/// Dependency lists only ever reference keys of the same graph: edges to
/// names outside the key set are dropped when the graph is built or
/// filtered. Acyclicity is checked by [`validate_acyclic`]; the algorithms
/// in this module assume it holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DependencyGraph {
    nodes: BTreeMap<ArtifactName, BTreeSet<ArtifactName>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) a node with the given dependency list, verbatim.
    pub fn insert<I, S>(&mut self, name: impl Into<ArtifactName>, deps: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<ArtifactName>,
    {
        self.nodes
            .insert(name.into(), deps.into_iter().map(Into::into).collect());
    }

    pub fn remove(&mut self, name: &str) -> Option<BTreeSet<ArtifactName>> {
        self.nodes.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All node names, in lexicographic order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(|s| s.as_str())
    }

    pub fn name_set(&self) -> BTreeSet<ArtifactName> {
        self.nodes.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ArtifactName, &BTreeSet<ArtifactName>)> {
        self.nodes.iter()
    }

    /// Direct dependencies of `name` (empty for unknown nodes).
    pub fn dependencies_of(&self, name: &str) -> Option<&BTreeSet<ArtifactName>> {
        self.nodes.get(name)
    }

    /// Reverse adjacency for repeated dependent lookups.
    pub(crate) fn dependents_map(&self) -> BTreeMap<&str, Vec<&str>> {
        let mut map: BTreeMap<&str, Vec<&str>> =
            self.nodes.keys().map(|k| (k.as_str(), Vec::new())).collect();
        for (name, deps) in &self.nodes {
            for dep in deps {
                if let Some(list) = map.get_mut(dep.as_str()) {
                    list.push(name.as_str());
                }
            }
        }
        map
    }
}

impl FromIterator<(ArtifactName, BTreeSet<ArtifactName>)> for DependencyGraph {
    fn from_iter<T: IntoIterator<Item = (ArtifactName, BTreeSet<ArtifactName>)>>(iter: T) -> Self {
        Self {
            nodes: iter.into_iter().collect(),
        }
    }
}

/// Build the dependency graph of a set of artifacts.
///
/// Dependencies naming something that is not one of `artifacts` (external
/// packages) are dropped.
pub fn create_dependency_graph(artifacts: &[Artifact]) -> DependencyGraph {
    let known: BTreeSet<&str> = artifacts.iter().map(|a| a.name.as_str()).collect();

    artifacts
        .iter()
        .map(|artifact| {
            let deps: BTreeSet<ArtifactName> = artifact
                .dependencies
                .iter()
                .filter(|dep| {
                    let keep = known.contains(dep.as_str());
                    if !keep {
                        debug!(
                            artifact = %artifact.name,
                            dep = %dep,
                            "dependency is not an artifact of this repository; ignoring"
                        );
                    }
                    keep
                })
                .cloned()
                .collect();
            (artifact.name.clone(), deps)
        })
        .collect()
}

/// Fail with [`MonobuildError::DagCycle`] if the graph contains a cycle.
pub fn validate_acyclic(graph: &DependencyGraph) -> Result<()> {
    // Edge direction: dep -> dependent.
    let mut g: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in graph.names() {
        g.add_node(name);
    }
    for (name, deps) in graph.iter() {
        for dep in deps {
            if dep == name {
                return Err(MonobuildError::DagCycle(format!(
                    "artifact '{}' depends on itself",
                    name
                )));
            }
            g.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&g, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(MonobuildError::DagCycle(format!(
            "cycle detected in dependency graph involving artifact '{}'",
            cycle.node_id()
        ))),
    }
}
