// src/dag/subset.rs

//! Computing the part of the dependency graph that must be built.

use std::collections::BTreeSet;

use tracing::debug;

use crate::dag::graph::DependencyGraph;
use crate::types::ArtifactName;

/// Caller-supplied filters for [`subset_to_build`].
///
/// `None` means "filter not given"; `Some(empty)` is a filter that selects
/// nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubsetFilter {
    pub from: Option<BTreeSet<ArtifactName>>,
    pub upto: Option<BTreeSet<ArtifactName>>,
    pub just_build: Option<BTreeSet<ArtifactName>>,
}

impl SubsetFilter {
    pub fn from<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ArtifactName>,
    {
        Self {
            from: Some(names.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn upto<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ArtifactName>,
    {
        Self {
            upto: Some(names.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn just_build<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ArtifactName>,
    {
        Self {
            just_build: Some(names.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.from.is_none() && self.upto.is_none() && self.just_build.is_none()
    }
}

/// Closure of `seeds` under "needs-to-be-built-for": every node the seeds
/// transitively depend on, seeds included.
pub fn needs_closure<'a, I>(graph: &DependencyGraph, seeds: I) -> BTreeSet<ArtifactName>
where
    I: IntoIterator<Item = &'a ArtifactName>,
{
    let mut visited = BTreeSet::new();
    let mut stack: Vec<&str> = seeds
        .into_iter()
        .map(|s| s.as_str())
        .filter(|s| graph.contains(s))
        .collect();

    while let Some(name) = stack.pop() {
        if !visited.insert(name.to_string()) {
            continue;
        }
        if let Some(deps) = graph.dependencies_of(name) {
            stack.extend(
                deps.iter()
                    .map(|d| d.as_str())
                    .filter(|d| graph.contains(d)),
            );
        }
    }

    visited
}

/// Closure of `seeds` under "affected-by": every node that transitively
/// depends on a seed, seeds included.
pub fn affected_by_closure<'a, I>(graph: &DependencyGraph, seeds: I) -> BTreeSet<ArtifactName>
where
    I: IntoIterator<Item = &'a ArtifactName>,
{
    let dependents = graph.dependents_map();
    let mut visited = BTreeSet::new();
    let mut stack: Vec<&str> = seeds
        .into_iter()
        .map(|s| s.as_str())
        .filter(|s| graph.contains(s))
        .collect();

    while let Some(name) = stack.pop() {
        if !visited.insert(name.to_string()) {
            continue;
        }
        if let Some(next) = dependents.get(name) {
            stack.extend(next.iter().copied());
        }
    }

    visited
}

/// Compute the sub-graph that must be built.
///
/// Steps run in a fixed order: `upto`, `from`, `just_build`, dependency
/// filtering, then (only when `changed` is given) pruning of unchanged
/// leaves. The returned graph never has an edge to a node outside itself.
pub fn subset_to_build(
    graph: &DependencyGraph,
    changed: Option<&BTreeSet<ArtifactName>>,
    filter: &SubsetFilter,
) -> DependencyGraph {
    let mut result = DependencyGraph::new();

    // upto
    if let Some(upto) = &filter.upto {
        let mut survivors = needs_closure(graph, upto);
        if let Some(changed) = changed {
            let affected = affected_by_closure(graph, changed);
            survivors.retain(|name| affected.contains(name));
        }
        for name in survivors {
            if let Some(deps) = graph.dependencies_of(&name) {
                let deps = deps.clone();
                result.insert(name, deps);
            }
        }
    }

    // from
    let empty = BTreeSet::new();
    let from = filter.from.as_ref().unwrap_or(&empty);
    let mut seeds = intersect_with_changed(from, changed);
    seeds.extend(result.name_set());
    for name in affected_by_closure(graph, &seeds) {
        if let Some(deps) = graph.dependencies_of(&name) {
            let deps = deps.clone();
            result.insert(name, deps);
        }
    }

    // justBuild
    if let Some(just_build) = &filter.just_build {
        for name in intersect_with_changed(just_build, changed) {
            if let Some(deps) = graph.dependencies_of(&name) {
                let deps = deps.clone();
                result.insert(name, deps);
            }
        }
    }

    filter_dependencies(&mut result);

    if let Some(changed) = changed {
        loop {
            let prune: Vec<ArtifactName> = result
                .iter()
                .filter(|(name, deps)| deps.is_empty() && !changed.contains(*name))
                .map(|(name, _)| name.clone())
                .collect();
            if prune.is_empty() {
                break;
            }
            for name in &prune {
                debug!(artifact = %name, "pruning unchanged leaf from build subset");
                result.remove(name);
            }
            filter_dependencies(&mut result);
        }
    }

    result
}

fn intersect_with_changed(
    names: &BTreeSet<ArtifactName>,
    changed: Option<&BTreeSet<ArtifactName>>,
) -> BTreeSet<ArtifactName> {
    match changed {
        Some(changed) => names.intersection(changed).cloned().collect(),
        None => names.clone(),
    }
}

/// Drop every dependency edge that points outside the graph's own key set.
fn filter_dependencies(graph: &mut DependencyGraph) {
    let keys = graph.name_set();
    let filtered: Vec<(ArtifactName, BTreeSet<ArtifactName>)> = graph
        .iter()
        .map(|(name, deps)| {
            (
                name.clone(),
                deps.intersection(&keys).cloned().collect::<BTreeSet<_>>(),
            )
        })
        .collect();
    for (name, deps) in filtered {
        graph.insert(name, deps);
    }
}
