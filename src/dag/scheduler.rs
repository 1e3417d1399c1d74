// src/dag/scheduler.rs

//! Deciding which artifacts can be built next.

use std::collections::BTreeSet;

use crate::dag::graph::DependencyGraph;
use crate::types::ArtifactName;

/// Every node of `graph` whose dependencies are all in `already_built` and
/// which is not itself already built.
pub fn ready_to_build(
    graph: &DependencyGraph,
    already_built: &BTreeSet<ArtifactName>,
) -> BTreeSet<ArtifactName> {
    graph
        .iter()
        .filter(|(name, deps)| {
            !already_built.contains(*name) && deps.iter().all(|d| already_built.contains(d))
        })
        .map(|(name, _)| name.clone())
        .collect()
}

/// Pick the artifact to dispatch next out of a ready set.
///
/// The rule is lexicographic order of artifact names, which makes build
/// logs reproducible across runs.
pub fn select_next(ready: &BTreeSet<ArtifactName>) -> Option<&ArtifactName> {
    ready.iter().next()
}

/// The order in which a one-at-a-time build walks `graph` when every
/// artifact succeeds.
pub fn build_order(graph: &DependencyGraph) -> Vec<ArtifactName> {
    let mut built = BTreeSet::new();
    let mut order = Vec::with_capacity(graph.len());

    loop {
        let ready = ready_to_build(graph, &built);
        let Some(next) = select_next(&ready) else {
            break;
        };
        order.push(next.clone());
        built.insert(next.clone());
    }

    order
}
