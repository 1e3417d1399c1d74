// tests/dag_properties.rs

use std::collections::BTreeSet;

use proptest::prelude::*;

use monobuild::dag::{
    affected_by_closure, ready_to_build, subset_to_build, validate_acyclic, DependencyGraph,
    SubsetFilter,
};
use monobuild::engine::BuildState;
use monobuild::types::BuildResult;

// Acyclic by construction: node i may only depend on nodes 0..i.
fn dag_strategy(max_nodes: usize) -> impl Strategy<Value = DependencyGraph> {
    (1..=max_nodes).prop_flat_map(|n| {
        proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..4), n).prop_map(
            move |raw_deps| {
                raw_deps
                    .into_iter()
                    .enumerate()
                    .map(|(i, potential)| {
                        let deps: BTreeSet<String> = potential
                            .into_iter()
                            .filter(|_| i > 0)
                            .map(|d| node(d % i.max(1)))
                            .collect();
                        (node(i), deps)
                    })
                    .collect::<DependencyGraph>()
            },
        )
    })
}

fn node(i: usize) -> String {
    format!("n{i:02}")
}

fn pick(graph: &DependencyGraph, picks: &[usize]) -> BTreeSet<String> {
    let names: Vec<&str> = graph.names().collect();
    picks
        .iter()
        .map(|i| names[i % names.len()].to_string())
        .collect()
}

proptest! {
    #[test]
    fn ready_set_is_exactly_the_unblocked_frontier(
        graph in dag_strategy(12),
        built_picks in proptest::collection::vec(any::<usize>(), 0..8),
    ) {
        prop_assert!(validate_acyclic(&graph).is_ok());
        let built = pick(&graph, &built_picks);
        let ready = ready_to_build(&graph, &built);

        for (name, deps) in graph.iter() {
            let expected = !built.contains(name) && deps.is_subset(&built);
            prop_assert_eq!(ready.contains(name), expected, "node {}", name);
        }
    }

    #[test]
    fn subset_edges_stay_inside_the_subset(
        graph in dag_strategy(12),
        changed_picks in proptest::collection::vec(any::<usize>(), 0..6),
        from_picks in proptest::collection::vec(any::<usize>(), 0..4),
        upto_picks in proptest::collection::vec(any::<usize>(), 0..3),
        just_picks in proptest::collection::vec(any::<usize>(), 0..3),
        use_changed in any::<bool>(),
    ) {
        let changed = pick(&graph, &changed_picks);
        let filter = SubsetFilter {
            from: Some(pick(&graph, &from_picks)),
            upto: Some(pick(&graph, &upto_picks)),
            just_build: Some(pick(&graph, &just_picks)),
        };
        let subset = subset_to_build(&graph, use_changed.then_some(&changed), &filter);

        let keys = subset.name_set();
        for (_, deps) in subset.iter() {
            prop_assert!(deps.is_subset(&keys));
        }
        prop_assert!(keys.is_subset(&graph.name_set()));
    }

    #[test]
    fn subset_is_idempotent(
        graph in dag_strategy(12),
        changed_picks in proptest::collection::vec(any::<usize>(), 0..6),
        from_picks in proptest::collection::vec(any::<usize>(), 0..4),
        upto_picks in proptest::option::of(proptest::collection::vec(any::<usize>(), 0..3)),
        just_picks in proptest::collection::vec(any::<usize>(), 0..3),
    ) {
        let changed = pick(&graph, &changed_picks);
        let filter = SubsetFilter {
            from: Some(pick(&graph, &from_picks)),
            upto: upto_picks.map(|picks| pick(&graph, &picks)),
            just_build: Some(pick(&graph, &just_picks)),
        };

        let once = subset_to_build(&graph, Some(&changed), &filter);
        let twice = subset_to_build(&once, Some(&changed), &filter);
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn failure_removes_exactly_the_affected_nodes(
        graph in dag_strategy(12),
        failed_pick in any::<usize>(),
    ) {
        let failed = pick(&graph, &[failed_pick]).into_iter().next().unwrap();
        let affected = affected_by_closure(&graph, [&failed]);

        let mut state = BuildState {
            dependency_graph: graph.clone(),
            ..BuildState::default()
        };
        state.record_child(&failed, false);

        prop_assert_eq!(&state.already_built_artifacts, &affected);
        for name in graph.names() {
            let expected = if name == failed {
                Some(BuildResult::Failure)
            } else if affected.contains(name) {
                Some(BuildResult::NotBuilt)
            } else {
                None
            };
            prop_assert_eq!(state.results.get(name).copied(), expected);
        }
    }
}
