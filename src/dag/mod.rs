// src/dag/mod.rs

//! Dependency-graph algorithms. Pure functions, no I/O.
//!
//! - [`graph`] holds the adjacency map and cycle validation.
//! - [`subset`] computes the sub-graph that must be built under the
//!   changed / `from` / `upto` / `just_build` filters.
//! - [`scheduler`] determines the ready frontier and the selection rule.

pub mod graph;
pub mod scheduler;
pub mod subset;

pub use graph::{create_dependency_graph, validate_acyclic, DependencyGraph};
pub use scheduler::{build_order, ready_to_build, select_next};
pub use subset::{affected_by_closure, needs_closure, subset_to_build, SubsetFilter};
