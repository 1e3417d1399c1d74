// src/engine/mod.rs

//! Job handlers of a repository build.
//!
//! - [`repository`] owns the build state of one repository build and
//!   decides which artifact to build next.
//! - [`artifact`] builds a single artifact through a [`StepExecutor`].
//! - [`executor`] is the seam to whatever actually builds artifacts.

pub mod artifact;
pub mod executor;
pub mod repository;

pub use artifact::ArtifactBuildHandler;
pub use executor::{BuildContext, StepExecutor, StepExecutors, StepOutcome};
pub use repository::{
    plan_build, request_abort, subset_filter, BuildPlan, BuildState, RepositoryBuildHandler,
};

use crate::changes::ChangeDetector;
use crate::events::EventBus;
use crate::jobs::{HandlerRegistry, JobDispatcher, JobKindTag, JobStore};

/// Handler table with both job kinds of a repository build.
pub fn build_registry(detector: ChangeDetector, executors: StepExecutors) -> HandlerRegistry {
    HandlerRegistry::new()
        .register(
            JobKindTag::RepositoryBuild,
            RepositoryBuildHandler::new(detector.clone()),
        )
        .register(
            JobKindTag::ArtifactBuild,
            ArtifactBuildHandler::new(executors, detector),
        )
}

/// A dispatcher over `store` that can run repository builds.
pub fn build_dispatcher<S: JobStore>(
    store: S,
    detector: ChangeDetector,
    executors: StepExecutors,
    events: EventBus,
) -> JobDispatcher<S> {
    JobDispatcher::new(store, build_registry(detector, executors), events)
}
