// src/engine/repository.rs

use std::collections::{BTreeMap, BTreeSet};
use std::iter;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::changes::{changed_artifacts, ChangeDetector, ChangeSet};
use crate::dag::{
    affected_by_closure, create_dependency_graph, ready_to_build, select_next, subset_to_build,
    validate_acyclic, DependencyGraph, SubsetFilter,
};
use crate::errors::{MonobuildError, Result};
use crate::events::{BuildEvent, EventBus};
use crate::jobs::store::state_key;
use crate::jobs::{
    ArtifactBuildRequest, AwakenedFrom, BoxFuture, Job, JobContext, JobHandler, JobId, JobKind,
    JobResult, JobStore, RepositoryBuildRequest, SubJob,
};
use crate::types::{Artifact, ArtifactName, BuildResult};

/// What a repository build is going to do, computed before anything runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPlan {
    pub change_set: ChangeSet,
    /// Artifacts that are unknown to, or changed in, `change_set`.
    pub changed: BTreeSet<ArtifactName>,
    /// The sub-graph that will be built.
    pub subset: DependencyGraph,
}

/// Compute the build plan of `request`.
///
/// Fails with [`MonobuildError::DagCycle`] if the artifacts' dependencies
/// form a cycle.
pub async fn plan_build(
    detector: &ChangeDetector,
    request: &RepositoryBuildRequest,
) -> Result<BuildPlan> {
    let artifacts = &request.artifacts;

    let change_set = if request.force {
        debug!("forced build; treating every artifact as changed");
        ChangeSet::default()
    } else {
        detector.detect(&request.repository_dir, artifacts).await
    };

    let graph = create_dependency_graph(artifacts);
    validate_acyclic(&graph)?;

    let changed = changed_artifacts(&change_set, artifacts);
    let subset = subset_to_build(&graph, Some(&changed), &subset_filter(request));

    Ok(BuildPlan {
        change_set,
        changed,
        subset,
    })
}

/// The request's filters; no filter at all means "from every artifact".
pub fn subset_filter(request: &RepositoryBuildRequest) -> SubsetFilter {
    let filter = SubsetFilter {
        from: request.from.clone(),
        upto: request.upto.clone(),
        just_build: request.just_build.clone(),
    };
    if filter.is_empty() {
        SubsetFilter::from(request.artifacts.iter().map(|a| a.name.clone()))
    } else {
        filter
    }
}

/// Persisted state of a repository build between two steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildState {
    pub all_artifacts: Vec<Artifact>,
    /// The subset being built.
    pub dependency_graph: DependencyGraph,
    pub already_built_artifacts: BTreeSet<ArtifactName>,
    pub change_set: ChangeSet,
    #[serde(default)]
    pub results: BTreeMap<ArtifactName, BuildResult>,
    #[serde(default)]
    pub aborted: bool,
}

impl BuildState {
    pub fn new(artifacts: Vec<Artifact>, plan: BuildPlan) -> Self {
        Self {
            all_artifacts: artifacts,
            dependency_graph: plan.subset,
            change_set: plan.change_set,
            ..Self::default()
        }
    }

    /// Fold the result of a finished artifact job into the state.
    ///
    /// A failure marks the artifact failed and everything in the subset
    /// that transitively depends on it as not built.
    pub fn record_child(&mut self, name: &ArtifactName, success: bool) {
        if success {
            self.results.insert(name.clone(), BuildResult::Success);
            self.already_built_artifacts.insert(name.clone());
            return;
        }

        self.results.insert(name.clone(), BuildResult::Failure);
        self.already_built_artifacts.insert(name.clone());

        for skipped in affected_by_closure(&self.dependency_graph, iter::once(name)) {
            if &skipped == name || self.already_built_artifacts.contains(&skipped) {
                continue;
            }
            debug!(artifact = %skipped, failed = %name, "skipping artifact after dependency failure");
            self.results.insert(skipped.clone(), BuildResult::NotBuilt);
            self.already_built_artifacts.insert(skipped);
        }
    }

    /// Mark every artifact that has not been built yet as not built.
    pub fn skip_remaining(&mut self) {
        let remaining: Vec<ArtifactName> = self
            .dependency_graph
            .names()
            .filter(|n| !self.already_built_artifacts.contains(*n))
            .map(str::to_string)
            .collect();
        for name in remaining {
            self.results.insert(name.clone(), BuildResult::NotBuilt);
            self.already_built_artifacts.insert(name);
        }
    }

    /// Whether every artifact of the subset built successfully.
    pub fn succeeded(&self) -> bool {
        self.results.values().all(|r| *r == BuildResult::Success)
    }

    fn artifact(&self, name: &str) -> Result<&Artifact> {
        self.all_artifacts
            .iter()
            .find(|a| a.name == name)
            .ok_or_else(|| MonobuildError::ArtifactNotFound(name.to_string()))
    }

    /// Dependencies of `artifact` that are artifacts of this repository.
    fn internal_dependencies(&self, artifact: &Artifact) -> BTreeSet<ArtifactName> {
        artifact
            .dependencies
            .iter()
            .filter(|d| self.all_artifacts.iter().any(|a| &a.name == *d))
            .cloned()
            .collect()
    }
}

/// Handler of `RepositoryBuild` jobs.
///
/// Each step either dispatches exactly one artifact job (and suspends
/// until it completes) or, once nothing is buildable, finishes.
#[derive(Debug, Clone)]
pub struct RepositoryBuildHandler {
    detector: ChangeDetector,
}

impl RepositoryBuildHandler {
    pub fn new(detector: ChangeDetector) -> Self {
        Self { detector }
    }

    async fn start(
        &self,
        job_id: JobId,
        request: &RepositoryBuildRequest,
        events: &EventBus,
    ) -> Result<BuildState> {
        if let Err(e) = self.detector.prune_markers(&request.artifacts) {
            warn!(error = %e, "failed to prune stale build markers");
        }

        let plan = plan_build(&self.detector, request).await?;
        let artifacts_to_be_built = plan.subset.name_set();
        info!(
            job_id = %job_id,
            changed = plan.changed.len(),
            to_build = artifacts_to_be_built.len(),
            "starting repository build"
        );
        events.publish(BuildEvent::StartingRepoJob {
            job_id,
            artifacts_to_be_built,
        });

        Ok(BuildState::new(request.artifacts.clone(), plan))
    }

    fn resume(state: &mut BuildState, from: &AwakenedFrom) {
        match from.job.kind.artifact() {
            Some(artifact) => state.record_child(&artifact.name, from.result.success),
            None => warn!(child = %from.job.id, "awakened by a job that is not an artifact build"),
        }
    }

    async fn step(&self, ctx: JobContext<'_>) -> Result<JobResult> {
        let JobKind::RepositoryBuild(request) = &ctx.job.kind else {
            return Err(anyhow!("repository handler received a {:?} job", ctx.job.kind.tag()).into());
        };
        let job_id = ctx.job.id;

        let mut state = match ctx.persisted_state {
            Some(value) => serde_json::from_value::<BuildState>(value)?,
            None => self.start(job_id, request, ctx.events).await?,
        };

        if let Some(from) = ctx.awakened_from {
            Self::resume(&mut state, from);
        }

        if state.aborted {
            info!(job_id = %job_id, "repository build aborted; skipping remaining artifacts");
            state.skip_remaining();
        }

        let ready = ready_to_build(&state.dependency_graph, &state.already_built_artifacts);
        let Some(next) = select_next(&ready) else {
            let success = state.succeeded();
            info!(
                job_id = %job_id,
                built = state.already_built_artifacts.len(),
                success,
                "finishing repository build"
            );
            ctx.events.publish(BuildEvent::FinishingRepoJob {
                job_id,
                already_built_artifacts: state.already_built_artifacts.clone(),
                results: state.results.clone(),
            });
            return Ok(JobResult {
                success,
                state_to_persist: Some(serde_json::to_value(&state.results)?),
                sub_jobs: Vec::new(),
            });
        };

        let artifact = state.artifact(next)?.clone();
        debug!(job_id = %job_id, artifact = %artifact.name, ready = ready.len(), "dispatching artifact");

        let child = Job::artifact_build(ArtifactBuildRequest {
            repository_dir: request.repository_dir.clone(),
            dependencies: state.internal_dependencies(&artifact),
            changed_files: state.change_set.get(&artifact.path).cloned(),
            artifact,
        });

        Ok(JobResult {
            success: true,
            state_to_persist: Some(serde_json::to_value(&state)?),
            sub_jobs: vec![SubJob {
                job: child,
                awaken: true,
            }],
        })
    }
}

impl JobHandler for RepositoryBuildHandler {
    fn handle<'a>(&'a self, ctx: JobContext<'a>) -> BoxFuture<'a, Result<JobResult>> {
        Box::pin(self.step(ctx))
    }
}

/// Ask a suspended repository build to stop dispatching artifacts.
///
/// The artifact in flight finishes; everything not yet built ends up
/// not built. Returns `false` if `job_id` has no suspended state.
pub fn request_abort(store: &dyn JobStore, job_id: &JobId) -> Result<bool> {
    let key = state_key(job_id);
    let Some(value) = store.get(&key)? else {
        return Ok(false);
    };
    let mut state: BuildState = serde_json::from_value(value)?;
    state.aborted = true;
    store.put(&key, serde_json::to_value(&state)?)?;
    info!(job_id = %job_id, "abort requested for repository build");
    Ok(true)
}
