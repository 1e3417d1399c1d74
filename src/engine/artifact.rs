// src/engine/artifact.rs

use tracing::{info, warn};

use crate::changes::ChangeDetector;
use crate::errors::Result;
use crate::jobs::{BoxFuture, JobContext, JobHandler, JobKind, JobResult};

use super::executor::{BuildContext, StepExecutors};

/// Handler of `ArtifactBuild` jobs.
#[derive(Debug, Clone)]
pub struct ArtifactBuildHandler {
    executors: StepExecutors,
    detector: ChangeDetector,
}

impl ArtifactBuildHandler {
    pub fn new(executors: StepExecutors, detector: ChangeDetector) -> Self {
        Self {
            executors,
            detector,
        }
    }

    async fn run(&self, ctx: JobContext<'_>) -> Result<JobResult> {
        let JobKind::ArtifactBuild(request) = &ctx.job.kind else {
            return Err(anyhow::anyhow!("artifact handler received a {:?} job", ctx.job.kind.tag()).into());
        };
        let artifact = &request.artifact;

        let Some(executor) = self.executors.resolve(&artifact.artifact_type) else {
            warn!(
                artifact = %artifact.name,
                kind = %artifact.artifact_type,
                "no step executor for artifact type"
            );
            return Ok(JobResult::failure());
        };

        let build_ctx = BuildContext {
            repository_dir: request.repository_dir.clone(),
            job_id: ctx.job.id,
            dependencies: request.dependencies.clone(),
            changed_files: request.changed_files.clone(),
        };

        info!(job_id = %ctx.job.id, artifact = %artifact.name, "building artifact");
        let outcome = executor.execute(artifact, &build_ctx).await;

        if outcome.success {
            info!(artifact = %artifact.name, "artifact built");
            if let Err(e) = self
                .detector
                .record_successful_build(&request.repository_dir, artifact)
                .await
            {
                warn!(artifact = %artifact.name, error = %e, "failed to record build marker");
            }
        } else {
            warn!(artifact = %artifact.name, "artifact build failed");
        }

        Ok(JobResult {
            success: outcome.success,
            state_to_persist: outcome.state,
            sub_jobs: Vec::new(),
        })
    }
}

impl JobHandler for ArtifactBuildHandler {
    fn handle<'a>(&'a self, ctx: JobContext<'a>) -> BoxFuture<'a, Result<JobResult>> {
        Box::pin(self.run(ctx))
    }
}
