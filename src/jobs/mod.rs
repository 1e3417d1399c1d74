// src/jobs/mod.rs

//! Resumable job tree.
//!
//! - [`store`] defines the durable queue + key/value contract and an
//!   in-memory implementation; [`sqlite`] is the on-disk one.
//! - [`registry`] maps the closed set of job kinds to handlers.
//! - [`dispatcher`] drains the queue and resolves "awaken" continuations.

pub mod dispatcher;
pub mod registry;
pub mod sqlite;
pub mod store;

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::changes::FileChanges;
use crate::types::{Artifact, ArtifactName};

pub use dispatcher::{DrainSummary, JobDispatcher};
pub use registry::{BoxFuture, HandlerRegistry, JobContext, JobHandler};
pub use sqlite::SqliteJobStore;
pub use store::{JobStore, MemoryJobStore, QueuedJob, StoreOp};

/// Unique job identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Options of a repository-level build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryBuildRequest {
    pub repository_dir: PathBuf,
    pub artifacts: Vec<Artifact>,
    #[serde(default)]
    pub from: Option<BTreeSet<ArtifactName>>,
    #[serde(default)]
    pub upto: Option<BTreeSet<ArtifactName>>,
    #[serde(default)]
    pub just_build: Option<BTreeSet<ArtifactName>>,
    /// Treat every artifact as changed.
    #[serde(default)]
    pub force: bool,
}

/// Build of a single artifact, dispatched by a repository build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactBuildRequest {
    pub repository_dir: PathBuf,
    pub artifact: Artifact,
    /// Dependencies of the artifact that are part of this repository.
    pub dependencies: BTreeSet<ArtifactName>,
    /// Files changed since the artifact's last successful build, if known.
    #[serde(default)]
    pub changed_files: Option<FileChanges>,
}

/// What a job does. The set of kinds is closed; each resolves to one
/// handler in the [`HandlerRegistry`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobKind {
    RepositoryBuild(RepositoryBuildRequest),
    ArtifactBuild(ArtifactBuildRequest),
}

/// Discriminant of [`JobKind`], used as the registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobKindTag {
    RepositoryBuild,
    ArtifactBuild,
}

impl JobKind {
    pub fn tag(&self) -> JobKindTag {
        match self {
            JobKind::RepositoryBuild(_) => JobKindTag::RepositoryBuild,
            JobKind::ArtifactBuild(_) => JobKindTag::ArtifactBuild,
        }
    }

    /// Human-readable kind: `"repository"` or the artifact's type.
    pub fn name(&self) -> &str {
        match self {
            JobKind::RepositoryBuild(_) => "repository",
            JobKind::ArtifactBuild(req) => &req.artifact.artifact_type,
        }
    }

    /// The artifact this job builds, if it is an artifact job.
    pub fn artifact(&self) -> Option<&Artifact> {
        match self {
            JobKind::ArtifactBuild(req) => Some(&req.artifact),
            JobKind::RepositoryBuild(_) => None,
        }
    }
}

/// A unit of work in the job tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    #[serde(flatten)]
    pub kind: JobKind,
    /// Parent suspended until this job completes.
    #[serde(default)]
    pub parent_waiting_id: Option<JobId>,
}

impl Job {
    pub fn new(kind: JobKind) -> Self {
        Self {
            id: JobId::new(),
            kind,
            parent_waiting_id: None,
        }
    }

    pub fn repository_build(request: RepositoryBuildRequest) -> Self {
        Self::new(JobKind::RepositoryBuild(request))
    }

    pub fn artifact_build(request: ArtifactBuildRequest) -> Self {
        Self::new(JobKind::ArtifactBuild(request))
    }
}

/// A job a handler wants dispatched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubJob {
    pub job: Job,
    /// Resume the dispatching job once this one completes.
    pub awaken: bool,
}

/// What a handler returns for one step of a job.
///
/// While the job still waits on children, `state_to_persist` replaces the
/// persisted state and `None` keeps it. Once the job completes, the state
/// is handed to the waiting parent instead.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    pub success: bool,
    #[serde(default)]
    pub state_to_persist: Option<serde_json::Value>,
    #[serde(default)]
    pub sub_jobs: Vec<SubJob>,
}

impl JobResult {
    pub fn success() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    pub fn failure() -> Self {
        Self::default()
    }
}

/// Result of a finished child, as delivered to its parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildResult {
    pub success: bool,
    #[serde(default)]
    pub state: Option<serde_json::Value>,
}

/// The child whose completion resumed a suspended job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AwakenedFrom {
    pub job: Job,
    pub result: ChildResult,
}
