// src/engine/executor.rs

//! Pluggable step executor abstraction.
//!
//! The artifact handler never builds anything itself. It resolves the
//! [`StepExecutor`] registered for the artifact's type and hands it the
//! artifact plus a [`BuildContext`]. Production embedders plug in their
//! package-manager specific executors; tests provide fakes that record
//! what they were asked to build.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;

use crate::changes::FileChanges;
use crate::jobs::{BoxFuture, JobId};
use crate::types::{Artifact, ArtifactName};

/// What an executor gets to know about the build of one artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
    pub repository_dir: PathBuf,
    pub job_id: JobId,
    pub dependencies: BTreeSet<ArtifactName>,
    /// `None` when changes are unknown (first build, forced build).
    pub changed_files: Option<FileChanges>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOutcome {
    pub success: bool,
    /// Handed back to the repository job as the child's state.
    pub state: Option<Value>,
}

impl StepOutcome {
    pub fn success() -> Self {
        Self {
            success: true,
            state: None,
        }
    }

    pub fn failure() -> Self {
        Self::default()
    }
}

/// Builds one artifact.
///
/// Executors report problems through [`StepOutcome::success`]; there is no
/// error channel. Timeouts and retries are the executor's business.
pub trait StepExecutor: Send + Sync {
    fn execute<'a>(
        &'a self,
        artifact: &'a Artifact,
        ctx: &'a BuildContext,
    ) -> BoxFuture<'a, StepOutcome>;
}

/// Artifact type to executor table.
#[derive(Default, Clone)]
pub struct StepExecutors {
    by_type: HashMap<String, Arc<dyn StepExecutor>>,
    fallback: Option<Arc<dyn StepExecutor>>,
}

impl fmt::Debug for StepExecutors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<&String> = self.by_type.keys().collect();
        types.sort();
        f.debug_struct("StepExecutors")
            .field("types", &types)
            .field("has_fallback", &self.fallback.is_some())
            .finish()
    }
}

impl StepExecutors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        mut self,
        artifact_type: impl Into<String>,
        executor: impl StepExecutor + 'static,
    ) -> Self {
        self.by_type.insert(artifact_type.into(), Arc::new(executor));
        self
    }

    /// Executor used for types without a dedicated registration.
    pub fn with_fallback(mut self, executor: impl StepExecutor + 'static) -> Self {
        self.fallback = Some(Arc::new(executor));
        self
    }

    pub fn resolve(&self, artifact_type: &str) -> Option<Arc<dyn StepExecutor>> {
        self.by_type
            .get(artifact_type)
            .or(self.fallback.as_ref())
            .cloned()
    }
}
