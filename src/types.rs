use std::collections::BTreeSet;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Canonical artifact name type used throughout the crate.
pub type ArtifactName = String;

/// A buildable unit of the repository (a package).
///
/// Artifacts are immutable for the duration of a build run; the
/// orchestrator carries them by value inside its persisted state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub name: ArtifactName,
    /// Location of the artifact, relative to the repository root and using
    /// forward slashes (e.g. `"packages/a"`).
    pub path: String,
    /// Selects the step executor for this artifact (e.g. `"npm"`).
    #[serde(rename = "type")]
    pub artifact_type: String,
    #[serde(default)]
    pub dependencies: BTreeSet<ArtifactName>,
    #[serde(default)]
    pub owners: BTreeSet<String>,
}

impl Artifact {
    pub fn new(
        name: impl Into<ArtifactName>,
        path: impl Into<String>,
        artifact_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            artifact_type: artifact_type.into(),
            dependencies: BTreeSet::new(),
            owners: BTreeSet::new(),
        }
    }

    /// Returns true if `rel_path` (relative to the repository root) lies
    /// inside this artifact's directory.
    pub fn contains(&self, rel_path: &str) -> bool {
        let root = self.path.trim_end_matches('/');
        if root.is_empty() || root == "." {
            return true;
        }
        rel_path
            .strip_prefix(root)
            .is_some_and(|rest| rest.starts_with('/'))
    }

    /// Strip this artifact's directory from a repository-relative path.
    pub fn relative_path<'a>(&self, rel_path: &'a str) -> Option<&'a str> {
        let root = self.path.trim_end_matches('/');
        if root.is_empty() || root == "." {
            return Some(rel_path);
        }
        rel_path.strip_prefix(root)?.strip_prefix('/')
    }
}

/// Final outcome of an artifact in a repository build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildResult {
    Success,
    Failure,
    /// Skipped because a dependency failed or the build was aborted.
    NotBuilt,
}

impl fmt::Display for BuildResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BuildResult::Success => "success",
            BuildResult::Failure => "failure",
            BuildResult::NotBuilt => "not-built",
        };
        f.write_str(s)
    }
}
