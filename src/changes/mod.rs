// src/changes/mod.rs

//! Incremental change detection.
//!
//! This module turns repository history and file content into a per-artifact
//! set of changed files:
//! - [`vcs`] answers "what commit is checked out", "which files changed
//!   between two commits" and "what is modified in the workspace".
//! - [`hash`] fingerprints file content with blake3.
//! - [`markers`] stores what each artifact looked like when it last built
//!   successfully.
//! - [`ignore`] applies hierarchical ignore files.
//! - [`detector`] combines the above into a [`ChangeSet`].

pub mod detector;
pub mod hash;
pub mod ignore;
pub mod markers;
pub mod vcs;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::types::{Artifact, ArtifactName};

pub use detector::ChangeDetector;
pub use hash::{Fingerprint, DELETED};
pub use ignore::{IgnoreRules, DEFAULT_IGNORE_FILE};
pub use markers::{BuildMarker, FileMarkerStore, MarkerStore, MemoryMarkerStore, MARKER_FILE_PATH};
pub use vcs::{GitCli, VcsBackend};

/// Changed files of one artifact: path relative to the artifact directory
/// mapped to the file's current fingerprint.
pub type FileChanges = BTreeMap<String, Fingerprint>;

/// Per-artifact changed files, keyed by artifact path.
///
/// A missing key means "unknown, assume changed"; an empty entry means
/// "known unchanged".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeSet {
    artifacts: BTreeMap<String, FileChanges>,
}

impl ChangeSet {
    pub fn insert(&mut self, artifact_path: impl Into<String>, files: FileChanges) {
        self.artifacts.insert(artifact_path.into(), files);
    }

    /// Changed files of the artifact at `artifact_path`, if known.
    pub fn get(&self, artifact_path: &str) -> Option<&FileChanges> {
        self.artifacts.get(artifact_path)
    }

    /// Whether `artifact` needs rebuilding according to this change set.
    pub fn is_changed(&self, artifact: &Artifact) -> bool {
        self.get(&artifact.path).is_none_or(|files| !files.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.artifacts.is_empty()
    }
}

/// Names of the artifacts that are unknown to, or changed in, `change_set`.
pub fn changed_artifacts(change_set: &ChangeSet, artifacts: &[Artifact]) -> BTreeSet<ArtifactName> {
    artifacts
        .iter()
        .filter(|a| change_set.is_changed(a))
        .map(|a| a.name.clone())
        .collect()
}
