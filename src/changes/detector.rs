// src/changes/detector.rs

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use tracing::{debug, warn};

use crate::changes::hash::live_fingerprint;
use crate::changes::ignore::{IgnoreRules, DEFAULT_IGNORE_FILE};
use crate::changes::markers::{BuildMarker, MarkerStore};
use crate::changes::vcs::VcsBackend;
use crate::changes::{ChangeSet, FileChanges};
use crate::fs::FileSystem;
use crate::types::Artifact;

/// Turns repository history, live file content and last-successful-build
/// markers into a [`ChangeSet`].
///
/// Detection never fails: anything that cannot be determined leaves the
/// artifact out of the change set, which callers treat as "changed".
#[derive(Clone)]
pub struct ChangeDetector {
    vcs: Arc<dyn VcsBackend>,
    fs: Arc<dyn FileSystem>,
    markers: Arc<Mutex<Box<dyn MarkerStore>>>,
    ignore_file: String,
}

impl fmt::Debug for ChangeDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeDetector")
            .field("vcs", &self.vcs)
            .field("ignore_file", &self.ignore_file)
            .finish_non_exhaustive()
    }
}

impl ChangeDetector {
    pub fn new(
        vcs: Arc<dyn VcsBackend>,
        fs: Arc<dyn FileSystem>,
        markers: Arc<Mutex<Box<dyn MarkerStore>>>,
    ) -> Self {
        Self {
            vcs,
            fs,
            markers,
            ignore_file: DEFAULT_IGNORE_FILE.to_string(),
        }
    }

    /// Use a different ignore file name than `.monobuildignore`.
    pub fn with_ignore_file(mut self, name: impl Into<String>) -> Self {
        self.ignore_file = name.into();
        self
    }

    /// Compute the change set of `artifacts` in the repository at `repo`.
    pub async fn detect(&self, repo: &Path, artifacts: &[Artifact]) -> ChangeSet {
        let mut change_set = ChangeSet::default();

        let head = match self.vcs.head_commit(repo).await {
            Ok(commit) => commit,
            Err(e) => {
                warn!(repo = ?repo, error = %e, "cannot read current commit; treating all artifacts as changed");
                return change_set;
            }
        };
        let workspace = match self.vcs.workspace_changes(repo).await {
            Ok(files) => files,
            Err(e) => {
                warn!(repo = ?repo, error = %e, "cannot list workspace changes; treating all artifacts as changed");
                return change_set;
            }
        };

        let mut ignore = IgnoreRules::new(Arc::clone(&self.fs), repo, self.ignore_file.as_str());
        let mut history: HashMap<String, Option<Vec<String>>> = HashMap::new();

        for artifact in artifacts {
            match self
                .detect_artifact(repo, artifact, &head, &workspace, &mut history)
                .await
            {
                Ok(Some(files)) => {
                    let files: FileChanges = files
                        .into_iter()
                        .filter(|(rel, _)| !ignore.is_ignored(&repo_relative(artifact, rel)))
                        .collect();
                    debug!(
                        artifact = %artifact.name,
                        changed_files = files.len(),
                        "computed artifact changes"
                    );
                    change_set.insert(artifact.path.clone(), files);
                }
                Ok(None) => {
                    debug!(artifact = %artifact.name, "no previous successful build; assuming changed");
                }
                Err(e) => {
                    warn!(
                        artifact = %artifact.name,
                        error = %e,
                        "change detection failed; assuming changed"
                    );
                }
            }
        }

        change_set
    }

    /// Record that `artifact` just built successfully against the current
    /// state of the repository.
    pub async fn record_successful_build(&self, repo: &Path, artifact: &Artifact) -> Result<BuildMarker> {
        let commit = self.vcs.head_commit(repo).await?;
        let workspace = self.vcs.workspace_changes(repo).await?;
        let mut files = BTreeMap::new();

        for rel in workspace.iter().filter_map(|p| artifact.relative_path(p)) {
            let fingerprint = live_fingerprint(self.fs.as_ref(), &artifact_dir(repo, artifact).join(rel))?;
            files.insert(rel.to_string(), fingerprint);
        }

        let marker = BuildMarker { commit, files };
        self.lock_markers()?.save(&artifact.name, &marker)?;
        Ok(marker)
    }

    /// Drop markers of artifacts that no longer exist.
    pub fn prune_markers(&self, artifacts: &[Artifact]) -> Result<()> {
        let active: Vec<&str> = artifacts.iter().map(|a| a.name.as_str()).collect();
        self.lock_markers()?.prune(&active)
    }

    fn lock_markers(&self) -> Result<std::sync::MutexGuard<'_, Box<dyn MarkerStore>>> {
        self.markers
            .lock()
            .map_err(|_| anyhow!("marker store lock poisoned"))
    }

    fn load_marker(&self, name: &str) -> Result<Option<BuildMarker>> {
        self.lock_markers()?.load(name)
    }

    /// `Ok(None)` when the artifact has never been built successfully.
    ///
    /// `history` caches the files touched since each marker commit, so
    /// artifacts built at the same commit share one VCS query.
    async fn detect_artifact(
        &self,
        repo: &Path,
        artifact: &Artifact,
        head: &str,
        workspace: &[String],
        history: &mut HashMap<String, Option<Vec<String>>>,
    ) -> Result<Option<FileChanges>> {
        let Some(marker) = self.load_marker(&artifact.name)? else {
            return Ok(None);
        };

        let dir = artifact_dir(repo, artifact);
        let mut changed = FileChanges::new();

        if marker.commit != head {
            if !history.contains_key(&marker.commit) {
                let touched = match self.vcs.changed_files_between(repo, &marker.commit, head).await {
                    Ok(files) => Some(files),
                    Err(e) => {
                        warn!(from = %marker.commit, to = %head, error = %e, "cannot read history");
                        None
                    }
                };
                history.insert(marker.commit.clone(), touched);
            }
            let touched = history
                .get(&marker.commit)
                .and_then(Option::as_ref)
                .ok_or_else(|| anyhow!("history between {} and {} is unavailable", marker.commit, head))?;

            for rel in touched.iter().filter_map(|p| artifact.relative_path(p)) {
                changed.insert(rel.to_string(), live_fingerprint(self.fs.as_ref(), &dir.join(rel))?);
            }
        }

        let mut candidates: BTreeSet<&str> = marker.files.keys().map(String::as_str).collect();
        candidates.extend(workspace.iter().filter_map(|p| artifact.relative_path(p)));

        for rel in candidates {
            if changed.contains_key(rel) {
                continue;
            }
            let live = live_fingerprint(self.fs.as_ref(), &dir.join(rel))?;
            if marker.files.get(rel) != Some(&live) {
                changed.insert(rel.to_string(), live);
            }
        }

        Ok(Some(changed))
    }
}

fn artifact_dir(repo: &Path, artifact: &Artifact) -> PathBuf {
    let path = artifact.path.trim_end_matches('/');
    if path.is_empty() || path == "." {
        repo.to_path_buf()
    } else {
        repo.join(path)
    }
}

fn repo_relative(artifact: &Artifact, rel: &str) -> String {
    let path = artifact.path.trim_end_matches('/');
    if path.is_empty() || path == "." {
        rel.to_string()
    } else {
        format!("{path}/{rel}")
    }
}

