// src/changes/markers.rs

//! Last-successful-build markers.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::changes::hash::Fingerprint;
use crate::fs::FileSystem;
use crate::types::ArtifactName;

/// Relative path (from the repository root) of the marker file.
pub const MARKER_FILE_PATH: &str = ".monobuild/markers.json";

/// What was true of an artifact the last time it built successfully.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildMarker {
    /// Repository commit the build ran against.
    pub commit: String,
    /// Fingerprints of the files that were modified in the workspace at
    /// build time, keyed by path relative to the artifact directory.
    #[serde(default)]
    pub files: BTreeMap<String, Fingerprint>,
}

/// Abstract storage for build markers.
pub trait MarkerStore: Send + Sync {
    fn load(&self, artifact: &str) -> Result<Option<BuildMarker>>;
    fn save(&mut self, artifact: &str, marker: &BuildMarker) -> Result<()>;
    /// Remove markers of artifacts that are not in `active`.
    fn prune(&mut self, active: &[&str]) -> Result<()>;
}

/// Stores all markers in one JSON document (`.monobuild/markers.json`).
#[derive(Debug)]
pub struct FileMarkerStore {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
}

impl FileMarkerStore {
    pub fn new(fs: Arc<dyn FileSystem>, repository_dir: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            path: repository_dir.into().join(MARKER_FILE_PATH),
        }
    }

    fn load_all(&self) -> Result<BTreeMap<ArtifactName, BuildMarker>> {
        match self.fs.read_optional(&self.path)? {
            None => Ok(BTreeMap::new()),
            Some(text) => serde_json::from_str(&text)
                .with_context(|| format!("parsing marker file at {:?}", self.path)),
        }
    }

    fn save_all(&self, map: &BTreeMap<ArtifactName, BuildMarker>) -> Result<()> {
        let json = serde_json::to_string_pretty(map)?;
        self.fs
            .write(&self.path, json.as_bytes())
            .with_context(|| format!("writing marker file at {:?}", self.path))
    }
}

impl MarkerStore for FileMarkerStore {
    fn load(&self, artifact: &str) -> Result<Option<BuildMarker>> {
        Ok(self.load_all()?.remove(artifact))
    }

    fn save(&mut self, artifact: &str, marker: &BuildMarker) -> Result<()> {
        let mut map = self.load_all()?;
        map.insert(artifact.to_string(), marker.clone());
        self.save_all(&map)?;
        info!(artifact = %artifact, commit = %marker.commit, "stored build marker (file)");
        Ok(())
    }

    fn prune(&mut self, active: &[&str]) -> Result<()> {
        let mut map = self.load_all()?;
        let initial_len = map.len();
        map.retain(|k, _| active.contains(&k.as_str()));

        if map.len() < initial_len {
            self.save_all(&map)?;
            info!(
                removed = initial_len - map.len(),
                "pruned stale build markers (file)"
            );
        }
        Ok(())
    }
}

/// Keeps markers in memory only.
#[derive(Debug, Default)]
pub struct MemoryMarkerStore {
    map: HashMap<ArtifactName, BuildMarker>,
}

impl MemoryMarkerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MarkerStore for MemoryMarkerStore {
    fn load(&self, artifact: &str) -> Result<Option<BuildMarker>> {
        Ok(self.map.get(artifact).cloned())
    }

    fn save(&mut self, artifact: &str, marker: &BuildMarker) -> Result<()> {
        self.map.insert(artifact.to_string(), marker.clone());
        info!(artifact = %artifact, commit = %marker.commit, "stored build marker (memory)");
        Ok(())
    }

    fn prune(&mut self, active: &[&str]) -> Result<()> {
        let initial_len = self.map.len();
        self.map.retain(|k, _| active.contains(&k.as_str()));
        if self.map.len() < initial_len {
            info!(
                removed = initial_len - self.map.len(),
                "pruned stale build markers (memory)"
            );
        }
        Ok(())
    }
}
