// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::changes::DEFAULT_IGNORE_FILE;
use crate::types::Artifact;

/// Top-level configuration as read from `Monobuild.toml`:
///
/// ```toml
/// [config]
/// store = ".monobuild/jobs.sqlite"
/// ignore_file = ".monobuildignore"
///
/// [artifact.web]
/// path = "packages/web"
/// type = "npm"
/// dependencies = ["ui-kit"]
/// owners = ["team-web"]
/// ```
///
/// Deserialization only; [`ConfigFile`] is the validated form.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    /// All artifacts from `[artifact.<name>]`, keyed by name.
    #[serde(default)]
    pub artifact: BTreeMap<String, ArtifactConfig>,
}

/// `[config]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConfigSection {
    /// Job store location, relative to the repository root.
    #[serde(default = "default_store")]
    pub store: String,

    /// Name of the per-directory ignore files.
    #[serde(default = "default_ignore_file")]
    pub ignore_file: String,
}

fn default_store() -> String {
    ".monobuild/jobs.sqlite".to_string()
}

fn default_ignore_file() -> String {
    DEFAULT_IGNORE_FILE.to_string()
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            store: default_store(),
            ignore_file: default_ignore_file(),
        }
    }
}

/// `[artifact.<name>]` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ArtifactConfig {
    /// Directory of the artifact, relative to the repository root.
    pub path: String,

    /// Selects the step executor (e.g. `"npm"`).
    #[serde(rename = "type")]
    pub artifact_type: String,

    /// Names of artifacts (or external packages) this one depends on.
    #[serde(default)]
    pub dependencies: Vec<String>,

    #[serde(default)]
    pub owners: Vec<String>,
}

/// Validated configuration. Build it with `ConfigFile::try_from(raw)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub config: ConfigSection,
    pub artifact: BTreeMap<String, ArtifactConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        artifact: BTreeMap<String, ArtifactConfig>,
    ) -> Self {
        Self { config, artifact }
    }

    /// The configured artifacts, in name order.
    pub fn artifacts(&self) -> Vec<Artifact> {
        to_artifacts(&self.artifact)
    }
}

pub(crate) fn to_artifacts(sections: &BTreeMap<String, ArtifactConfig>) -> Vec<Artifact> {
    sections
        .iter()
        .map(|(name, cfg)| Artifact {
            name: name.clone(),
            path: cfg.path.clone(),
            artifact_type: cfg.artifact_type.clone(),
            dependencies: cfg.dependencies.iter().cloned().collect(),
            owners: cfg.owners.iter().cloned().collect(),
        })
        .collect()
}
