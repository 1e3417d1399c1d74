#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};

use monobuild::config::{ArtifactConfig, ConfigFile, ConfigSection, RawConfigFile};
use monobuild::dag::DependencyGraph;
use monobuild::types::Artifact;

/// Set of artifact names from string literals.
pub fn names(list: &[&str]) -> BTreeSet<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// Dependency graph from `(name, deps)` pairs.
pub fn graph(nodes: &[(&str, &[&str])]) -> DependencyGraph {
    nodes
        .iter()
        .map(|(name, deps)| (name.to_string(), names(deps)))
        .collect()
}

/// Artifacts at `packages/<name>` of type `npm` from `(name, deps)` pairs.
pub fn artifacts(nodes: &[(&str, &[&str])]) -> Vec<Artifact> {
    nodes
        .iter()
        .map(|(name, deps)| ArtifactBuilder::new(name).depends_on_all(deps).build())
        .collect()
}

/// Builder for `Artifact`.
pub struct ArtifactBuilder {
    artifact: Artifact,
}

impl ArtifactBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            artifact: Artifact::new(name, format!("packages/{name}"), "npm"),
        }
    }

    pub fn path(mut self, path: &str) -> Self {
        self.artifact.path = path.to_string();
        self
    }

    pub fn kind(mut self, artifact_type: &str) -> Self {
        self.artifact.artifact_type = artifact_type.to_string();
        self
    }

    pub fn depends_on(mut self, dep: &str) -> Self {
        self.artifact.dependencies.insert(dep.to_string());
        self
    }

    pub fn depends_on_all(mut self, deps: &[&str]) -> Self {
        self.artifact
            .dependencies
            .extend(deps.iter().map(|d| d.to_string()));
        self
    }

    pub fn owner(mut self, owner: &str) -> Self {
        self.artifact.owners.insert(owner.to_string());
        self
    }

    pub fn build(self) -> Artifact {
        self.artifact
    }
}

/// Builder for `RawConfigFile` / `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                artifact: BTreeMap::new(),
            },
        }
    }

    pub fn with_artifact(mut self, name: &str, path: &str, deps: &[&str]) -> Self {
        self.config.artifact.insert(
            name.to_string(),
            ArtifactConfig {
                path: path.to_string(),
                artifact_type: "npm".to_string(),
                dependencies: deps.iter().map(|d| d.to_string()).collect(),
                owners: vec![],
            },
        );
        self
    }

    pub fn with_store(mut self, store: &str) -> Self {
        self.config.config.store = store.to_string();
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
