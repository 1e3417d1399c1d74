// src/config/validate.rs

use std::collections::BTreeMap;

use crate::config::model::{to_artifacts, ConfigFile, RawConfigFile};
use crate::dag::{create_dependency_graph, validate_acyclic};
use crate::errors::{MonobuildError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = MonobuildError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.artifact))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_artifacts(cfg)?;
    validate_global_config(cfg)?;
    validate_artifacts(cfg)?;
    validate_dag(cfg)?;
    Ok(())
}

fn ensure_has_artifacts(cfg: &RawConfigFile) -> Result<()> {
    if cfg.artifact.is_empty() {
        return Err(MonobuildError::ConfigError(
            "config must contain at least one [artifact.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.store.trim().is_empty() {
        return Err(MonobuildError::ConfigError(
            "[config].store must not be empty".to_string(),
        ));
    }
    if cfg.config.ignore_file.trim().is_empty() || cfg.config.ignore_file.contains('/') {
        return Err(MonobuildError::ConfigError(format!(
            "[config].ignore_file must be a plain file name (got '{}')",
            cfg.config.ignore_file
        )));
    }
    Ok(())
}

fn validate_artifacts(cfg: &RawConfigFile) -> Result<()> {
    let mut paths: BTreeMap<&str, &str> = BTreeMap::new();

    for (name, artifact) in cfg.artifact.iter() {
        let path = artifact.path.trim().trim_end_matches('/');
        if path.is_empty() {
            return Err(MonobuildError::ConfigError(format!(
                "artifact '{}' has an empty `path` (use \".\" for the repository root)",
                name
            )));
        }
        if let Some(other) = paths.insert(path, name.as_str()) {
            return Err(MonobuildError::ConfigError(format!(
                "artifacts '{}' and '{}' share the path '{}'",
                other, name, path
            )));
        }
        if artifact.artifact_type.trim().is_empty() {
            return Err(MonobuildError::ConfigError(format!(
                "artifact '{}' has an empty `type`",
                name
            )));
        }
    }
    Ok(())
}

/// Dependencies that are not artifacts (external packages) cannot be part
/// of a cycle and are left out of the graph.
fn validate_dag(cfg: &RawConfigFile) -> Result<()> {
    validate_acyclic(&create_dependency_graph(&to_artifacts(&cfg.artifact)))
}
