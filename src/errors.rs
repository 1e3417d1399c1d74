// src/errors.rs

//! Crate-wide error type and result alias.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonobuildError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Artifact not found: {0}")]
    ArtifactNotFound(String),

    #[error("Cycle detected in dependency graph: {0}")]
    DagCycle(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Job store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl MonobuildError {
    /// Whether the error comes from job storage rather than from the job
    /// itself. Only these stop the dispatcher.
    pub fn is_storage(&self) -> bool {
        matches!(self, MonobuildError::Store(_) | MonobuildError::IoError(_))
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, MonobuildError>;
