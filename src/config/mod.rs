// src/config/mod.rs

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, parse_str};
pub use model::{ArtifactConfig, ConfigFile, ConfigSection, RawConfigFile};
