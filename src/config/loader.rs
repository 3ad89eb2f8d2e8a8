// src/config/loader.rs

use std::fs;
use std::path::Path;

use crate::config::model::{ModelConfig, RawModelConfig};
use crate::errors::Result;

/// Read a model description from `path` without validating it.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawModelConfig> {
    let contents = fs::read_to_string(path.as_ref())?;
    let config: RawModelConfig = toml::from_str(&contents)?;
    Ok(config)
}

/// Read and validate a model description.
///
/// Checks unique names, known input references and an acyclic pin graph.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ModelConfig> {
    let raw = load_from_path(path)?;
    ModelConfig::try_from(raw)
}

/// Parse and validate a model description held in memory.
pub fn from_str(text: &str) -> Result<ModelConfig> {
    let raw: RawModelConfig = toml::from_str(text)?;
    ModelConfig::try_from(raw)
}
