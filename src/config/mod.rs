// src/config/mod.rs

//! Model descriptions.
//!
//! - TOML-backed data model (`model.rs`).
//! - Loading from disk or memory (`loader.rs`).
//! - Validation of names, references and pin acyclicity (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{from_str, load_and_validate, load_from_path};
pub use model::{ModelConfig, ModelSection, ModuleSpec, RawModelConfig, TrainSection};
pub use validate::validate_config;
