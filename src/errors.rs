// src/errors.rs

//! Crate-wide error type and result alias.
//!
//! Every variant except the I/O and decoding wrappers describes a defect in a
//! module implementation, the model description or the orchestration code.
//! None of them is retried.

use thiserror::Error;

use crate::types::RunMode;

#[derive(Error, Debug)]
pub enum PlanError {
    #[error("duplicate task {0}")]
    DuplicateTask(String),

    #[error("task {task} depends on {predecessor}, which was never added to the plan")]
    UnknownPredecessor { task: String, predecessor: String },

    #[error("plan is already frozen")]
    AlreadyFrozen,

    #[error("plan must be frozen before it can run")]
    NotFrozen,

    #[error("module '{module}' does not support run mode {mode}")]
    UnsupportedMode { module: String, mode: RunMode },

    #[error("plan run executed {executed} of {total} tasks; the task graph has a cycle")]
    IncompleteRun { executed: usize, total: usize },

    #[error("scheduler bookkeeping error: {0}")]
    Bookkeeping(String),

    #[error("pin cycle: {0}")]
    PinCycle(String),

    #[error("module '{0}' already exists")]
    DuplicateModule(String),

    #[error("module '{module}' already has an input tagged '{tag}'")]
    DuplicateTag { module: String, tag: String },

    #[error("module not found: {0}")]
    ModuleNotFound(String),

    #[error("module type '{0}' not found")]
    UnknownModuleType(String),

    #[error("module type '{0}' is already registered")]
    DuplicateModuleType(String),

    #[error("module '{module}' does not implement {capability}")]
    MissingCapability { module: String, capability: &'static str },

    #[error("shape error: {0}")]
    Shape(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<ndarray::ShapeError> for PlanError {
    fn from(err: ndarray::ShapeError) -> Self {
        PlanError::Shape(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PlanError>;
