// src/types.rs

//! Small shared enums: run modes, operation kinds and callback flow.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Stable handle of a module inside its model (its position in model order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub usize);

impl ModuleId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Mode a model is built for. Fixed for the whole lifetime of a model.
///
/// - `Predict`: forward computation only.
/// - `Train`: forward pass, gradient reset and gradient accumulation; parameter
///   modules apply the previous iteration's gradient in their forward pass.
/// - `Verify`: same task shape as `Train`, but parameters are never moved, so
///   repeated runs from the same snapshot are reproducible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Predict,
    Train,
    Verify,
}

impl RunMode {
    /// Whether this mode schedules `PreUpdate` / `Update` tasks.
    pub fn has_backward(self) -> bool {
        matches!(self, RunMode::Train | RunMode::Verify)
    }
}

impl Default for RunMode {
    fn default() -> Self {
        RunMode::Train
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunMode::Predict => "predict",
            RunMode::Train => "train",
            RunMode::Verify => "verify",
        };
        f.write_str(s)
    }
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "predict" => Ok(RunMode::Predict),
            "train" => Ok(RunMode::Train),
            "verify" => Ok(RunMode::Verify),
            other => Err(format!(
                "invalid run mode: {other} (expected \"predict\", \"train\" or \"verify\")"
            )),
        }
    }
}

/// Kind of operation a task performs on its module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum OpKind {
    Predict,
    PreUpdate,
    Update,
    /// Extra scheduled work owned by a module, identified by a module-local tag.
    Custom(u16),
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpKind::Predict => f.write_str("PREDICT"),
            OpKind::PreUpdate => f.write_str("PREUPDATE"),
            OpKind::Update => f.write_str("UPDATE"),
            OpKind::Custom(tag) => write!(f, "CUSTOM{tag}"),
        }
    }
}

/// What a task callback tells the executor after it returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskFlow {
    /// Keep going.
    Continue,
    /// A finite data source ran out; the current run stops here.
    Exhausted,
}
