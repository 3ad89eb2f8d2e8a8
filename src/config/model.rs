// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::model::DEFAULT_SEED;

/// Top-level model description as read from a TOML file.
///
/// ```toml
/// [model]
/// seed = 2011
///
/// [global]
/// batch = 4
/// eta = 0.05
///
/// [train]
/// max_loops = 200
///
/// [[module]]
/// name = "x"
/// type = "input-memory"
/// features = [[0.0], [1.0]]
/// labels = [[1.0], [3.0]]
///
/// [[module]]
/// name = "fc"
/// type = "linear"
/// inputs = { input = "x" }
/// ```
///
/// All sections except `[[module]]` are optional.
#[derive(Debug, Clone, Deserialize)]
pub struct RawModelConfig {
    #[serde(default)]
    pub model: ModelSection,

    /// Fallback values for module parameters, from `[global]`.
    #[serde(default)]
    pub global: toml::Table,

    #[serde(default)]
    pub train: TrainSection,

    /// Module declarations, in file order.
    #[serde(default, rename = "module")]
    pub modules: Vec<ModuleSpec>,
}

/// A [`RawModelConfig`] that passed [`crate::config::validate_config`].
#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub model: ModelSection,
    pub global: toml::Table,
    pub train: TrainSection,
    pub modules: Vec<ModuleSpec>,
}

impl ModelConfig {
    /// Construct without validation. Only `validate` should call this.
    pub(crate) fn new_unchecked(raw: RawModelConfig) -> Self {
        Self {
            model: raw.model,
            global: raw.global,
            train: raw.train,
            modules: raw.modules,
        }
    }

    pub fn module(&self, name: &str) -> Option<&ModuleSpec> {
        self.modules.iter().find(|m| m.name == name)
    }
}

/// `[model]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelSection {
    /// Seed for parameter initialisation and dataset shuffling.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

impl Default for ModelSection {
    fn default() -> Self {
        Self {
            seed: default_seed(),
        }
    }
}

/// `[train]` section. Command-line flags override these.
#[derive(Debug, Clone, Deserialize)]
pub struct TrainSection {
    /// Plan runs per training session. `0` is treated as `1`.
    #[serde(default = "default_max_loops")]
    pub max_loops: usize,

    /// Report (and reset) statistics every N loops. `0` disables.
    #[serde(default)]
    pub report_every: usize,

    /// Write a numbered snapshot every N loops. `0` disables.
    #[serde(default)]
    pub snapshot_every: usize,
}

fn default_max_loops() -> usize {
    100
}

impl Default for TrainSection {
    fn default() -> Self {
        Self {
            max_loops: default_max_loops(),
            report_every: 0,
            snapshot_every: 0,
        }
    }
}

/// One `[[module]]` entry.
///
/// Everything except `name`, `type` and `inputs` lands in `params`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModuleSpec {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: String,

    /// Pin tag -> module reference (`name` or `name.tag`).
    #[serde(default)]
    pub inputs: BTreeMap<String, String>,

    #[serde(flatten)]
    pub params: toml::Table,
}

impl ModuleSpec {
    pub fn new(name: &str, kind: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: kind.to_string(),
            ..Self::default()
        }
    }

    pub fn with_input(mut self, tag: &str, reference: &str) -> Self {
        self.inputs.insert(tag.to_string(), reference.to_string());
        self
    }

    pub fn with_param(mut self, key: &str, value: impl Into<toml::Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    /// Name of the module a reference points at: `fc.weight` -> `fc`.
    pub fn reference_target(reference: &str) -> &str {
        reference.split('.').next().unwrap_or(reference)
    }
}
