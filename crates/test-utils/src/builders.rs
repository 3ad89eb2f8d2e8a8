#![allow(dead_code)]

use pinplan::config::{
    ModelConfig, ModelSection, ModuleSpec, RawModelConfig, TrainSection,
};
use pinplan::errors::Result;

/// Builder for `ModelConfig` to simplify test setup.
pub struct ModelConfigBuilder {
    config: RawModelConfig,
}

impl ModelConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: RawModelConfig {
                model: ModelSection::default(),
                global: toml::Table::new(),
                train: TrainSection::default(),
                modules: Vec::new(),
            },
        }
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.model.seed = seed;
        self
    }

    pub fn global(mut self, key: &str, value: impl Into<toml::Value>) -> Self {
        self.config.global.insert(key.to_string(), value.into());
        self
    }

    pub fn module(mut self, spec: ModuleSpec) -> Self {
        self.config.modules.push(spec);
        self
    }

    pub fn try_build(self) -> Result<ModelConfig> {
        ModelConfig::try_from(self.config)
    }

    pub fn build(self) -> ModelConfig {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

impl Default for ModelConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// `probe` module reading from `inputs`, tagged `in0`, `in1`, ...
pub fn probe(name: &str, inputs: &[&str]) -> ModuleSpec {
    inputs
        .iter()
        .enumerate()
        .fold(ModuleSpec::new(name, "probe"), |spec, (i, input)| {
            spec.with_input(&format!("in{i}"), input)
        })
}

/// `names[0] -> names[1] -> ...`, every module a probe.
pub fn probe_chain(names: &[&str]) -> ModelConfig {
    let mut builder = ModelConfigBuilder::new();
    for (i, name) in names.iter().enumerate() {
        let inputs: &[&str] = if i == 0 { &[] } else { &names[i - 1..i] };
        builder = builder.module(probe(name, inputs));
    }
    builder.build()
}

/// Rows of a single-column matrix, as TOML.
pub fn column(values: &[f64]) -> toml::Value {
    toml::Value::from(
        values
            .iter()
            .map(|v| toml::Value::from(vec![*v]))
            .collect::<Vec<_>>(),
    )
}
