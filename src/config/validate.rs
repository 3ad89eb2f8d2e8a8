// src/config/validate.rs

use std::collections::HashSet;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ModelConfig, ModuleSpec, RawModelConfig};
use crate::errors::{PlanError, Result};

impl TryFrom<RawModelConfig> for ModelConfig {
    type Error = PlanError;

    fn try_from(raw: RawModelConfig) -> std::result::Result<Self, Self::Error> {
        validate_config(&raw)?;
        Ok(ModelConfig::new_unchecked(raw))
    }
}

/// Check a raw model description before any module is built.
pub fn validate_config(cfg: &RawModelConfig) -> Result<()> {
    ensure_has_modules(cfg)?;
    validate_names(cfg)?;
    validate_references(cfg)?;
    validate_pin_graph(cfg)?;
    Ok(())
}

fn ensure_has_modules(cfg: &RawModelConfig) -> Result<()> {
    if cfg.modules.is_empty() {
        return Err(PlanError::ConfigError(
            "config must contain at least one [[module]] entry".to_string(),
        ));
    }
    Ok(())
}

fn validate_names(cfg: &RawModelConfig) -> Result<()> {
    let mut seen = HashSet::new();
    for spec in cfg.modules.iter() {
        if spec.name.is_empty() {
            return Err(PlanError::ConfigError(format!(
                "module of type '{}' has an empty name",
                spec.kind
            )));
        }
        if spec.name.contains('.') {
            return Err(PlanError::ConfigError(format!(
                "module name '{}' must not contain '.'",
                spec.name
            )));
        }
        if !seen.insert(spec.name.as_str()) {
            return Err(PlanError::DuplicateModule(spec.name.clone()));
        }
    }
    Ok(())
}

fn validate_references(cfg: &RawModelConfig) -> Result<()> {
    let names: HashSet<&str> = cfg.modules.iter().map(|m| m.name.as_str()).collect();
    for spec in cfg.modules.iter() {
        for (tag, reference) in spec.inputs.iter() {
            let target = ModuleSpec::reference_target(reference);
            if !names.contains(target) {
                return Err(PlanError::ConfigError(format!(
                    "module '{}' has unknown input '{}' on pin '{}'",
                    spec.name, reference, tag
                )));
            }
        }
    }
    Ok(())
}

fn validate_pin_graph(cfg: &RawModelConfig) -> Result<()> {
    // Edge direction: producer -> consumer.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for spec in cfg.modules.iter() {
        graph.add_node(spec.name.as_str());
    }

    for spec in cfg.modules.iter() {
        for reference in spec.inputs.values() {
            let producer = ModuleSpec::reference_target(reference);
            graph.add_edge(producer, spec.name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(PlanError::PinCycle(format!(
            "cycle detected in module pins involving module '{}'",
            cycle.node_id()
        ))),
    }
}
