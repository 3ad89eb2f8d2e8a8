// src/module/pins.rs

//! Pin bookkeeping between modules.
//!
//! Connecting consumer `A` to producer `B` records an input pin on `A` and,
//! in the same step, an output back-reference on `B`. The backward half of
//! the task protocol is derived from those back-references.

use std::collections::HashMap;

use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex};
use tracing::debug;

use crate::errors::{PlanError, Result};
use crate::types::ModuleId;

/// Input pin: an optional tag plus the producing module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputPin {
    pub tag: Option<String>,
    pub module: ModuleId,
}

/// Output back-reference to a consuming module. Outputs carry no tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputPin {
    pub module: ModuleId,
}

/// Pins of a single module.
#[derive(Debug, Clone, Default)]
pub struct Pins {
    inputs: Vec<InputPin>,
    outputs: Vec<OutputPin>,
    /// Tag -> input module. Tags are unique per module.
    lookup: HashMap<String, ModuleId>,
}

impl Pins {
    /// Inputs in the order they were connected.
    pub fn inputs(&self) -> &[InputPin] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[OutputPin] {
        &self.outputs
    }

    /// Input connected under `tag`.
    pub fn find(&self, tag: &str) -> Option<ModuleId> {
        self.lookup.get(tag).copied()
    }
}

/// Pins of every module in a model, plus the pin graph used to keep it
/// acyclic.
#[derive(Debug, Clone, Default)]
pub struct Wiring {
    names: Vec<String>,
    pins: Vec<Pins>,
    /// Edge `producer -> consumer` per connected pin. Node index == module index.
    graph: DiGraph<ModuleId, ()>,
}

impl Wiring {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new module and return its id.
    pub fn add_module(&mut self, name: &str) -> ModuleId {
        let id = ModuleId(self.pins.len());
        self.names.push(name.to_string());
        self.pins.push(Pins::default());
        self.graph.add_node(id);
        id
    }

    pub fn len(&self) -> usize {
        self.pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }

    pub fn pins(&self, id: ModuleId) -> Option<&Pins> {
        self.pins.get(id.index())
    }

    /// Declare `producer` as an input of `consumer`.
    ///
    /// Fails if the tag is already used on `consumer`, or if the new edge
    /// would make the pin graph cyclic.
    pub fn connect(
        &mut self,
        consumer: ModuleId,
        producer: ModuleId,
        tag: Option<&str>,
    ) -> Result<()> {
        let consumer_name = self.name(consumer)?.to_string();
        let producer_name = self.name(producer)?.to_string();

        if let Some(tag) = tag {
            if self.pins[consumer.index()].lookup.contains_key(tag) {
                return Err(PlanError::DuplicateTag {
                    module: consumer_name,
                    tag: tag.to_string(),
                });
            }
        }

        let producer_node = NodeIndex::new(producer.index());
        let consumer_node = NodeIndex::new(consumer.index());
        if has_path_connecting(&self.graph, consumer_node, producer_node, None) {
            return Err(PlanError::PinCycle(format!(
                "connecting '{producer_name}' as input of '{consumer_name}' closes a cycle"
            )));
        }

        let pins = &mut self.pins[consumer.index()];
        pins.inputs.push(InputPin {
            tag: tag.map(str::to_string),
            module: producer,
        });
        if let Some(tag) = tag {
            pins.lookup.insert(tag.to_string(), producer);
        }
        self.pins[producer.index()]
            .outputs
            .push(OutputPin { module: consumer });
        self.graph.add_edge(producer_node, consumer_node, ());

        debug!(
            consumer = %consumer_name,
            producer = %producer_name,
            tag = tag.unwrap_or(""),
            "pin connected"
        );
        Ok(())
    }

    fn name(&self, id: ModuleId) -> Result<&str> {
        self.names
            .get(id.index())
            .map(String::as_str)
            .ok_or_else(|| PlanError::ModuleNotFound(id.to_string()))
    }
}
