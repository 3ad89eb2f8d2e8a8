// src/module/registry.rs

//! Type name -> constructor lookup.
//!
//! A [`Registry`] is an ordinary value handed to the model constructor; there
//! is no process-wide table. Constructors receive a [`BuildContext`] through
//! which they resolve their inputs (recording pins as they go), read their
//! parameters, and create helper modules of their own.

use std::collections::BTreeMap;
use std::fmt;

use ndarray::Array2;
use tracing::debug;

use crate::config::ModuleSpec;
use crate::errors::{PlanError, Result};
use crate::model::Model;
use crate::module::buffer::{Blob, Labels};
use crate::module::{BuildModule, ModelRng, ModuleRef, into_ref};
use crate::types::{ModuleId, RunMode};

pub type Constructor = Box<dyn Fn(&mut BuildContext<'_>) -> Result<ModuleRef>>;

#[derive(Default)]
pub struct Registry {
    constructors: BTreeMap<String, Constructor>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in module type.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for (kind, constructor) in crate::nodes::builtins() {
            registry.constructors.insert(kind.to_string(), constructor);
        }
        registry
    }

    /// Register a module type under `kind`.
    pub fn register<M: BuildModule>(&mut self, kind: &str) -> Result<()> {
        self.register_fn(kind, |ctx| Ok(into_ref(M::build(ctx)?)))
    }

    pub fn register_fn<F>(&mut self, kind: &str, constructor: F) -> Result<()>
    where
        F: Fn(&mut BuildContext<'_>) -> Result<ModuleRef> + 'static,
    {
        if self.constructors.contains_key(kind) {
            return Err(PlanError::DuplicateModuleType(kind.to_string()));
        }
        self.constructors
            .insert(kind.to_string(), Box::new(constructor));
        debug!(kind, "module type registered");
        Ok(())
    }

    pub fn find(&self, kind: &str) -> Result<&Constructor> {
        self.constructors
            .get(kind)
            .ok_or_else(|| PlanError::UnknownModuleType(kind.to_string()))
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.constructors.contains_key(kind)
    }

    /// Registered type names, sorted.
    pub fn kinds(&self) -> impl Iterator<Item = &str> + '_ {
        self.constructors.keys().map(String::as_str)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.kinds()).finish()
    }
}

/// What a constructor sees while its module is being built.
pub struct BuildContext<'a> {
    model: &'a mut Model,
    registry: &'a Registry,
    spec: &'a ModuleSpec,
    /// Inputs resolved so far, in resolution order.
    pins: Vec<(Option<String>, ModuleId)>,
}

impl<'a> BuildContext<'a> {
    pub(crate) fn new(model: &'a mut Model, registry: &'a Registry, spec: &'a ModuleSpec) -> Self {
        Self {
            model,
            registry,
            spec,
            pins: Vec::new(),
        }
    }

    pub(crate) fn into_pins(self) -> Vec<(Option<String>, ModuleId)> {
        self.pins
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn kind(&self) -> &str {
        &self.spec.kind
    }

    pub fn spec(&self) -> &ModuleSpec {
        self.spec
    }

    pub fn mode(&self) -> RunMode {
        self.model.mode()
    }

    /// Resolve the input wired under `tag` and record it as a pin.
    pub fn input(&mut self, tag: &str) -> Result<ModuleId> {
        match self.optional_input(tag)? {
            Some(id) => Ok(id),
            None => Err(PlanError::ConfigError(format!(
                "module '{}' requires an input on pin '{}'",
                self.spec.name, tag
            ))),
        }
    }

    /// Like [`BuildContext::input`], but an unwired pin yields `None`.
    pub fn optional_input(&mut self, tag: &str) -> Result<Option<ModuleId>> {
        let Some(reference) = self.spec.inputs.get(tag) else {
            return Ok(None);
        };
        let id = self.model.require(reference)?;
        self.pins.push((Some(tag.to_string()), id));
        Ok(Some(id))
    }

    /// Record `producer` as an input under `tag` without going through the
    /// spec, e.g. for a module created with [`BuildContext::create`].
    pub fn connect(&mut self, tag: Option<&str>, producer: ModuleId) {
        self.pins.push((tag.map(str::to_string), producer));
    }

    /// Build another module into the same model. It gets its id before the
    /// module under construction does.
    pub fn create(&mut self, spec: &ModuleSpec) -> Result<ModuleId> {
        self.model.add_module(self.registry, spec)
    }

    /// Array output of `id`.
    pub fn blob_of(&self, id: ModuleId) -> Result<Blob> {
        let module = self.model.module(id)?;
        let blob = module.borrow().blob();
        blob.ok_or_else(|| PlanError::MissingCapability {
            module: self.model.name_of(id).unwrap_or("?").to_string(),
            capability: "an array output",
        })
    }

    /// Label batch published by `id`.
    pub fn labels_of(&self, id: ModuleId) -> Result<Labels> {
        let module = self.model.module(id)?;
        let labels = module.borrow().as_labels().map(|l| l.labels());
        labels.ok_or_else(|| PlanError::MissingCapability {
            module: self.model.name_of(id).unwrap_or("?").to_string(),
            capability: "LabelSource",
        })
    }

    /// Raw value of `key`: the module's own table first, then `[global]`.
    pub fn param(&self, key: &str) -> Option<&toml::Value> {
        self.spec
            .params
            .get(key)
            .or_else(|| self.model.globals().get(key))
    }

    pub fn f64_param(&self, key: &str, default: f64) -> Result<f64> {
        match self.param(key) {
            None => Ok(default),
            Some(value) => as_f64(value).ok_or_else(|| self.bad_param(key, "a number")),
        }
    }

    pub fn usize_param(&self, key: &str, default: usize) -> Result<usize> {
        match self.param(key) {
            None => Ok(default),
            Some(value) => value
                .as_integer()
                .and_then(|v| usize::try_from(v).ok())
                .ok_or_else(|| self.bad_param(key, "a non-negative integer")),
        }
    }

    /// Flat list of numbers, e.g. `value = [0.5, -1.0]`.
    pub fn f64_list(&self, key: &str) -> Result<Option<Vec<f64>>> {
        let Some(value) = self.param(key) else {
            return Ok(None);
        };
        let array = value
            .as_array()
            .ok_or_else(|| self.bad_param(key, "a list of numbers"))?;
        let list = array
            .iter()
            .map(as_f64)
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| self.bad_param(key, "a list of numbers"))?;
        Ok(Some(list))
    }

    /// Row-major matrix, e.g. `features = [[0.0, 1.0], [1.0, 0.0]]`.
    pub fn matrix(&self, key: &str) -> Result<Option<Array2<f64>>> {
        let Some(value) = self.param(key) else {
            return Ok(None);
        };
        let rows = value
            .as_array()
            .ok_or_else(|| self.bad_param(key, "a list of rows"))?;
        let mut cols = None;
        let mut flat = Vec::new();
        for row in rows.iter() {
            let row = row
                .as_array()
                .ok_or_else(|| self.bad_param(key, "a list of rows"))?;
            if *cols.get_or_insert(row.len()) != row.len() {
                return Err(PlanError::Shape(format!(
                    "module '{}': rows of '{}' differ in length",
                    self.spec.name, key
                )));
            }
            for cell in row.iter() {
                flat.push(as_f64(cell).ok_or_else(|| self.bad_param(key, "numeric rows"))?);
            }
        }
        let matrix = Array2::from_shape_vec((rows.len(), cols.unwrap_or(0)), flat)?;
        Ok(Some(matrix))
    }

    /// The model's shared random generator.
    pub fn rng(&mut self) -> &mut ModelRng {
        self.model.rng_mut()
    }

    fn bad_param(&self, key: &str, expected: &str) -> PlanError {
        PlanError::ConfigError(format!(
            "module '{}': parameter '{}' must be {}",
            self.spec.name, key, expected
        ))
    }
}

fn as_f64(value: &toml::Value) -> Option<f64> {
    match value {
        toml::Value::Float(v) => Some(*v),
        toml::Value::Integer(v) => Some(*v as f64),
        _ => None,
    }
}
