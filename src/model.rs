// src/model.rs

//! The model: owner of every module, their pin wiring and their cached roles.

use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use rand::SeedableRng;
use tracing::{debug, info};

use crate::config::{ModelConfig, ModuleSpec};
use crate::errors::{PlanError, Result};
use crate::module::{
    Capabilities, ModelRng, ModuleRef, Params, Pins, Registry, StatReport, Wiring,
    BuildContext, capabilities_of, declare_tasks,
};
use crate::plan::Plan;
use crate::types::{ModuleId, RunMode};

/// Seed used when a description does not set one.
pub const DEFAULT_SEED: u64 = 2011;

struct Slot {
    name: String,
    kind: String,
    module: ModuleRef,
    caps: Capabilities,
}

pub struct Model {
    mode: RunMode,
    /// Indexed by `ModuleId`.
    slots: Vec<Slot>,
    wiring: Wiring,
    lookup: HashMap<String, ModuleId>,
    /// `[global]` fallback values for module parameters.
    globals: toml::Table,
    rng: ModelRng,

    // Role caches, filled once per module at construction.
    inputs: Vec<ModuleId>,
    stats: Vec<ModuleId>,
    loss: Option<ModuleId>,
    params: Vec<ModuleId>,
}

impl Model {
    pub fn new(mode: RunMode, seed: u64) -> Self {
        Self {
            mode,
            slots: Vec::new(),
            wiring: Wiring::new(),
            lookup: HashMap::new(),
            globals: toml::Table::new(),
            rng: ModelRng::seed_from_u64(seed),
            inputs: Vec::new(),
            stats: Vec::new(),
            loss: None,
            params: Vec::new(),
        }
    }

    pub fn with_globals(mut self, globals: toml::Table) -> Self {
        self.globals = globals;
        self
    }

    /// Build every module of a validated description.
    ///
    /// A module is built once all modules it references exist, so the order
    /// of `[[module]]` entries does not matter; among modules that are ready,
    /// file order wins.
    pub fn from_config(registry: &Registry, cfg: &ModelConfig, mode: RunMode) -> Result<Self> {
        let mut model = Model::new(mode, cfg.model.seed).with_globals(cfg.global.clone());

        let mut pending: Vec<&ModuleSpec> = cfg.modules.iter().collect();
        while !pending.is_empty() {
            let before = pending.len();
            let mut blocked = Vec::new();
            for spec in pending {
                let ready = spec
                    .inputs
                    .values()
                    .all(|r| model.lookup.contains_key(ModuleSpec::reference_target(r)));
                if ready {
                    model.add_module(registry, spec)?;
                } else {
                    blocked.push(spec);
                }
            }
            if blocked.len() == before {
                return Err(PlanError::PinCycle(format!(
                    "cycle detected in module pins involving module '{}'",
                    blocked[0].name
                )));
            }
            pending = blocked;
        }

        info!(modules = model.len(), %mode, "model built");
        Ok(model)
    }

    /// Construct one module through the registry and wire its inputs.
    pub fn add_module(&mut self, registry: &Registry, spec: &ModuleSpec) -> Result<ModuleId> {
        if spec.name.is_empty() || spec.name.contains('.') {
            return Err(PlanError::ConfigError(format!(
                "invalid module name '{}'",
                spec.name
            )));
        }
        if self.lookup.contains_key(&spec.name) {
            return Err(PlanError::DuplicateModule(spec.name.clone()));
        }

        let constructor = registry.find(&spec.kind)?;
        let mut ctx = BuildContext::new(self, registry, spec);
        let module = constructor(&mut ctx)?;
        let pins = ctx.into_pins();

        // Nested construction may have claimed the name in the meantime.
        if self.lookup.contains_key(&spec.name) {
            return Err(PlanError::DuplicateModule(spec.name.clone()));
        }
        self.insert(&spec.name, &spec.kind, module, pins)
    }

    fn insert(
        &mut self,
        name: &str,
        kind: &str,
        module: ModuleRef,
        pins: Vec<(Option<String>, ModuleId)>,
    ) -> Result<ModuleId> {
        let caps = capabilities_of(&mut *module.borrow_mut());
        if caps.loss {
            if let Some(existing) = self.loss {
                return Err(PlanError::ConfigError(format!(
                    "model already has a loss module ('{}'); '{}' would be a second one",
                    self.slots[existing.index()].name,
                    name
                )));
            }
        }

        let id = self.wiring.add_module(name);
        for (tag, producer) in pins.iter() {
            self.wiring.connect(id, *producer, tag.as_deref())?;
        }

        if caps.input {
            self.inputs.push(id);
        }
        if caps.stat {
            self.stats.push(id);
        }
        if caps.loss {
            self.loss = Some(id);
        }
        if caps.params {
            self.params.push(id);
        }

        self.lookup.insert(name.to_string(), id);
        self.slots.push(Slot {
            name: name.to_string(),
            kind: kind.to_string(),
            module,
            caps,
        });
        debug!(module = name, kind, id = %id, ?caps, "module added");
        Ok(id)
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Resolve `name`, or `name.tag` for the input module `name` has wired
    /// under `tag`.
    pub fn find(&self, reference: &str) -> Option<ModuleId> {
        match reference.split_once('.') {
            Some((name, tag)) => {
                let owner = *self.lookup.get(name)?;
                self.wiring.pins(owner)?.find(tag)
            }
            None => self.lookup.get(reference).copied(),
        }
    }

    pub fn require(&self, reference: &str) -> Result<ModuleId> {
        self.find(reference)
            .ok_or_else(|| PlanError::ModuleNotFound(reference.to_string()))
    }

    pub fn name_of(&self, id: ModuleId) -> Option<&str> {
        self.slots.get(id.index()).map(|s| s.name.as_str())
    }

    pub fn kind_of(&self, id: ModuleId) -> Option<&str> {
        self.slots.get(id.index()).map(|s| s.kind.as_str())
    }

    pub fn capabilities(&self, id: ModuleId) -> Option<Capabilities> {
        self.slots.get(id.index()).map(|s| s.caps)
    }

    pub fn module(&self, id: ModuleId) -> Result<&ModuleRef> {
        self.slots
            .get(id.index())
            .map(|s| &s.module)
            .ok_or_else(|| PlanError::ModuleNotFound(id.to_string()))
    }

    pub fn pins(&self, id: ModuleId) -> Option<&Pins> {
        self.wiring.pins(id)
    }

    /// Module ids in model order.
    pub fn ids(&self) -> impl Iterator<Item = ModuleId> {
        (0..self.slots.len()).map(ModuleId)
    }

    pub fn inputs(&self) -> &[ModuleId] {
        &self.inputs
    }

    pub fn params(&self) -> &[ModuleId] {
        &self.params
    }

    pub fn loss_module(&self) -> Option<ModuleId> {
        self.loss
    }

    pub(crate) fn globals(&self) -> &toml::Table {
        &self.globals
    }

    pub(crate) fn rng_mut(&mut self) -> &mut ModelRng {
        &mut self.rng
    }

    /// Initialise every module, in model order.
    pub fn init(&mut self) -> Result<()> {
        for slot in self.slots.iter() {
            slot.module.borrow_mut().init(&mut self.rng)?;
        }
        debug!(modules = self.slots.len(), "model initialised");
        Ok(())
    }

    /// Declare every module's tasks for the model's mode and freeze the result.
    pub fn plan(&self) -> Result<Plan> {
        let mut plan = Plan::new();
        for (index, slot) in self.slots.iter().enumerate() {
            let id = ModuleId(index);
            plan.describe_module(id, &slot.name, &slot.kind);
            let pins = self
                .wiring
                .pins(id)
                .ok_or_else(|| PlanError::Bookkeeping(format!("module {id} has no pins")))?;
            declare_tasks(&mut plan, id, &slot.name, &slot.module, pins, self.mode)?;
        }
        plan.freeze()?;
        debug!(tasks = plan.len(), mode = %self.mode, "plan built");
        Ok(plan)
    }

    /// Write every module's state, in model order. Each record is prefixed
    /// with the module name so a mismatched architecture fails to load.
    pub fn save(&self, sink: &mut dyn Write) -> Result<()> {
        for slot in self.slots.iter() {
            bincode::serialize_into(&mut *sink, &slot.name)?;
            slot.module.borrow().save(sink)?;
        }
        Ok(())
    }

    pub fn load(&mut self, source: &mut dyn Read) -> Result<()> {
        for slot in self.slots.iter() {
            let name: String = bincode::deserialize_from(&mut *source)?;
            if name != slot.name {
                return Err(PlanError::ConfigError(format!(
                    "saved state belongs to module '{}', expected '{}'",
                    name, slot.name
                )));
            }
            slot.module.borrow_mut().load(source)?;
        }
        Ok(())
    }

    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        self.save(&mut writer)?;
        writer.flush()?;
        info!(path = %path.display(), "model saved");
        Ok(())
    }

    pub fn load_from_path(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut reader = BufReader::new(File::open(path)?);
        self.load(&mut reader)?;
        info!(path = %path.display(), "model loaded");
        Ok(())
    }

    /// In-memory copy of every module's state.
    pub fn snapshot(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.save(&mut bytes)?;
        Ok(bytes)
    }

    pub fn restore(&mut self, snapshot: &[u8]) -> Result<()> {
        let mut source = snapshot;
        self.load(&mut source)
    }

    /// Copy the state of another model with the same modules.
    pub fn sync_from(&mut self, other: &Model) -> Result<()> {
        let snapshot = other.snapshot()?;
        self.restore(&snapshot)
    }

    pub fn rewind_inputs(&self) {
        for id in self.inputs.iter() {
            let mut module = self.slots[id.index()].module.borrow_mut();
            if let Some(input) = module.as_input() {
                input.rewind();
            }
        }
    }

    pub fn reset_stats(&self) {
        for id in self.stats.iter() {
            let mut module = self.slots[id.index()].module.borrow_mut();
            if let Some(stat) = module.as_stat_mut() {
                stat.reset();
            }
        }
    }

    /// Current value of the loss statistic, if the model has a loss module.
    pub fn loss(&self) -> Option<f64> {
        let id = self.loss?;
        let module = self.slots[id.index()].module.borrow();
        module.as_loss().map(|l| l.loss())
    }

    /// Statistics of every stat module, in model order.
    pub fn report(&self) -> Vec<StatReport> {
        let mut reports = Vec::new();
        for id in self.stats.iter() {
            let slot = &self.slots[id.index()];
            let module = slot.module.borrow();
            if let Some(stat) = module.as_stat() {
                reports.push(StatReport {
                    module: slot.name.clone(),
                    entries: stat.stats().summaries(),
                });
            }
        }
        reports
    }

    /// Run `f` against the parameters of module `reference`.
    pub fn with_params<R>(
        &self,
        reference: &str,
        f: impl FnOnce(&mut dyn Params) -> R,
    ) -> Result<R> {
        let id = self.require(reference)?;
        let slot = &self.slots[id.index()];
        let mut module = slot.module.borrow_mut();
        match module.as_params() {
            Some(params) => Ok(f(params)),
            None => Err(PlanError::MissingCapability {
                module: slot.name.clone(),
                capability: "Params",
            }),
        }
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("mode", &self.mode)
            .field(
                "modules",
                &self.slots.iter().map(|s| (&s.name, &s.kind)).collect::<Vec<_>>(),
            )
            .finish()
    }
}
