// src/module/mod.rs

//! Processing units and how they turn into plan tasks.
//!
//! - [`buffer`]: shared forward/gradient buffers.
//! - [`pins`]: input pins, output back-references and the acyclic pin graph.
//! - [`roles`]: capability interfaces (input, labels, stats, loss, params).
//! - [`protocol`]: the per-mode task declaration every module follows.
//! - [`registry`]: type-name -> constructor lookup and the build context.

pub mod buffer;
pub mod pins;
pub mod protocol;
pub mod registry;
pub mod roles;

use std::cell::RefCell;
use std::io::{Read, Write};
use std::rc::Rc;

use rand_chacha::ChaCha8Rng;

use crate::errors::{PlanError, Result};
use crate::plan::TaskId;
use crate::types::{ModuleId, RunMode, TaskFlow};

pub use buffer::{Blob, Buffer, LabelBatch, Labels};
pub use pins::{InputPin, OutputPin, Pins, Wiring};
pub use protocol::declare_tasks;
pub use registry::{BuildContext, Constructor, Registry};
pub use roles::{Capabilities, Input, LabelSource, Loss, Params, Stat, StatReport, StatSet};

/// Random generator shared by a model's modules.
pub type ModelRng = ChaCha8Rng;

/// Non-owning handle the plan's callbacks keep on a module. The model owns
/// the module for its whole lifetime.
pub type ModuleRef = Rc<RefCell<dyn Module>>;

/// Extra scheduled work declared by a module, run as `OpKind::Custom(tag)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomTask {
    pub tag: u16,
    pub after: Vec<TaskId>,
}

/// A processing unit of a model.
///
/// The task methods are only ever invoked by plan callbacks, in the order
/// fixed by [`declare_tasks`]; a module never calls another module.
pub trait Module {
    /// Whether the module can take part in a plan for `mode`.
    fn supports(&self, _mode: RunMode) -> bool {
        true
    }

    /// Initialise parameters/state. Either `init` or `load` runs before the
    /// first plan run.
    fn init(&mut self, _rng: &mut ModelRng) -> Result<()> {
        Ok(())
    }

    /// Forward computation.
    fn predict(&mut self) -> Result<TaskFlow> {
        Ok(TaskFlow::Continue)
    }

    /// Reset or decay the gradient accumulator.
    fn preupdate(&mut self) -> Result<()> {
        Ok(())
    }

    /// Accumulate this module's gradient contribution into its inputs.
    fn update(&mut self) -> Result<()> {
        Ok(())
    }

    /// Extra tasks for `mode`, with their predecessors.
    fn custom_tasks(&self, _me: ModuleId, _pins: &Pins, _mode: RunMode) -> Vec<CustomTask> {
        Vec::new()
    }

    fn run_custom(&mut self, tag: u16) -> Result<()> {
        Err(PlanError::Bookkeeping(format!(
            "module has no custom task {tag}"
        )))
    }

    fn save(&self, _sink: &mut dyn Write) -> Result<()> {
        Ok(())
    }

    fn load(&mut self, _source: &mut dyn Read) -> Result<()> {
        Ok(())
    }

    /// Array output, for modules that produce one.
    fn blob(&self) -> Option<Blob> {
        None
    }

    fn as_input(&mut self) -> Option<&mut dyn Input> {
        None
    }

    fn as_labels(&self) -> Option<&dyn LabelSource> {
        None
    }

    fn as_stat(&self) -> Option<&dyn Stat> {
        None
    }

    fn as_stat_mut(&mut self) -> Option<&mut dyn Stat> {
        None
    }

    fn as_loss(&self) -> Option<&dyn Loss> {
        None
    }

    fn as_params(&mut self) -> Option<&mut dyn Params> {
        None
    }
}

/// A module type that can be registered by type with [`Registry::register`].
pub trait BuildModule: Module + Sized + 'static {
    fn build(ctx: &mut BuildContext<'_>) -> Result<Self>;
}

/// Wrap a concrete module into a shared handle.
pub fn into_ref<M: Module + 'static>(module: M) -> ModuleRef {
    Rc::new(RefCell::new(module))
}

/// Ask a module which roles it implements.
pub fn capabilities_of(module: &mut dyn Module) -> Capabilities {
    Capabilities {
        input: module.as_input().is_some(),
        labels: module.as_labels().is_some(),
        stat: module.as_stat().is_some(),
        loss: module.as_loss().is_some(),
        params: module.as_params().is_some(),
    }
}
