// src/nodes/monitor.rs

//! Records the L2 norm of its input's values and, when training or
//! verifying, of the input's final gradient.
//!
//! The gradient norm is taken in a custom task ordered after the input's
//! `Update`: by then every consumer of the input has written into it.

use tracing::trace;

use crate::errors::{PlanError, Result};
use crate::module::buffer::{Blob, l2};
use crate::module::{BuildContext, BuildModule, CustomTask, Module, Pins, Stat, StatSet};
use crate::plan::TaskId;
use crate::types::{ModuleId, RunMode, TaskFlow};

/// Custom task tag of the gradient probe.
pub const GRADIENT_TAP: u16 = 0;

pub struct Monitor {
    name: String,
    input: Blob,
    stats: StatSet,
}

impl BuildModule for Monitor {
    fn build(ctx: &mut BuildContext<'_>) -> Result<Self> {
        let input = ctx.input("input")?;
        Ok(Self {
            name: ctx.name().to_string(),
            input: ctx.blob_of(input)?,
            stats: StatSet::new(&["data_l2", "delta_l2"]),
        })
    }
}

impl Module for Monitor {
    fn predict(&mut self) -> Result<TaskFlow> {
        let norm = l2(&self.input.borrow().data);
        self.stats.acc(0).push(norm);
        Ok(TaskFlow::Continue)
    }

    fn custom_tasks(&self, _me: ModuleId, pins: &Pins, mode: RunMode) -> Vec<CustomTask> {
        if !mode.has_backward() {
            return Vec::new();
        }
        vec![CustomTask {
            tag: GRADIENT_TAP,
            after: pins
                .inputs()
                .iter()
                .map(|pin| TaskId::update(pin.module))
                .collect(),
        }]
    }

    fn run_custom(&mut self, tag: u16) -> Result<()> {
        if tag != GRADIENT_TAP {
            return Err(PlanError::Bookkeeping(format!(
                "monitor '{}' has no custom task {tag}",
                self.name
            )));
        }
        let norm = l2(&self.input.borrow().delta);
        trace!(monitor = %self.name, norm, "gradient norm");
        self.stats.acc(1).push(norm);
        Ok(())
    }

    fn as_stat(&self) -> Option<&dyn Stat> {
        Some(self)
    }

    fn as_stat_mut(&mut self) -> Option<&mut dyn Stat> {
        Some(self)
    }
}

impl Stat for Monitor {
    fn stats(&self) -> &StatSet {
        &self.stats
    }

    fn stats_mut(&mut self) -> &mut StatSet {
        &mut self.stats
    }
}
