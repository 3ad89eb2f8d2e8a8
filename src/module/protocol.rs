// src/module/protocol.rs

//! Task declaration protocol.
//!
//! Prediction mode: one `Predict` task per module, after the `Predict` tasks
//! of all its inputs.
//!
//! Training (and verification) mode: three tasks per module.
//!
//! | task | predecessors |
//! |---|---|
//! | `PreUpdate(m)` | `Predict(m)` |
//! | `Predict(m)` | `Predict(i)` for every input `i` |
//! | `Update(m)` | `PreUpdate(m)`, `Update(o)` for every output `o`, `PreUpdate(i)` for every input `i` |
//!
//! `Predict` of a parameter module applies the gradient accumulated in the
//! previous run, so its buffer may only be cleared afterwards. `Update(m)`
//! consumes the gradient every consumer wrote into `m`, so it waits for all
//! of them, which runs `Update` in reverse pin order. Writing into an input's
//! buffer requires that input to have been cleared first.

use std::rc::Rc;

use tracing::trace;

use crate::errors::{PlanError, Result};
use crate::module::ModuleRef;
use crate::module::pins::Pins;
use crate::plan::{Plan, TaskId};
use crate::types::{ModuleId, RunMode, TaskFlow};

/// Declare the tasks of module `id` for `mode` into `plan`.
pub fn declare_tasks(
    plan: &mut Plan,
    id: ModuleId,
    name: &str,
    module: &ModuleRef,
    pins: &Pins,
    mode: RunMode,
) -> Result<()> {
    if !module.borrow().supports(mode) {
        return Err(PlanError::UnsupportedMode {
            module: name.to_string(),
            mode,
        });
    }

    if mode.has_backward() {
        let m = Rc::clone(module);
        plan.add(TaskId::preupdate(id), move || {
            m.borrow_mut().preupdate()?;
            Ok(TaskFlow::Continue)
        })?
        .after(TaskId::predict(id));
    }

    let m = Rc::clone(module);
    plan.add(TaskId::predict(id), move || m.borrow_mut().predict())?
        .after_all(pins.inputs().iter().map(|pin| TaskId::predict(pin.module)));

    if mode.has_backward() {
        let m = Rc::clone(module);
        plan.add(TaskId::update(id), move || {
            m.borrow_mut().update()?;
            Ok(TaskFlow::Continue)
        })?
        .after(TaskId::preupdate(id))
        .after_all(pins.outputs().iter().map(|pin| TaskId::update(pin.module)))
        .after_all(pins.inputs().iter().map(|pin| TaskId::preupdate(pin.module)));
    }

    let custom = module.borrow().custom_tasks(id, pins, mode);
    for task in custom {
        let m = Rc::clone(module);
        let tag = task.tag;
        plan.add(TaskId::custom(id, tag), move || {
            m.borrow_mut().run_custom(tag)?;
            Ok(TaskFlow::Continue)
        })?
        .after_all(task.after);
    }

    trace!(module = %name, %mode, "tasks declared");
    Ok(())
}
