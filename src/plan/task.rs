// src/plan/task.rs

//! Task identity and the task record stored in a plan.

use std::fmt;

use crate::errors::Result;
use crate::types::{ModuleId, OpKind, TaskFlow};

/// Zero-argument side-effecting task body.
pub type TaskCallback = Box<dyn FnMut() -> Result<TaskFlow>>;

/// A task is identified by the module it operates on and the kind of
/// operation. At most one task per identity exists in a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId {
    pub module: ModuleId,
    pub op: OpKind,
}

impl TaskId {
    pub fn new(module: ModuleId, op: OpKind) -> Self {
        Self { module, op }
    }

    pub fn predict(module: ModuleId) -> Self {
        Self::new(module, OpKind::Predict)
    }

    pub fn preupdate(module: ModuleId) -> Self {
        Self::new(module, OpKind::PreUpdate)
    }

    pub fn update(module: ModuleId) -> Self {
        Self::new(module, OpKind::Update)
    }

    pub fn custom(module: ModuleId, tag: u16) -> Self {
        Self::new(module, OpKind::Custom(tag))
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.module, self.op)
    }
}

/// A task as stored in a plan.
pub(crate) struct Task {
    pub id: TaskId,
    pub callback: TaskCallback,
    /// Declared predecessors, by identity.
    pub inputs: Vec<TaskId>,
    /// Successors, by position in the plan. Filled in by `Plan::freeze`.
    pub outputs: Vec<usize>,
}

impl Task {
    pub fn new(id: TaskId, callback: TaskCallback) -> Self {
        Self {
            id,
            callback,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .finish_non_exhaustive()
    }
}
