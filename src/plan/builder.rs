// src/plan/builder.rs

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::errors::{PlanError, Result};
use crate::plan::task::{Task, TaskId};
use crate::types::{ModuleId, TaskFlow};

/// A directed acyclic graph of tasks.
///
/// An arc `A -> B` means task `B` depends on `A`. Tasks are appended with
/// [`Plan::add`]; predecessors may name tasks that are only added later, since
/// references are resolved by [`Plan::freeze`]. After freezing the plan is
/// read-only and can be handed to the executor any number of times.
pub struct Plan {
    tasks: Vec<Task>,
    /// Task identity -> position in `tasks`.
    lookup: HashMap<TaskId, usize>,
    /// `name:type` labels used for tracing and display.
    modules: HashMap<ModuleId, String>,
    frozen: bool,
}

impl Plan {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            lookup: HashMap::new(),
            modules: HashMap::new(),
            frozen: false,
        }
    }

    /// Attach a human-readable `name:type` label to a module's tasks.
    pub fn describe_module(&mut self, module: ModuleId, name: &str, kind: &str) {
        self.modules.insert(module, format!("{name}:{kind}"));
    }

    /// Add a task and return a handle for attaching its predecessors.
    ///
    /// ```ignore
    /// plan.add(TaskId::predict(m), callback)?   // the task itself
    ///     .after(TaskId::predict(input_1))       // dependency 1
    ///     .after(TaskId::predict(input_2));      // dependency 2
    /// ```
    pub fn add<F>(&mut self, id: TaskId, callback: F) -> Result<Deps<'_>>
    where
        F: FnMut() -> Result<TaskFlow> + 'static,
    {
        if self.frozen {
            return Err(PlanError::AlreadyFrozen);
        }
        if self.lookup.contains_key(&id) {
            return Err(PlanError::DuplicateTask(self.label(id)));
        }

        let index = self.tasks.len();
        self.lookup.insert(id, index);
        self.tasks.push(Task::new(id, Box::new(callback)));
        Ok(Deps { plan: self, index })
    }

    /// Handle for attaching more predecessors to a task added earlier.
    pub fn deps(&mut self, id: TaskId) -> Result<Deps<'_>> {
        if self.frozen {
            return Err(PlanError::AlreadyFrozen);
        }
        match self.lookup.get(&id).copied() {
            Some(index) => Ok(Deps { plan: self, index }),
            None => Err(PlanError::Bookkeeping(format!(
                "cannot attach predecessors to {}: task was never added",
                self.label(id)
            ))),
        }
    }

    /// Resolve every declared predecessor and fill in successor lists.
    ///
    /// Fails without modifying the plan if any predecessor was never added.
    pub fn freeze(&mut self) -> Result<()> {
        if self.frozen {
            return Err(PlanError::AlreadyFrozen);
        }

        // First pass: resolve all edges.
        let mut edges = Vec::new();
        for (index, task) in self.tasks.iter().enumerate() {
            for input in task.inputs.iter() {
                match self.lookup.get(input) {
                    Some(&pred) => edges.push((pred, index)),
                    None => {
                        return Err(PlanError::UnknownPredecessor {
                            task: self.label(task.id),
                            predecessor: self.label(*input),
                        });
                    }
                }
            }
        }

        // Second pass: populate successors.
        for (pred, index) in edges {
            self.tasks[pred].outputs.push(index);
        }

        self.frozen = true;
        debug!(tasks = self.tasks.len(), "plan frozen");
        Ok(())
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.lookup.contains_key(&id)
    }

    /// Task identities in declaration order.
    pub fn task_ids(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.tasks.iter().map(|t| t.id)
    }

    /// Declared predecessors of a task.
    pub fn inputs_of(&self, id: TaskId) -> Option<&[TaskId]> {
        let index = *self.lookup.get(&id)?;
        Some(self.tasks[index].inputs.as_slice())
    }

    /// Successors of a task. Empty until the plan is frozen.
    pub fn outputs_of(&self, id: TaskId) -> Vec<TaskId> {
        match self.lookup.get(&id) {
            Some(&index) => self.tasks[index]
                .outputs
                .iter()
                .map(|&o| self.tasks[o].id)
                .collect(),
            None => Vec::new(),
        }
    }

    /// `<module-name>:<module-type>:<operation-kind>` for a task.
    pub fn label(&self, id: TaskId) -> String {
        match self.modules.get(&id.module) {
            Some(module) => format!("{module}:{}", id.op),
            None => format!("{}:?:{}", id.module, id.op),
        }
    }

    pub(crate) fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub(crate) fn tasks_mut(&mut self) -> &mut [Task] {
        &mut self.tasks
    }
}

impl Default for Plan {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plan")
            .field("tasks", &self.tasks)
            .field("frozen", &self.frozen)
            .finish()
    }
}

/// One task per line, followed by its predecessors indented by a tab.
impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for task in self.tasks.iter() {
            writeln!(f, "{}", self.label(task.id))?;
            for input in task.inputs.iter() {
                writeln!(f, "\t{}", self.label(*input))?;
            }
        }
        Ok(())
    }
}

/// Handle for attaching predecessors to one task of a plan that is still
/// being built.
pub struct Deps<'a> {
    plan: &'a mut Plan,
    index: usize,
}

impl Deps<'_> {
    /// The task this handle attaches predecessors to.
    pub fn task(&self) -> TaskId {
        self.plan.tasks[self.index].id
    }

    /// Require `predecessor` to run before this task. The predecessor does
    /// not have to exist yet.
    pub fn after(&mut self, predecessor: TaskId) -> &mut Self {
        self.plan.tasks[self.index].inputs.push(predecessor);
        self
    }

    pub fn after_all<I>(&mut self, predecessors: I) -> &mut Self
    where
        I: IntoIterator<Item = TaskId>,
    {
        self.plan.tasks[self.index].inputs.extend(predecessors);
        self
    }
}
