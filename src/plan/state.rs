// src/plan/state.rs

//! Per-run task state for the executor.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::errors::{PlanError, Result};
use crate::plan::task::Task;

/// State of a single task within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Some predecessor has not run yet.
    Blocked,
    /// All predecessors ran; waiting in the ready set.
    Ready,
    /// Executed (or skipped by a dry run) in this run.
    Done,
}

/// Dependency counters and ready set for one run over a frozen plan.
///
/// The ready set is a min-heap on declaration index: whenever several tasks
/// are ready, the one added to the plan first is handed out first.
#[derive(Debug)]
pub(crate) struct RunState {
    remaining: Vec<usize>,
    states: Vec<TaskState>,
    ready: BinaryHeap<Reverse<usize>>,
    done: usize,
}

impl RunState {
    /// Count predecessors of every task and seed the ready set with the roots.
    pub fn seed(tasks: &[Task]) -> Self {
        let mut remaining = Vec::with_capacity(tasks.len());
        let mut states = Vec::with_capacity(tasks.len());
        let mut ready = BinaryHeap::new();

        for (index, task) in tasks.iter().enumerate() {
            let n = task.inputs.len();
            remaining.push(n);
            if n == 0 {
                states.push(TaskState::Ready);
                ready.push(Reverse(index));
            } else {
                states.push(TaskState::Blocked);
            }
        }

        Self {
            remaining,
            states,
            ready,
            done: 0,
        }
    }

    /// Take the next ready task, if any.
    pub fn pop_ready(&mut self) -> Result<Option<usize>> {
        let Some(Reverse(index)) = self.ready.pop() else {
            return Ok(None);
        };
        if self.states[index] != TaskState::Ready {
            return Err(PlanError::Bookkeeping(format!(
                "task {index} handed out while {:?}",
                self.states[index]
            )));
        }
        Ok(Some(index))
    }

    /// Mark a task done and release successors whose counters reach zero.
    pub fn complete(&mut self, index: usize, outputs: &[usize]) -> Result<()> {
        self.states[index] = TaskState::Done;
        self.done += 1;

        for &succ in outputs {
            if self.remaining[succ] == 0 || self.states[succ] != TaskState::Blocked {
                return Err(PlanError::Bookkeeping(format!(
                    "successor {succ} of task {index} released twice"
                )));
            }
            self.remaining[succ] -= 1;
            if self.remaining[succ] == 0 {
                self.states[succ] = TaskState::Ready;
                self.ready.push(Reverse(succ));
            }
        }
        Ok(())
    }

    pub fn done(&self) -> usize {
        self.done
    }

    #[cfg(test)]
    pub fn state_of(&self, index: usize) -> TaskState {
        self.states[index]
    }
}
