// src/plan/executor.rs

//! Sequential topological executor for frozen plans.

use tracing::{debug, info, warn};

use crate::errors::{PlanError, Result};
use crate::plan::builder::Plan;
use crate::plan::state::RunState;
use crate::plan::task::TaskId;
use crate::types::TaskFlow;

/// Options for a single run.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecOptions {
    /// Walk the schedule without invoking any callback.
    pub dry_run: bool,
    /// Log `<module-name>:<module-type>:<operation-kind>` for every task.
    pub trace: bool,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Every task ran exactly once.
    Completed,
    /// A task reported that its data source is exhausted; the remaining
    /// tasks of this run were not executed.
    Exhausted,
}

/// Result of one run over a plan.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub status: RunStatus,
    /// Tasks in the order they were executed (or visited, in a dry run).
    pub executed: Vec<TaskId>,
}

impl RunReport {
    pub fn is_exhausted(&self) -> bool {
        self.status == RunStatus::Exhausted
    }
}

/// Runs a frozen [`Plan`] to completion, one task at a time.
///
/// Ready tasks are taken in declaration order: when several tasks are ready
/// at once, the one that was added to the plan first runs first. A callback
/// error aborts the run and is returned unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct Executor {
    options: ExecOptions,
}

impl Executor {
    pub fn new(options: ExecOptions) -> Self {
        Self { options }
    }

    /// Executor that never invokes callbacks.
    pub fn dry() -> Self {
        Self::new(ExecOptions {
            dry_run: true,
            trace: true,
        })
    }

    pub fn options(&self) -> ExecOptions {
        self.options
    }

    pub fn run(&self, plan: &mut Plan) -> Result<RunReport> {
        if !plan.is_frozen() {
            return Err(PlanError::NotFrozen);
        }

        let total = plan.len();
        let mut state = RunState::seed(plan.tasks());
        let mut executed = Vec::with_capacity(total);

        while let Some(index) = state.pop_ready()? {
            let id = plan.tasks()[index].id;

            if self.options.dry_run {
                info!(task = %plan.label(id), "dry run: callback skipped");
            } else {
                if self.options.trace {
                    info!("{}", plan.label(id));
                }
                let flow = (plan.tasks_mut()[index].callback)()?;
                if flow == TaskFlow::Exhausted {
                    debug!(
                        task = %plan.label(id),
                        executed = executed.len(),
                        "data exhausted; stopping run"
                    );
                    executed.push(id);
                    return Ok(RunReport {
                        status: RunStatus::Exhausted,
                        executed,
                    });
                }
            }

            executed.push(id);
            state.complete(index, &plan.tasks()[index].outputs)?;
        }

        if state.done() != total {
            warn!(
                executed = state.done(),
                total, "plan run did not reach every task"
            );
            return Err(PlanError::IncompleteRun {
                executed: state.done(),
                total,
            });
        }

        Ok(RunReport {
            status: RunStatus::Completed,
            executed,
        })
    }
}
