// src/plan/mod.rs

//! Task plans and their execution.
//!
//! - [`task`] defines task identities and the task record.
//! - [`builder`] holds the [`Plan`]: tasks are appended, predecessors attached
//!   through a [`Deps`] handle, then the plan is frozen.
//! - [`state`] tracks the per-run `Blocked -> Ready -> Done` state of tasks.
//! - [`executor`] runs a frozen plan in one topological order.

pub mod builder;
pub mod executor;
pub mod state;
pub mod task;

pub use builder::{Deps, Plan};
pub use executor::{ExecOptions, Executor, RunReport, RunStatus};
pub use state::TaskState;
pub use task::{TaskCallback, TaskId};
