// src/session/mod.rs

//! Orchestration on top of a model and its frozen plan.
//!
//! - [`train`](train::train): repeated runs with periodic reports,
//!   evaluation and snapshots.
//! - [`predict`](train::predict): one pass over the input data.
//! - [`verify_gradients`](verify::verify_gradients): finite-difference check
//!   of one parameter module's gradient.

pub mod train;
pub mod verify;

pub use train::{Evaluator, LoopReport, PredictSummary, TrainOptions, TrainSummary, predict, train};
pub use verify::{GradientCheck, VerifyOptions, verify_gradients};
