// src/session/verify.rs

//! Finite-difference gradient check.
//!
//! Every run starts from the same snapshot with rewound inputs and cleared
//! statistics, so the loss of a run is a function of the parameters alone.
//! This needs a model built in verify mode: parameters do not move during
//! `Predict` and `PreUpdate` clears their gradient.

use rand::seq::index;
use tracing::{debug, info};

use crate::errors::{PlanError, Result};
use crate::model::Model;
use crate::plan::{ExecOptions, Executor, Plan};
use crate::types::RunMode;

#[derive(Debug, Clone)]
pub struct VerifyOptions {
    /// Parameter module to check (`name` or `name.tag`).
    pub module: String,
    pub epsilon: f64,
    /// Components to check. `0` checks all of them.
    pub samples: usize,
    pub exec: ExecOptions,
}

impl VerifyOptions {
    pub fn new(module: &str) -> Self {
        Self {
            module: module.to_string(),
            epsilon: 1e-4,
            samples: 0,
            exec: ExecOptions::default(),
        }
    }
}

/// Analytic and estimated gradient of one component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientCheck {
    pub index: usize,
    pub value: f64,
    pub analytic: f64,
    pub estimated: f64,
    pub relative_error: f64,
}

/// `|a - e| / max(|a|, |e|)`, and `0` when both are zero.
pub fn relative_error(analytic: f64, estimated: f64) -> f64 {
    let scale = analytic.abs().max(estimated.abs());
    if scale == 0.0 {
        0.0
    } else {
        (analytic - estimated).abs() / scale
    }
}

/// Compare the accumulated gradient of `options.module` against forward
/// differences `(loss(p + eps) - loss(p)) / eps`.
///
/// The model's state is restored before returning.
pub fn verify_gradients(
    model: &mut Model,
    plan: &mut Plan,
    options: &VerifyOptions,
) -> Result<Vec<GradientCheck>> {
    if model.mode() != RunMode::Verify {
        return Err(PlanError::ConfigError(format!(
            "gradient verification needs a model built in verify mode, got {}",
            model.mode()
        )));
    }
    if model.loss_module().is_none() {
        return Err(PlanError::MissingCapability {
            module: "model".to_string(),
            capability: "Loss",
        });
    }

    let executor = Executor::new(options.exec);
    let snapshot = model.snapshot()?;

    let baseline = run_once(model, plan, &executor)?;
    let dim = model.with_params(&options.module, |p| p.dim())?;
    let mut indices = if options.samples == 0 || options.samples >= dim {
        (0..dim).collect::<Vec<_>>()
    } else {
        index::sample(model.rng_mut(), dim, options.samples).into_vec()
    };
    indices.sort_unstable();

    let analytic: Vec<(f64, f64)> = model.with_params(&options.module, |p| {
        indices.iter().map(|&i| (p.value(i), p.gradient(i))).collect()
    })?;
    debug!(module = %options.module, baseline, components = indices.len(), "baseline run");

    let mut checks = Vec::with_capacity(indices.len());
    for (&index, &(value, analytic)) in indices.iter().zip(analytic.iter()) {
        model.restore(&snapshot)?;
        model.with_params(&options.module, |p| p.perturb(index, options.epsilon))?;
        let perturbed = run_once(model, plan, &executor)?;
        let estimated = (perturbed - baseline) / options.epsilon;
        let check = GradientCheck {
            index,
            value,
            analytic,
            estimated,
            relative_error: relative_error(analytic, estimated),
        };
        info!(
            module = %options.module,
            index,
            analytic,
            estimated,
            relative_error = check.relative_error,
            "gradient check"
        );
        checks.push(check);
    }

    model.restore(&snapshot)?;
    Ok(checks)
}

fn run_once(model: &mut Model, plan: &mut Plan, executor: &Executor) -> Result<f64> {
    model.rewind_inputs();
    model.reset_stats();
    let run = executor.run(plan)?;
    if run.is_exhausted() {
        return Err(PlanError::ConfigError(
            "input exhausted during gradient verification".to_string(),
        ));
    }
    model.loss().ok_or_else(|| PlanError::MissingCapability {
        module: "model".to_string(),
        capability: "Loss",
    })
}
