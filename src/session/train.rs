// src/session/train.rs

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::errors::{PlanError, Result};
use crate::model::Model;
use crate::module::StatReport;
use crate::plan::{ExecOptions, Executor, Plan};
use crate::types::RunMode;

#[derive(Debug, Clone)]
pub struct TrainOptions {
    /// Plan runs to perform, at least one. An input reporting end of data
    /// stops training earlier.
    pub max_loops: usize,
    /// Log, record and reset statistics every N loops. `0` disables.
    pub report_every: usize,
    /// Save `<model_path>.<k>` every N loops. `0` disables.
    pub snapshot_every: usize,
    /// Where the trained model is written at the end.
    pub model_path: Option<PathBuf>,
    pub exec: ExecOptions,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            max_loops: 100,
            report_every: 0,
            snapshot_every: 0,
            model_path: None,
            exec: ExecOptions::default(),
        }
    }
}

/// A prediction-mode copy of the trained model, refreshed and run at every
/// report.
pub struct Evaluator<'a> {
    pub model: &'a mut Model,
    pub plan: &'a mut Plan,
}

/// Statistics recorded at one report.
#[derive(Debug, Clone)]
pub struct LoopReport {
    /// Loops completed when the report was taken.
    pub at_loop: usize,
    pub stats: Vec<StatReport>,
    pub loss: Option<f64>,
    pub evaluation: Option<PredictSummary>,
}

#[derive(Debug, Clone, Default)]
pub struct TrainSummary {
    pub loops: usize,
    /// Whether training stopped because an input ran out.
    pub exhausted: bool,
    pub reports: Vec<LoopReport>,
    pub snapshots: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct PredictSummary {
    /// Runs that completed before the input was exhausted.
    pub batches: usize,
    pub stats: Vec<StatReport>,
    pub loss: Option<f64>,
}

/// Run the training plan repeatedly.
pub fn train(
    model: &mut Model,
    plan: &mut Plan,
    options: &TrainOptions,
    mut eval: Option<Evaluator<'_>>,
) -> Result<TrainSummary> {
    if model.mode() != RunMode::Train {
        return Err(PlanError::ConfigError(format!(
            "training needs a model built in train mode, got {}",
            model.mode()
        )));
    }

    let executor = Executor::new(options.exec);
    let mut summary = TrainSummary::default();
    model.rewind_inputs();
    model.reset_stats();

    loop {
        let run = executor.run(plan)?;
        if run.is_exhausted() {
            info!(loops = summary.loops, "input exhausted; training stops");
            summary.exhausted = true;
            break;
        }
        summary.loops += 1;

        if options.report_every > 0 && summary.loops % options.report_every == 0 {
            let report = take_report(model, summary.loops, eval.as_mut(), options.exec)?;
            summary.reports.push(report);
        }

        if options.snapshot_every > 0 && summary.loops % options.snapshot_every == 0 {
            if let Some(path) = options.model_path.as_deref() {
                let numbered = numbered_path(path, summary.loops / options.snapshot_every);
                model.save_to_path(&numbered)?;
                summary.snapshots.push(numbered);
            }
        }

        if summary.loops >= options.max_loops {
            break;
        }
    }

    if let Some(path) = options.model_path.as_deref() {
        model.save_to_path(path)?;
    }
    info!(loops = summary.loops, "training finished");
    Ok(summary)
}

fn take_report(
    model: &mut Model,
    at_loop: usize,
    eval: Option<&mut Evaluator<'_>>,
    exec: ExecOptions,
) -> Result<LoopReport> {
    let stats = model.report();
    let loss = model.loss();
    for stat in stats.iter() {
        info!(at_loop, "{stat}");
    }
    model.reset_stats();

    let evaluation = match eval {
        Some(eval) => {
            eval.model.sync_from(model)?;
            let result = predict(eval.model, eval.plan, exec)?;
            for stat in result.stats.iter() {
                info!(at_loop, "eval {stat}");
            }
            Some(result)
        }
        None => None,
    };

    Ok(LoopReport {
        at_loop,
        stats,
        loss,
        evaluation,
    })
}

/// `model.bin` -> `model.bin.3`.
fn numbered_path(path: &Path, k: usize) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(format!(".{k}"));
    PathBuf::from(name)
}

/// Run the prediction plan once over all input data.
pub fn predict(model: &mut Model, plan: &mut Plan, exec: ExecOptions) -> Result<PredictSummary> {
    if model.mode() != RunMode::Predict {
        return Err(PlanError::ConfigError(format!(
            "prediction needs a model built in predict mode, got {}",
            model.mode()
        )));
    }
    if model.inputs().is_empty() {
        return Err(PlanError::ConfigError(
            "prediction needs at least one input module".to_string(),
        ));
    }

    let executor = Executor::new(exec);
    model.rewind_inputs();
    model.reset_stats();

    let mut batches = 0;
    loop {
        let run = executor.run(plan)?;
        if run.is_exhausted() {
            break;
        }
        batches += 1;
        // A dry run never reaches the input's end-of-data signal.
        if exec.dry_run {
            break;
        }
    }
    debug!(batches, "prediction pass finished");

    Ok(PredictSummary {
        batches,
        stats: model.report(),
        loss: model.loss(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_paths_are_numbered() {
        assert_eq!(
            numbered_path(Path::new("out/model.bin"), 2),
            PathBuf::from("out/model.bin.2")
        );
    }
}
