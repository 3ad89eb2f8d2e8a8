// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod logging;
pub mod model;
pub mod module;
pub mod nodes;
pub mod plan;
pub mod session;
pub mod types;

use anyhow::{Context, Result, bail};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::load_and_validate;
use crate::config::ModelConfig;
use crate::model::Model;
use crate::module::Registry;
use crate::plan::{ExecOptions, Executor, Plan};
use crate::session::{Evaluator, TrainOptions, VerifyOptions};
use crate::types::RunMode;

/// High-level entry point used by `main.rs`.
///
/// Loads the description, builds the model for the requested mode, loads or
/// initialises its state, builds the plan and hands both to the session
/// matching the mode.
pub fn run(args: CliArgs) -> Result<()> {
    let cfg = load_and_validate(&args.config)
        .with_context(|| format!("loading model description {}", args.config))?;
    let registry = Registry::with_builtins();

    let mut model = Model::from_config(&registry, &cfg, args.mode)?;
    match args.init.as_ref() {
        Some(path) => model
            .load_from_path(path)
            .with_context(|| format!("loading model state {}", path.display()))?,
        None => model.init()?,
    }
    let mut plan = model.plan()?;

    if args.dry_run {
        print_dry_run(&model, &plan);
        let report = Executor::dry().run(&mut plan)?;
        println!(
            "dry run visited {} of {} tasks",
            report.executed.len(),
            plan.len()
        );
        return Ok(());
    }

    let exec = ExecOptions {
        dry_run: false,
        trace: args.trace,
    };

    match args.mode {
        RunMode::Train => run_train(&args, &cfg, &registry, &mut model, &mut plan, exec),
        RunMode::Predict => {
            let summary = session::predict(&mut model, &mut plan, exec)?;
            println!("batches: {}", summary.batches);
            for stat in summary.stats.iter() {
                println!("{stat}");
            }
            Ok(())
        }
        RunMode::Verify => {
            let Some(module) = args.verify_module.as_deref() else {
                bail!("verify mode needs --verify-module");
            };
            let options = VerifyOptions {
                module: module.to_string(),
                epsilon: args.epsilon,
                samples: args.samples,
                exec,
            };
            let checks = session::verify_gradients(&mut model, &mut plan, &options)?;
            for c in checks.iter() {
                println!(
                    "{module}[{}] value:{} analytic:{} estimated:{} relative_error:{}",
                    c.index, c.value, c.analytic, c.estimated, c.relative_error
                );
            }
            Ok(())
        }
    }
}

fn run_train(
    args: &CliArgs,
    cfg: &ModelConfig,
    registry: &Registry,
    model: &mut Model,
    plan: &mut Plan,
    exec: ExecOptions,
) -> Result<()> {
    let options = TrainOptions {
        max_loops: args.max_loops.unwrap_or(cfg.train.max_loops),
        report_every: args.report_every.unwrap_or(cfg.train.report_every),
        snapshot_every: args.snapshot_every.unwrap_or(cfg.train.snapshot_every),
        model_path: args.model.clone(),
        exec,
    };
    info!(
        max_loops = options.max_loops,
        report_every = options.report_every,
        "training"
    );

    let summary = if args.eval {
        let mut eval_model = Model::from_config(registry, cfg, RunMode::Predict)?;
        let mut eval_plan = eval_model.plan()?;
        let eval = Evaluator {
            model: &mut eval_model,
            plan: &mut eval_plan,
        };
        session::train(model, plan, &options, Some(eval))?
    } else {
        session::train(model, plan, &options, None)?
    };

    for report in summary.reports.iter() {
        for stat in report.stats.iter() {
            println!("loop {} {stat}", report.at_loop);
        }
        if let Some(eval) = report.evaluation.as_ref() {
            for stat in eval.stats.iter() {
                println!("loop {} eval {stat}", report.at_loop);
            }
        }
    }
    debug!(loops = summary.loops, snapshots = summary.snapshots.len(), "train session done");
    Ok(())
}

/// Print modules with their pins, then the plan with its predecessor lists.
fn print_dry_run(model: &Model, plan: &Plan) {
    println!("pinplan dry-run");
    println!("  mode = {}", model.mode());
    println!();

    println!("modules ({}):", model.len());
    for id in model.ids() {
        println!(
            "  - {} ({})",
            model.name_of(id).unwrap_or("?"),
            model.kind_of(id).unwrap_or("?")
        );
        if let Some(pins) = model.pins(id) {
            for pin in pins.inputs() {
                println!(
                    "      input {}: {}",
                    pin.tag.as_deref().unwrap_or("-"),
                    model.name_of(pin.module).unwrap_or("?")
                );
            }
        }
    }
    println!();

    println!("tasks ({}):", plan.len());
    print!("{plan}");
}
