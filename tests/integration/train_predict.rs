// tests/integration/train_predict.rs

use pinplan::config::{self, ModelConfig};
use pinplan::model::Model;
use pinplan::module::Registry;
use pinplan::plan::ExecOptions;
use pinplan::session::{self, Evaluator, TrainOptions};
use pinplan::types::RunMode;
use pinplan_test_utils::init_tracing;

/// y = 2x + 1 through one linear layer.
const LINE: &str = r#"
[model]
seed = 11

[global]
batch = 4
eta = 0.1
init = 0.1

[[module]]
name = "x"
type = "input-memory"
features = [[0.0], [1.0], [2.0], [3.0]]
labels = [[1.0], [3.0], [5.0], [7.0]]

[[module]]
name = "fc"
type = "linear"
channel = 1
inputs = { input = "x" }

[[module]]
name = "grad"
type = "monitor"
inputs = { input = "fc" }

[[module]]
name = "out"
type = "regression"
inputs = { input = "fc", label = "x" }
"#;

fn line() -> ModelConfig {
    config::from_str(LINE).unwrap()
}

fn model(cfg: &ModelConfig, mode: RunMode) -> Model {
    let mut model = Model::from_config(&Registry::with_builtins(), cfg, mode).unwrap();
    model.init().unwrap();
    model
}

#[test]
fn training_reduces_the_loss() {
    init_tracing();
    let cfg = line();
    let mut model = model(&cfg, RunMode::Train);
    let mut plan = model.plan().unwrap();

    let options = TrainOptions {
        max_loops: 200,
        report_every: 50,
        ..TrainOptions::default()
    };
    let summary = session::train(&mut model, &mut plan, &options, None).unwrap();

    assert_eq!(summary.loops, 200);
    assert!(!summary.exhausted);
    assert_eq!(summary.reports.len(), 4);

    let first = summary.reports[0].loss.unwrap();
    let last = summary.reports[3].loss.unwrap();
    assert!(last < first, "loss went from {first} to {last}");
    assert!(last < 0.1, "final loss {last}");

    let w = model.with_params("fc.weight", |p| p.value(0)).unwrap();
    let b = model.with_params("fc.bias", |p| p.value(0)).unwrap();
    assert!((w - 2.0).abs() < 0.2, "w = {w}");
    assert!((b - 1.0).abs() < 0.3, "b = {b}");
}

#[test]
fn monitor_sees_values_and_gradients_each_loop() {
    let cfg = line();
    let mut model = model(&cfg, RunMode::Train);
    let mut plan = model.plan().unwrap();
    let options = TrainOptions {
        max_loops: 3,
        report_every: 3,
        ..TrainOptions::default()
    };
    let summary = session::train(&mut model, &mut plan, &options, None).unwrap();

    let report = &summary.reports[0];
    let grad = report.stats.iter().find(|s| s.module == "grad").unwrap();
    let counts: Vec<u64> = grad.entries.iter().map(|(_, s)| s.count).collect();
    assert_eq!(counts, [3, 3]);
    assert!(grad.mean_of("delta_l2").unwrap() > 0.0);
}

#[test]
fn prediction_makes_one_pass_in_batches() {
    let cfg = config::from_str(&LINE.replace("batch = 4", "batch = 3")).unwrap();
    let mut model = model(&cfg, RunMode::Predict);
    let mut plan = model.plan().unwrap();

    let summary = session::predict(&mut model, &mut plan, ExecOptions::default()).unwrap();
    assert_eq!(summary.batches, 2);
    let out = summary.stats.iter().find(|s| s.module == "out").unwrap();
    assert_eq!(out.entries[0].1.count, 4);

    // A second pass starts from the beginning again.
    let again = session::predict(&mut model, &mut plan, ExecOptions::default()).unwrap();
    assert_eq!(again.batches, 2);
    assert_eq!(again.loss, summary.loss);
}

#[test]
fn evaluation_follows_the_trained_parameters() {
    let cfg = line();
    let mut model = model(&cfg, RunMode::Train);
    let mut plan = model.plan().unwrap();
    let mut eval_model = Model::from_config(&Registry::with_builtins(), &cfg, RunMode::Predict).unwrap();
    let mut eval_plan = eval_model.plan().unwrap();

    let options = TrainOptions {
        max_loops: 150,
        report_every: 50,
        ..TrainOptions::default()
    };
    let eval = Evaluator {
        model: &mut eval_model,
        plan: &mut eval_plan,
    };
    let summary = session::train(&mut model, &mut plan, &options, Some(eval)).unwrap();

    let losses: Vec<f64> = summary
        .reports
        .iter()
        .map(|r| r.evaluation.as_ref().unwrap().loss.unwrap())
        .collect();
    assert_eq!(losses.len(), 3);
    assert!(losses[2] < losses[0], "eval losses {losses:?}");
}

#[test]
fn sessions_check_the_model_mode() {
    let cfg = line();
    let mut train_model = model(&cfg, RunMode::Train);
    let mut plan = train_model.plan().unwrap();
    assert!(session::predict(&mut train_model, &mut plan, ExecOptions::default()).is_err());

    let mut predict_model = model(&cfg, RunMode::Predict);
    let mut plan = predict_model.plan().unwrap();
    assert!(session::train(&mut predict_model, &mut plan, &TrainOptions::default(), None).is_err());
}
