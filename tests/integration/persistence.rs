// tests/integration/persistence.rs

use pinplan::config::{self, ModelConfig};
use pinplan::errors::PlanError;
use pinplan::model::Model;
use pinplan::module::Registry;
use pinplan::session::{self, TrainOptions};
use pinplan::types::RunMode;

const TWO_LAYERS: &str = r#"
[global]
batch = 2
eta = 0.05
init = 0.3

[[module]]
name = "x"
type = "input-memory"
features = [[0.0, 1.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]
labels = [[1.0], [1.0], [0.0], [0.0]]

[[module]]
name = "hidden"
type = "linear"
channel = 3
inputs = { input = "x" }

[[module]]
name = "act"
type = "tanh"
inputs = { input = "hidden" }

[[module]]
name = "fc"
type = "linear"
channel = 1
inputs = { input = "act" }

[[module]]
name = "out"
type = "regression"
inputs = { input = "fc", label = "x" }
"#;

fn cfg() -> ModelConfig {
    config::from_str(TWO_LAYERS).unwrap()
}

fn values(model: &Model, name: &str) -> Vec<f64> {
    model
        .with_params(name, |p| (0..p.dim()).map(|i| p.value(i)).collect())
        .unwrap()
}

#[test]
fn training_writes_final_model_and_numbered_snapshots() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.bin");
    let cfg = cfg();
    let registry = Registry::with_builtins();

    let mut model = Model::from_config(&registry, &cfg, RunMode::Train).unwrap();
    model.init().unwrap();
    let mut plan = model.plan().unwrap();
    let options = TrainOptions {
        max_loops: 6,
        snapshot_every: 3,
        model_path: Some(path.clone()),
        ..TrainOptions::default()
    };
    let summary = session::train(&mut model, &mut plan, &options, None).unwrap();

    assert_eq!(
        summary.snapshots,
        [dir.path().join("model.bin.1"), dir.path().join("model.bin.2")]
    );
    assert!(path.exists());
    for snapshot in summary.snapshots.iter() {
        assert!(snapshot.exists());
    }

    let mut restored = Model::from_config(&registry, &cfg, RunMode::Predict).unwrap();
    restored.load_from_path(&path).unwrap();
    for name in ["hidden_weight", "hidden_bias", "fc_weight", "fc_bias"] {
        assert_eq!(values(&restored, name), values(&model, name), "{name}");
    }
}

#[test]
fn zero_max_loops_runs_once_and_still_saves() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("model.bin");
    let registry = Registry::with_builtins();

    let mut model = Model::from_config(&registry, &cfg(), RunMode::Train).unwrap();
    model.init().unwrap();
    let mut plan = model.plan().unwrap();
    let options = TrainOptions {
        max_loops: 0,
        model_path: Some(path.clone()),
        ..TrainOptions::default()
    };
    let summary = session::train(&mut model, &mut plan, &options, None).unwrap();

    assert_eq!(summary.loops, 1);
    assert!(!summary.exhausted);
    assert!(path.exists());
}

#[test]
fn loading_into_a_different_architecture_fails() {
    let registry = Registry::with_builtins();
    let mut model = Model::from_config(&registry, &cfg(), RunMode::Train).unwrap();
    model.init().unwrap();
    let bytes = model.snapshot().unwrap();

    let renamed = config::from_str(&TWO_LAYERS.replace("\"hidden\"", "\"h1\"")).unwrap();
    let mut other = Model::from_config(&registry, &renamed, RunMode::Train).unwrap();
    match other.restore(&bytes) {
        Err(PlanError::ConfigError(msg)) => assert!(msg.contains("hidden")),
        other => panic!("Expected ConfigError, got: {other:?}"),
    }
}

#[test]
fn same_seed_gives_same_initial_parameters() {
    let registry = Registry::with_builtins();
    let mut a = Model::from_config(&registry, &cfg(), RunMode::Train).unwrap();
    let mut b = Model::from_config(&registry, &cfg(), RunMode::Train).unwrap();
    a.init().unwrap();
    b.init().unwrap();
    assert_eq!(values(&a, "hidden_weight"), values(&b, "hidden_weight"));
    assert_eq!(a.snapshot().unwrap(), b.snapshot().unwrap());
}
