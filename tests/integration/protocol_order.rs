// tests/integration/protocol_order.rs

use pinplan::model::Model;
use pinplan::plan::{ExecOptions, Executor, RunStatus};
use pinplan::types::{OpKind, RunMode};
use pinplan_test_utils::builders::{ModelConfigBuilder, probe, probe_chain};
use pinplan_test_utils::init_tracing;
use pinplan_test_utils::probe::{ProbeLog, clock_of, new_log, order_of, probe_registry};

fn build(log: &ProbeLog, cfg: &pinplan::config::ModelConfig, mode: RunMode) -> Model {
    Model::from_config(&probe_registry(log), cfg, mode).unwrap()
}

#[test]
fn chain_in_train_mode_runs_forward_then_backward() {
    init_tracing();
    let log = new_log();
    let model = build(&log, &probe_chain(&["A", "B", "C"]), RunMode::Train);
    let mut plan = model.plan().unwrap();

    let report = Executor::default().run(&mut plan).unwrap();
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.executed.len(), 9);
    assert_eq!(log.borrow().len(), 9);

    let at = |m: &str, op: OpKind| clock_of(&log, m, op).unwrap();
    assert!(at("A", OpKind::Predict) < at("B", OpKind::Predict));
    assert!(at("B", OpKind::Predict) < at("C", OpKind::Predict));
    assert!(at("C", OpKind::Update) < at("B", OpKind::Update));
    assert!(at("B", OpKind::Update) < at("A", OpKind::Update));
    for m in ["A", "B", "C"] {
        assert!(at(m, OpKind::Predict) < at(m, OpKind::PreUpdate));
        assert!(at(m, OpKind::PreUpdate) < at(m, OpKind::Update));
    }
}

#[test]
fn chain_schedule_is_fixed_by_declaration_order() {
    let log = new_log();
    let model = build(&log, &probe_chain(&["A", "B", "C"]), RunMode::Train);
    let mut plan = model.plan().unwrap();
    Executor::default().run(&mut plan).unwrap();

    let stamps: Vec<String> = log
        .borrow()
        .iter()
        .map(|s| format!("{}:{}", s.module, s.op))
        .collect();
    assert_eq!(
        stamps,
        [
            "A:PREDICT",
            "A:PREUPDATE",
            "B:PREDICT",
            "B:PREUPDATE",
            "C:PREDICT",
            "C:PREUPDATE",
            "C:UPDATE",
            "B:UPDATE",
            "A:UPDATE",
        ]
    );
}

#[test]
fn predict_mode_declares_only_forward_tasks() {
    let log = new_log();
    let model = build(&log, &probe_chain(&["A", "B", "C"]), RunMode::Predict);
    let mut plan = model.plan().unwrap();
    assert_eq!(plan.len(), 3);

    Executor::default().run(&mut plan).unwrap();
    assert_eq!(order_of(&log, OpKind::Predict), ["A", "B", "C"]);
    assert!(order_of(&log, OpKind::Update).is_empty());
}

#[test]
fn declaration_order_in_file_does_not_matter() {
    let log = new_log();
    let cfg = ModelConfigBuilder::new()
        .module(probe("C", &["B"]))
        .module(probe("B", &["A"]))
        .module(probe("A", &[]))
        .build();
    let model = build(&log, &cfg, RunMode::Train);
    let mut plan = model.plan().unwrap();
    Executor::default().run(&mut plan).unwrap();

    assert_eq!(order_of(&log, OpKind::Predict), ["A", "B", "C"]);
    assert_eq!(order_of(&log, OpKind::Update), ["C", "B", "A"]);
}

#[test]
fn diamond_updates_wait_for_every_consumer() {
    let log = new_log();
    let cfg = ModelConfigBuilder::new()
        .module(probe("src", &[]))
        .module(probe("left", &["src"]))
        .module(probe("right", &["src"]))
        .module(probe("sink", &["left", "right"]))
        .build();
    let model = build(&log, &cfg, RunMode::Train);
    let mut plan = model.plan().unwrap();
    Executor::default().run(&mut plan).unwrap();

    let at = |m: &str, op: OpKind| clock_of(&log, m, op).unwrap();
    assert!(at("left", OpKind::Update) < at("src", OpKind::Update));
    assert!(at("right", OpKind::Update) < at("src", OpKind::Update));
    assert!(at("sink", OpKind::Update) < at("left", OpKind::Update));
    assert!(at("sink", OpKind::Update) < at("right", OpKind::Update));
    // Writing into an input's gradient requires it to be cleared first.
    assert!(at("src", OpKind::PreUpdate) < at("left", OpKind::Update));
    assert!(at("left", OpKind::PreUpdate) < at("sink", OpKind::Update));
}

#[test]
fn exhausted_source_stops_the_run_without_error() {
    let log = new_log();
    let cfg = ModelConfigBuilder::new()
        .module(probe("src", &[]).with_param("exhaust_at", 2i64))
        .module(probe("sink", &["src"]))
        .build();
    let model = build(&log, &cfg, RunMode::Predict);
    let mut plan = model.plan().unwrap();
    let executor = Executor::default();

    let first = executor.run(&mut plan).unwrap();
    assert_eq!(first.status, RunStatus::Completed);

    let second = executor.run(&mut plan).unwrap();
    assert!(second.is_exhausted());
    assert_eq!(second.executed.len(), 1);
    assert_eq!(order_of(&log, OpKind::Predict), ["src", "sink", "src"]);
}

#[test]
fn dry_runs_touch_no_module_and_repeat_exactly() {
    init_tracing();
    let log = new_log();
    let model = build(&log, &probe_chain(&["A", "B", "C", "D"]), RunMode::Train);
    let mut plan = model.plan().unwrap();

    let dry = Executor::dry();
    let first = dry.run(&mut plan).unwrap();
    let second = dry.run(&mut plan).unwrap();
    assert_eq!(first.executed.len(), plan.len());
    assert_eq!(first.executed, second.executed);
    assert!(log.borrow().is_empty());

    // A traced real run follows the same schedule.
    let traced = Executor::new(ExecOptions {
        dry_run: false,
        trace: true,
    })
    .run(&mut plan)
    .unwrap();
    assert_eq!(traced.executed, first.executed);
    assert_eq!(log.borrow().len(), plan.len());
}

#[test]
fn plan_display_lists_predecessors_by_label() {
    let log = new_log();
    let model = build(&log, &probe_chain(&["A", "B"]), RunMode::Train);
    let plan = model.plan().unwrap();
    let text = plan.to_string();
    assert!(text.contains("B:probe:UPDATE\n\tB:probe:PREUPDATE\n\tA:probe:PREUPDATE\n"));
    assert!(text.contains("A:probe:UPDATE\n\tA:probe:PREUPDATE\n\tB:probe:UPDATE\n"));
}
