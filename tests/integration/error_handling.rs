// tests/integration/error_handling.rs

use std::io::Write;

use pinplan::config::{ModuleSpec, load_and_validate};
use pinplan::errors::PlanError;
use pinplan::model::Model;
use pinplan::module::{BuildContext, BuildModule, Module, Registry};
use pinplan::plan::{Executor, Plan, TaskId};
use pinplan::types::{ModuleId, RunMode, TaskFlow};
use pinplan_test_utils::builders::{ModelConfigBuilder, probe};
use tempfile::NamedTempFile;

fn noop() -> pinplan::errors::Result<TaskFlow> {
    Ok(TaskFlow::Continue)
}

#[test]
fn test_pin_cycle_returns_structured_error() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[[module]]
name = "A"
type = "id"
inputs = {{ input = "B" }}

[[module]]
name = "B"
type = "id"
inputs = {{ input = "A" }}
"#
    )
    .unwrap();

    let result = load_and_validate(file.path());

    match result {
        Err(PlanError::PinCycle(msg)) => {
            assert!(msg.contains("cycle detected"));
            assert!(msg.contains("A") || msg.contains("B"));
        }
        Err(e) => panic!("Expected PinCycle error, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_unknown_input_returns_config_error() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
[[module]]
name = "A"
type = "id"
inputs = {{ input = "NonExistent" }}
"#
    )
    .unwrap();

    match load_and_validate(file.path()) {
        Err(PlanError::ConfigError(msg)) => {
            assert!(msg.contains("unknown input"));
            assert!(msg.contains("NonExistent"));
        }
        Err(e) => panic!("Expected ConfigError, got: {:?}", e),
        Ok(_) => panic!("Expected error, got Ok"),
    }
}

#[test]
fn test_malformed_toml_is_a_toml_error() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "[[module]\nname = ").unwrap();
    assert!(matches!(
        load_and_validate(file.path()),
        Err(PlanError::TomlError(_))
    ));
}

#[test]
fn test_unknown_module_type() {
    let cfg = ModelConfigBuilder::new()
        .module(ModuleSpec::new("a", "convolution"))
        .build();
    let err = Model::from_config(&Registry::with_builtins(), &cfg, RunMode::Train).unwrap_err();
    match err {
        PlanError::UnknownModuleType(kind) => assert_eq!(kind, "convolution"),
        other => panic!("Expected UnknownModuleType, got: {other:?}"),
    }
}

#[test]
fn test_duplicate_task_identity_is_fatal() {
    let mut plan = Plan::new();
    plan.add(TaskId::predict(ModuleId(0)), noop).unwrap();
    let err = plan.add(TaskId::predict(ModuleId(0)), noop).err().unwrap();
    assert!(matches!(err, PlanError::DuplicateTask(_)));
}

#[test]
fn test_predecessor_never_added_fails_at_freeze() {
    let mut plan = Plan::new();
    plan.add(TaskId::update(ModuleId(0)), noop)
        .unwrap()
        .after(TaskId::update(ModuleId(1)));
    assert!(matches!(
        plan.freeze(),
        Err(PlanError::UnknownPredecessor { .. })
    ));
}

#[test]
fn test_run_before_freeze_is_fatal() {
    let mut plan = Plan::new();
    plan.add(TaskId::predict(ModuleId(0)), noop).unwrap();
    assert!(matches!(
        Executor::default().run(&mut plan),
        Err(PlanError::NotFrozen)
    ));
}

#[test]
fn test_cyclic_task_graph_aborts_the_run() {
    let mut plan = Plan::new();
    let a = TaskId::predict(ModuleId(0));
    let b = TaskId::predict(ModuleId(1));
    plan.add(a, noop).unwrap().after(b);
    plan.add(b, noop).unwrap().after(a);
    plan.freeze().unwrap();

    match Executor::default().run(&mut plan) {
        Err(PlanError::IncompleteRun { executed, total }) => {
            assert_eq!(executed, 0);
            assert_eq!(total, 2);
        }
        other => panic!("Expected IncompleteRun, got: {other:?}"),
    }
}

struct ForwardOnly;

impl Module for ForwardOnly {
    fn supports(&self, mode: RunMode) -> bool {
        mode == RunMode::Predict
    }
}

impl BuildModule for ForwardOnly {
    fn build(_ctx: &mut BuildContext<'_>) -> pinplan::errors::Result<Self> {
        Ok(ForwardOnly)
    }
}

#[test]
fn test_unsupported_mode_fails_plan_construction() {
    let mut registry = Registry::with_builtins();
    registry.register::<ForwardOnly>("forward-only").unwrap();
    let cfg = ModelConfigBuilder::new()
        .module(ModuleSpec::new("f", "forward-only"))
        .build();

    let predict = Model::from_config(&registry, &cfg, RunMode::Predict).unwrap();
    assert!(predict.plan().is_ok());

    let train = Model::from_config(&registry, &cfg, RunMode::Train).unwrap();
    match train.plan() {
        Err(PlanError::UnsupportedMode { module, mode }) => {
            assert_eq!(module, "f");
            assert_eq!(mode, RunMode::Train);
        }
        other => panic!("Expected UnsupportedMode, got: {other:?}"),
    }
}

#[test]
fn test_callback_error_propagates_unchanged() {
    let mut plan = Plan::new();
    plan.add(TaskId::predict(ModuleId(0)), || {
        Err(PlanError::Shape("bad batch".to_string()))
    })
    .unwrap();
    plan.freeze().unwrap();
    match Executor::default().run(&mut plan) {
        Err(PlanError::Shape(msg)) => assert_eq!(msg, "bad batch"),
        other => panic!("Expected Shape error, got: {other:?}"),
    }
}

#[test]
fn test_duplicate_pin_tag_is_rejected_by_builder_config() {
    // Tags live in a table, so duplicates cannot be expressed in TOML; the
    // same input under two tags is fine.
    let cfg = ModelConfigBuilder::new()
        .module(probe("a", &[]))
        .module(probe("b", &["a", "a"]))
        .build();
    let log = pinplan_test_utils::probe::new_log();
    let registry = pinplan_test_utils::probe::probe_registry(&log);
    let model = Model::from_config(&registry, &cfg, RunMode::Train).unwrap();
    let b = model.require("b").unwrap();
    assert_eq!(model.pins(b).unwrap().inputs().len(), 2);
}
