use std::collections::BTreeSet;

use pinplan::config::ModelConfig;
use pinplan::model::Model;
use pinplan::plan::{Executor, Plan};
use pinplan::types::{OpKind, RunMode};
use pinplan_test_utils::builders::{ModelConfigBuilder, probe};
use pinplan_test_utils::probe::{ProbeLog, clock_of, new_log, probe_registry};
use proptest::prelude::*;

// Random pin graphs. Acyclic because module N only reads from modules 0..N-1.
fn pin_graph_strategy(max_modules: usize) -> impl Strategy<Value = ModelConfig> {
    (1..=max_modules).prop_flat_map(|count| {
        proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..4), count)
            .prop_map(move |raw| {
                let mut builder = ModelConfigBuilder::new();
                for (i, picks) in raw.into_iter().enumerate() {
                    let inputs: BTreeSet<usize> = if i == 0 {
                        BTreeSet::new()
                    } else {
                        picks.into_iter().map(|p| p % i).collect()
                    };
                    let names: Vec<String> = inputs.iter().map(|j| format!("m{j}")).collect();
                    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
                    builder = builder.module(probe(&format!("m{i}"), &refs));
                }
                builder.build()
            })
    })
}

fn mode_strategy() -> impl Strategy<Value = RunMode> {
    prop_oneof![Just(RunMode::Train), Just(RunMode::Predict)]
}

fn build(cfg: &ModelConfig, mode: RunMode) -> (ProbeLog, Model, Plan) {
    let log = new_log();
    let model = Model::from_config(&probe_registry(&log), cfg, mode).unwrap();
    let plan = model.plan().unwrap();
    (log, model, plan)
}

proptest! {
    #[test]
    fn every_task_runs_exactly_once(cfg in pin_graph_strategy(8), mode in mode_strategy()) {
        let (log, _model, mut plan) = build(&cfg, mode);
        let report = Executor::default().run(&mut plan).unwrap();

        prop_assert!(!report.is_exhausted());
        prop_assert_eq!(report.executed.len(), plan.len());
        let stamps = log.borrow();
        prop_assert_eq!(stamps.len(), plan.len());
        let unique: BTreeSet<(String, OpKind)> =
            stamps.iter().map(|s| (s.module.clone(), s.op)).collect();
        prop_assert_eq!(unique.len(), stamps.len());
    }

    #[test]
    fn predecessors_happen_before(cfg in pin_graph_strategy(8), mode in mode_strategy()) {
        let (log, model, mut plan) = build(&cfg, mode);
        Executor::default().run(&mut plan).unwrap();

        let clock = |id: pinplan::plan::TaskId| {
            let name = model.name_of(id.module).unwrap();
            clock_of(&log, name, id.op).unwrap()
        };
        for task in plan.task_ids().collect::<Vec<_>>() {
            for &before in plan.inputs_of(task).unwrap() {
                prop_assert!(
                    clock(before) < clock(task),
                    "{} ran before its predecessor {}", task, before
                );
            }
        }
    }

    #[test]
    fn forward_follows_pins_and_backward_reverses_them(cfg in pin_graph_strategy(8)) {
        let (log, model, mut plan) = build(&cfg, RunMode::Train);
        Executor::default().run(&mut plan).unwrap();

        for consumer in model.ids() {
            let consumer_name = model.name_of(consumer).unwrap();
            for pin in model.pins(consumer).unwrap().inputs() {
                let producer_name = model.name_of(pin.module).unwrap();
                let predict = |name: &str| clock_of(&log, name, OpKind::Predict).unwrap();
                let update = |name: &str| clock_of(&log, name, OpKind::Update).unwrap();
                prop_assert!(predict(producer_name) < predict(consumer_name));
                prop_assert!(update(consumer_name) < update(producer_name));
            }
        }
    }

    #[test]
    fn dry_runs_are_reproducible(cfg in pin_graph_strategy(8), mode in mode_strategy()) {
        let (log, _model, mut plan) = build(&cfg, mode);
        let first = Executor::dry().run(&mut plan).unwrap();
        let second = Executor::dry().run(&mut plan).unwrap();

        prop_assert_eq!(&first.executed, &second.executed);
        prop_assert_eq!(first.executed.len(), plan.len());
        prop_assert!(log.borrow().is_empty());
    }
}
