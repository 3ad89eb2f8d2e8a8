#![allow(dead_code)]

//! A module type that records every task it runs.
//!
//! Every `probe` pushes a [`Stamp`] onto a shared log on `Predict`,
//! `PreUpdate` and `Update`; the log position doubles as a logical clock.

use std::cell::RefCell;
use std::rc::Rc;

use pinplan::errors::Result;
use pinplan::module::{BuildContext, Module, Registry, into_ref};
use pinplan::types::{OpKind, TaskFlow};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stamp {
    pub clock: usize,
    pub module: String,
    pub op: OpKind,
}

pub type ProbeLog = Rc<RefCell<Vec<Stamp>>>;

pub fn new_log() -> ProbeLog {
    Rc::new(RefCell::new(Vec::new()))
}

/// Clock value of `(module, op)`, if it ran.
pub fn clock_of(log: &ProbeLog, module: &str, op: OpKind) -> Option<usize> {
    log.borrow()
        .iter()
        .find(|s| s.module == module && s.op == op)
        .map(|s| s.clock)
}

/// Module names in the order their `op` tasks ran.
pub fn order_of(log: &ProbeLog, op: OpKind) -> Vec<String> {
    log.borrow()
        .iter()
        .filter(|s| s.op == op)
        .map(|s| s.module.clone())
        .collect()
}

pub struct Probe {
    name: String,
    log: ProbeLog,
    predicts: usize,
    /// Report end-of-data on this `Predict` call (1-based).
    exhaust_at: Option<usize>,
}

impl Probe {
    fn stamp(&self, op: OpKind) {
        let mut log = self.log.borrow_mut();
        let clock = log.len();
        log.push(Stamp {
            clock,
            module: self.name.clone(),
            op,
        });
    }
}

impl Module for Probe {
    fn predict(&mut self) -> Result<TaskFlow> {
        self.predicts += 1;
        self.stamp(OpKind::Predict);
        if self.exhaust_at == Some(self.predicts) {
            return Ok(TaskFlow::Exhausted);
        }
        Ok(TaskFlow::Continue)
    }

    fn preupdate(&mut self) -> Result<()> {
        self.stamp(OpKind::PreUpdate);
        Ok(())
    }

    fn update(&mut self) -> Result<()> {
        self.stamp(OpKind::Update);
        Ok(())
    }
}

fn build_probe(ctx: &mut BuildContext<'_>, log: &ProbeLog) -> Result<Probe> {
    let tags: Vec<String> = ctx.spec().inputs.keys().cloned().collect();
    for tag in tags.iter() {
        ctx.input(tag)?;
    }
    let exhaust_at = match ctx.spec().params.get("exhaust_at") {
        Some(_) => Some(ctx.usize_param("exhaust_at", 0)?),
        None => None,
    };
    Ok(Probe {
        name: ctx.name().to_string(),
        log: log.clone(),
        predicts: 0,
        exhaust_at,
    })
}

/// Built-in modules plus `probe`, logging into `log`.
pub fn probe_registry(log: &ProbeLog) -> Registry {
    let mut registry = Registry::with_builtins();
    let log = log.clone();
    registry
        .register_fn("probe", move |ctx| Ok(into_ref(build_probe(ctx, &log)?)))
        .expect("probe is not a built-in type");
    registry
}
