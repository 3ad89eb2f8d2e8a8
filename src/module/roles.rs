// src/module/roles.rs

//! Capability interfaces a module may implement.
//!
//! The model asks every module once, right after construction, which of these
//! it implements and caches the answer, so nothing on the scheduling path has
//! to inspect module types.

use std::fmt;

use crate::module::buffer::Labels;

/// Sample source with a cursor that can be moved back to the start.
pub trait Input {
    fn rewind(&mut self);
}

/// Module that provides target values for a loss.
pub trait LabelSource {
    fn labels(&self) -> Labels;
}

/// Module that accumulates named statistics.
pub trait Stat {
    fn stats(&self) -> &StatSet;
    fn stats_mut(&mut self) -> &mut StatSet;

    fn reset(&mut self) {
        self.stats_mut().reset();
    }
}

/// The one statistic that training minimises: the mean of the first
/// accumulator. A model has at most one.
pub trait Loss: Stat {
    fn loss(&self) -> f64 {
        self.stats().mean(0)
    }
}

/// Trainable scalars, addressable one component at a time.
pub trait Params {
    fn dim(&self) -> usize;
    /// Add `epsilon` to component `index`.
    fn perturb(&mut self, index: usize, epsilon: f64);
    /// Accumulated gradient of component `index`.
    fn gradient(&self, index: usize) -> f64;
    fn value(&self, index: usize) -> f64;
}

/// Which roles a module implements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub input: bool,
    pub labels: bool,
    pub stat: bool,
    pub loss: bool,
    pub params: bool,
}

/// Running count, sum, sum of squares, min and max of a series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Accumulator {
    count: u64,
    sum: f64,
    sum_sq: f64,
    min: f64,
    max: f64,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self {
            count: 0,
            sum: 0.0,
            sum_sq: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }
}

impl Accumulator {
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.sum_sq += value * value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// Mean, or 0 when nothing was recorded.
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    pub fn summary(&self) -> StatSummary {
        if self.count == 0 {
            return StatSummary::default();
        }
        let n = self.count as f64;
        let mean = self.sum / n;
        let moment2 = self.sum_sq / n;
        StatSummary {
            mean,
            moment2,
            std_dev: (moment2 - mean * mean).max(0.0).sqrt(),
            min: self.min,
            max: self.max,
            count: self.count,
        }
    }
}

/// Snapshot of one accumulator.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatSummary {
    pub mean: f64,
    pub moment2: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub count: u64,
}

/// Named accumulators owned by a [`Stat`] module.
#[derive(Debug, Clone, Default)]
pub struct StatSet {
    names: Vec<String>,
    accs: Vec<Accumulator>,
}

impl StatSet {
    pub fn new(names: &[&str]) -> Self {
        Self {
            names: names.iter().map(|s| s.to_string()).collect(),
            accs: vec![Accumulator::default(); names.len()],
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn acc(&mut self, index: usize) -> &mut Accumulator {
        &mut self.accs[index]
    }

    pub fn mean(&self, index: usize) -> f64 {
        self.accs.get(index).map(Accumulator::mean).unwrap_or(0.0)
    }

    pub fn reset(&mut self) {
        for acc in self.accs.iter_mut() {
            *acc = Accumulator::default();
        }
    }

    pub fn summaries(&self) -> Vec<(String, StatSummary)> {
        self.names
            .iter()
            .cloned()
            .zip(self.accs.iter().map(Accumulator::summary))
            .collect()
    }
}

/// Statistics of one module, as reported by the model.
#[derive(Debug, Clone)]
pub struct StatReport {
    pub module: String,
    pub entries: Vec<(String, StatSummary)>,
}

impl StatReport {
    pub fn mean_of(&self, name: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, s)| s.mean)
    }
}

/// `module name:mean name:mean ...`
impl fmt::Display for StatReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.module)?;
        for (name, summary) in self.entries.iter() {
            write!(f, " {name}:{}", summary.mean)?;
        }
        Ok(())
    }
}
