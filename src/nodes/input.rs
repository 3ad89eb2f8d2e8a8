// src/nodes/input.rs

//! In-memory dataset.
//!
//! Parameters: `features` (rows of numbers, required), `labels` (same number
//! of rows, optional) and `batch` (rows per run). The cursor behaves by mode:
//!
//! - `predict`: one pass in file order. The last batch may be short; the run
//!   after it reports [`TaskFlow::Exhausted`].
//! - `train`: endless, reshuffled at the start of every pass.
//! - `verify`: endless, file order, so rewinding repeats the same batches.

use std::cell::RefCell;
use std::rc::Rc;

use ndarray::Array2;
use rand::seq::SliceRandom;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::trace;

use crate::errors::{PlanError, Result};
use crate::module::buffer::{Blob, LabelBatch, Labels, new_blob};
use crate::module::{BuildContext, BuildModule, Input, LabelSource, Module};
use crate::types::{RunMode, TaskFlow};

pub struct InputMemory {
    name: String,
    mode: RunMode,
    features: Array2<f64>,
    labels: Array2<f64>,
    /// Visiting order of the samples.
    order: Vec<usize>,
    offset: usize,
    rng: ChaCha8Rng,
    output: Blob,
    batch: Labels,
}

impl BuildModule for InputMemory {
    fn build(ctx: &mut BuildContext<'_>) -> Result<Self> {
        let name = ctx.name().to_string();
        let features = ctx.matrix("features")?.ok_or_else(|| {
            PlanError::ConfigError(format!("input '{name}' needs a 'features' matrix"))
        })?;
        let samples = features.nrows();
        if samples == 0 {
            return Err(PlanError::ConfigError(format!(
                "input '{name}' has no samples"
            )));
        }
        let labels = ctx
            .matrix("labels")?
            .unwrap_or_else(|| Array2::zeros((samples, 0)));
        if labels.nrows() != samples {
            return Err(PlanError::Shape(format!(
                "input '{name}': {} feature rows but {} label rows",
                samples,
                labels.nrows()
            )));
        }
        let batch_rows = ctx.usize_param("batch", 1)?;
        if batch_rows == 0 {
            return Err(PlanError::ConfigError(format!(
                "input '{name}': batch must be >= 1"
            )));
        }

        let mode = ctx.mode();
        let rng = ChaCha8Rng::seed_from_u64(ctx.rng().next_u64());
        let output = new_blob(batch_rows, features.ncols());
        let batch = Rc::new(RefCell::new(LabelBatch {
            values: Array2::zeros((batch_rows, labels.ncols())),
            valid: 0,
        }));

        let mut input = Self {
            name,
            mode,
            features,
            labels,
            order: (0..samples).collect(),
            offset: 0,
            rng,
            output,
            batch,
        };
        input.rewind();
        Ok(input)
    }
}

impl InputMemory {
    /// Next sample index, or `None` once a prediction pass is over.
    fn next_sample(&mut self) -> Option<usize> {
        if self.offset >= self.order.len() {
            match self.mode {
                RunMode::Predict => return None,
                RunMode::Train => {
                    self.order.shuffle(&mut self.rng);
                    self.offset = 0;
                }
                RunMode::Verify => self.offset = 0,
            }
        }
        let sample = self.order[self.offset];
        self.offset += 1;
        Some(sample)
    }
}

impl Module for InputMemory {
    fn predict(&mut self) -> Result<TaskFlow> {
        if self.mode == RunMode::Predict && self.offset >= self.order.len() {
            trace!(input = %self.name, "end of data");
            return Ok(TaskFlow::Exhausted);
        }

        let output = self.output.clone();
        let batch = self.batch.clone();
        let mut out = output.borrow_mut();
        let mut labels = batch.borrow_mut();
        let rows = out.data.nrows();

        let mut filled = 0;
        while filled < rows {
            let Some(sample) = self.next_sample() else {
                break;
            };
            out.data.row_mut(filled).assign(&self.features.row(sample));
            labels.values.row_mut(filled).assign(&self.labels.row(sample));
            filled += 1;
        }
        labels.valid = filled;
        Ok(TaskFlow::Continue)
    }

    fn preupdate(&mut self) -> Result<()> {
        self.output.borrow_mut().delta.fill(0.0);
        Ok(())
    }

    fn blob(&self) -> Option<Blob> {
        Some(self.output.clone())
    }

    fn as_input(&mut self) -> Option<&mut dyn Input> {
        Some(self)
    }

    fn as_labels(&self) -> Option<&dyn LabelSource> {
        Some(self)
    }
}

impl Input for InputMemory {
    fn rewind(&mut self) {
        // Training starts every pass with a shuffle.
        self.offset = match self.mode {
            RunMode::Train => self.order.len(),
            _ => 0,
        };
    }
}

impl LabelSource for InputMemory {
    fn labels(&self) -> Labels {
        self.batch.clone()
    }
}
