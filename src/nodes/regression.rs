// src/nodes/regression.rs

//! Squared-error loss against a label source.
//!
//! Per sample: `loss = sum 0.5 * d^2` and `error = mean |d|` over the columns,
//! where `d` is the prediction minus the label, shrunk towards zero by
//! `margin`. The loss is the mean over samples, so `Update` adds `d / valid`
//! to the prediction's gradient. Only the first `valid` rows of the label
//! batch are counted.

use crate::errors::{PlanError, Result};
use crate::module::buffer::{Blob, Labels};
use crate::module::{BuildContext, BuildModule, Loss, Module, Stat, StatSet};
use crate::types::TaskFlow;

pub struct Regression {
    input: Blob,
    labels: Labels,
    margin: f64,
    stats: StatSet,
}

impl BuildModule for Regression {
    fn build(ctx: &mut BuildContext<'_>) -> Result<Self> {
        let input = ctx.input("input")?;
        let input = ctx.blob_of(input)?;
        let label = ctx.input("label")?;
        let labels = ctx.labels_of(label)?;

        let (rows, cols) = input.borrow().shape();
        let label_shape = labels.borrow().values.dim();
        if label_shape != (rows, cols) {
            return Err(PlanError::Shape(format!(
                "regression '{}': prediction is {rows}x{cols}, labels are {}x{}",
                ctx.name(),
                label_shape.0,
                label_shape.1
            )));
        }

        Ok(Self {
            input,
            labels,
            margin: ctx.f64_param("margin", 0.0)?,
            stats: StatSet::new(&["loss", "error"]),
        })
    }
}

impl Regression {
    fn diff(&self, prediction: f64, label: f64) -> f64 {
        let d = prediction - label;
        if d.abs() <= self.margin {
            0.0
        } else {
            d - self.margin * d.signum()
        }
    }
}

impl Module for Regression {
    fn predict(&mut self) -> Result<TaskFlow> {
        let x = self.input.borrow();
        let t = self.labels.borrow();
        let cols = x.data.ncols();

        for row in 0..t.valid {
            let mut loss = 0.0;
            let mut error = 0.0;
            for col in 0..cols {
                let d = self.diff(x.data[[row, col]], t.values[[row, col]]);
                loss += 0.5 * d * d;
                error += d.abs();
            }
            self.stats.acc(0).push(loss);
            self.stats.acc(1).push(error / cols.max(1) as f64);
        }
        Ok(TaskFlow::Continue)
    }

    fn update(&mut self) -> Result<()> {
        let mut x_ref = self.input.borrow_mut();
        let x = &mut *x_ref;
        let t = self.labels.borrow();
        let cols = x.data.ncols();
        let scale = 1.0 / t.valid.max(1) as f64;

        for row in 0..t.valid {
            for col in 0..cols {
                x.delta[[row, col]] +=
                    scale * self.diff(x.data[[row, col]], t.values[[row, col]]);
            }
        }
        Ok(())
    }

    fn as_stat(&self) -> Option<&dyn Stat> {
        Some(self)
    }

    fn as_stat_mut(&mut self) -> Option<&mut dyn Stat> {
        Some(self)
    }

    fn as_loss(&self) -> Option<&dyn Loss> {
        Some(self)
    }
}

impl Stat for Regression {
    fn stats(&self) -> &StatSet {
        &self.stats
    }

    fn stats_mut(&mut self) -> &mut StatSet {
        &mut self.stats
    }
}

impl Loss for Regression {}
