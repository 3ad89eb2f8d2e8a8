// src/nodes/param.rs

//! Trainable parameter matrix.
//!
//! In training mode `Predict` applies the gradient accumulated during the
//! previous run (`data -= eta * delta`), and `PreUpdate` then turns the old
//! gradient into the starting value of the next one:
//! `delta = mom * delta + lambda * data`. In verification mode neither step
//! moves anything and `PreUpdate` clears the gradient.

use std::io::{Read, Write};

use ndarray::Array2;
use rand_distr::{Distribution, Normal};
use tracing::trace;

use crate::errors::{PlanError, Result};
use crate::module::buffer::{Blob, Buffer, new_blob};
use crate::module::{BuildContext, BuildModule, ModelRng, Module, Params};
use crate::types::{RunMode, TaskFlow};

pub struct ParamModule {
    name: String,
    mode: RunMode,
    blob: Blob,
    eta: f64,
    mom: f64,
    lambda: f64,
    /// Standard deviation of the normal initialisation; `0` means zeros.
    init_std: f64,
    /// Explicit initial values, row-major.
    value: Option<Vec<f64>>,
}

impl BuildModule for ParamModule {
    fn build(ctx: &mut BuildContext<'_>) -> Result<Self> {
        let rows = ctx.usize_param("rows", 1)?;
        let cols = ctx.usize_param("size", 1)?;
        let value = ctx.f64_list("value")?;
        if let Some(values) = value.as_ref() {
            if values.len() != rows * cols {
                return Err(PlanError::Shape(format!(
                    "param '{}': {} values for a {}x{} matrix",
                    ctx.name(),
                    values.len(),
                    rows,
                    cols
                )));
            }
        }

        Ok(Self {
            name: ctx.name().to_string(),
            mode: ctx.mode(),
            blob: new_blob(rows, cols),
            eta: ctx.f64_param("eta", 0.01)?,
            mom: ctx.f64_param("mom", 0.0)?,
            lambda: ctx.f64_param("lambda", 0.0)?,
            init_std: ctx.f64_param("init", 0.1)?,
            value,
        })
    }
}

impl ParamModule {
    fn cell(&self, index: usize) -> (usize, usize) {
        let cols = self.blob.borrow().shape().1.max(1);
        (index / cols, index % cols)
    }
}

impl Module for ParamModule {
    fn init(&mut self, rng: &mut ModelRng) -> Result<()> {
        let mut buf = self.blob.borrow_mut();
        let shape = buf.data.dim();
        buf.data = match self.value.as_ref() {
            Some(values) => Array2::from_shape_vec(shape, values.clone())?,
            None if self.init_std > 0.0 => {
                let normal = Normal::new(0.0, self.init_std)
                    .map_err(|e| PlanError::ConfigError(format!("param '{}': {e}", self.name)))?;
                Array2::from_shape_simple_fn(shape, || normal.sample(&mut *rng))
            }
            None => Array2::zeros(shape),
        };
        buf.delta.fill(0.0);
        Ok(())
    }

    fn predict(&mut self) -> Result<TaskFlow> {
        if self.mode == RunMode::Train {
            let Buffer { data, delta } = &mut *self.blob.borrow_mut();
            data.scaled_add(-self.eta, &*delta);
        }
        Ok(TaskFlow::Continue)
    }

    fn preupdate(&mut self) -> Result<()> {
        let Buffer { data, delta } = &mut *self.blob.borrow_mut();
        match self.mode {
            RunMode::Train => {
                *delta *= self.mom;
                delta.scaled_add(self.lambda, &*data);
            }
            _ => delta.fill(0.0),
        }
        Ok(())
    }

    fn save(&self, sink: &mut dyn Write) -> Result<()> {
        let buf = self.blob.borrow();
        bincode::serialize_into(sink, &(&buf.data, &buf.delta))?;
        Ok(())
    }

    fn load(&mut self, source: &mut dyn Read) -> Result<()> {
        let (data, delta): (Array2<f64>, Array2<f64>) = bincode::deserialize_from(source)?;
        let mut buf = self.blob.borrow_mut();
        if data.dim() != buf.shape() || delta.dim() != buf.shape() {
            return Err(PlanError::Shape(format!(
                "param '{}': saved shape {:?} does not match {:?}",
                self.name,
                data.dim(),
                buf.shape()
            )));
        }
        buf.data = data;
        buf.delta = delta;
        trace!(param = %self.name, "state loaded");
        Ok(())
    }

    fn blob(&self) -> Option<Blob> {
        Some(self.blob.clone())
    }

    fn as_params(&mut self) -> Option<&mut dyn Params> {
        Some(self)
    }
}

impl Params for ParamModule {
    fn dim(&self) -> usize {
        self.blob.borrow().data.len()
    }

    fn perturb(&mut self, index: usize, epsilon: f64) {
        let cell = self.cell(index);
        self.blob.borrow_mut().data[cell] += epsilon;
    }

    fn gradient(&self, index: usize) -> f64 {
        self.blob.borrow().delta[self.cell(index)]
    }

    fn value(&self, index: usize) -> f64 {
        self.blob.borrow().data[self.cell(index)]
    }
}
