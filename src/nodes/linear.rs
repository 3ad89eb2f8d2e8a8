// src/nodes/linear.rs

//! Fully connected layer, `y = x W + b`.
//!
//! Pins: `input` (required), `weight` and `bias` (optional). Missing
//! parameter pins are filled with `param` modules named `<name>_weight`
//! (`in x channel`) and `<name>_bias` (`1 x channel`, zero-initialised),
//! which inherit this module's `eta`, `mom`, `lambda` and `init`.

use ndarray::linalg::general_mat_mul;
use ndarray::Axis;

use crate::config::ModuleSpec;
use crate::errors::{PlanError, Result};
use crate::module::buffer::{Blob, new_blob};
use crate::module::{BuildContext, BuildModule, Module};
use crate::types::{ModuleId, TaskFlow};

const INHERITED: [&str; 4] = ["eta", "mom", "lambda", "init"];

pub struct Linear {
    input: Blob,
    weight: Blob,
    bias: Blob,
    output: Blob,
}

impl BuildModule for Linear {
    fn build(ctx: &mut BuildContext<'_>) -> Result<Self> {
        let name = ctx.name().to_string();
        let input_id = ctx.input("input")?;
        let input = ctx.blob_of(input_id)?;
        let (rows, in_dim) = input.borrow().shape();
        let out_dim = ctx.usize_param("channel", 1)?;

        let weight_id = parameter(ctx, "weight", in_dim, out_dim, None)?;
        let weight = ctx.blob_of(weight_id)?;
        let weight_shape = weight.borrow().shape();
        if weight_shape != (in_dim, out_dim) {
            return Err(PlanError::Shape(format!(
                "linear '{name}': input is {rows}x{in_dim}, weight is {}x{}, expected {in_dim}x{out_dim}",
                weight_shape.0, weight_shape.1
            )));
        }

        let bias_id = parameter(ctx, "bias", 1, out_dim, Some(0.0))?;
        // `update` holds all three buffers mutably at once.
        if input_id == weight_id || input_id == bias_id || weight_id == bias_id {
            return Err(PlanError::ConfigError(format!(
                "linear '{name}': input, weight and bias must be distinct modules"
            )));
        }
        let bias = ctx.blob_of(bias_id)?;
        let bias_shape = bias.borrow().shape();
        if bias_shape != (1, out_dim) {
            return Err(PlanError::Shape(format!(
                "linear '{name}': bias is {}x{}, expected 1x{out_dim}",
                bias_shape.0, bias_shape.1
            )));
        }

        Ok(Self {
            input,
            weight,
            bias,
            output: new_blob(rows, out_dim),
        })
    }
}

/// Resolve the `tag` pin, creating a `param` module when it is not wired.
fn parameter(
    ctx: &mut BuildContext<'_>,
    tag: &str,
    rows: usize,
    cols: usize,
    init: Option<f64>,
) -> Result<ModuleId> {
    if let Some(id) = ctx.optional_input(tag)? {
        return Ok(id);
    }

    let mut spec = ModuleSpec::new(&format!("{}_{tag}", ctx.name()), "param")
        .with_param("rows", rows as i64)
        .with_param("size", cols as i64);
    for key in INHERITED {
        if let Some(value) = ctx.spec().params.get(key) {
            spec.params.insert(key.to_string(), value.clone());
        }
    }
    if let Some(init) = init {
        spec.params.insert("init".to_string(), toml::Value::from(init));
    }

    let id = ctx.create(&spec)?;
    ctx.connect(Some(tag), id);
    Ok(id)
}

impl Module for Linear {
    fn predict(&mut self) -> Result<TaskFlow> {
        let x = self.input.borrow();
        let w = self.weight.borrow();
        let b = self.bias.borrow();
        let mut y = self.output.borrow_mut();

        general_mat_mul(1.0, &x.data, &w.data, 0.0, &mut y.data);
        y.data += &b.data;
        Ok(TaskFlow::Continue)
    }

    fn preupdate(&mut self) -> Result<()> {
        self.output.borrow_mut().delta.fill(0.0);
        Ok(())
    }

    fn update(&mut self) -> Result<()> {
        let mut x_ref = self.input.borrow_mut();
        let x = &mut *x_ref;
        let y = self.output.borrow();
        let mut w = self.weight.borrow_mut();
        let mut b = self.bias.borrow_mut();

        // dx += dy W^T
        general_mat_mul(1.0, &y.delta, &w.data.t(), 1.0, &mut x.delta);
        // dW += x^T dy
        general_mat_mul(1.0, &x.data.t(), &y.delta, 1.0, &mut w.delta);
        // db += column sums of dy
        b.delta += &y.delta.sum_axis(Axis(0)).insert_axis(Axis(0));
        Ok(())
    }

    fn blob(&self) -> Option<Blob> {
        Some(self.output.clone())
    }
}
