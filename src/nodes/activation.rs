// src/nodes/activation.rs

//! Element-wise activation functions.

use ndarray::Zip;

use crate::errors::Result;
use crate::module::buffer::{Blob, new_blob};
use crate::module::{BuildContext, Module};
use crate::types::TaskFlow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Identity,
    Relu,
    Tanh,
    Logistic,
}

impl Activation {
    pub fn apply(self, x: f64) -> f64 {
        match self {
            Activation::Identity => x,
            Activation::Relu => x.max(0.0),
            Activation::Tanh => x.tanh(),
            Activation::Logistic => 1.0 / (1.0 + (-x).exp()),
        }
    }

    /// Derivative at input `x`, given the output `y = apply(x)`.
    pub fn derivative(self, x: f64, y: f64) -> f64 {
        match self {
            Activation::Identity => 1.0,
            Activation::Relu => {
                if x > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Activation::Tanh => 1.0 - y * y,
            Activation::Logistic => y * (1.0 - y),
        }
    }
}

pub struct FunctionModule {
    activation: Activation,
    input: Blob,
    output: Blob,
}

impl FunctionModule {
    pub fn build_with(ctx: &mut BuildContext<'_>, activation: Activation) -> Result<Self> {
        let input = ctx.input("input")?;
        let input = ctx.blob_of(input)?;
        let (rows, cols) = input.borrow().shape();
        Ok(Self {
            activation,
            input,
            output: new_blob(rows, cols),
        })
    }
}

impl Module for FunctionModule {
    fn predict(&mut self) -> Result<TaskFlow> {
        let f = self.activation;
        let x = self.input.borrow();
        let mut y = self.output.borrow_mut();
        Zip::from(&mut y.data)
            .and(&x.data)
            .for_each(|y, &x| *y = f.apply(x));
        Ok(TaskFlow::Continue)
    }

    fn preupdate(&mut self) -> Result<()> {
        self.output.borrow_mut().delta.fill(0.0);
        Ok(())
    }

    fn update(&mut self) -> Result<()> {
        let f = self.activation;
        let mut input = self.input.borrow_mut();
        let input = &mut *input;
        let y = self.output.borrow();
        Zip::from(&mut input.delta)
            .and(&input.data)
            .and(&y.data)
            .and(&y.delta)
            .for_each(|dx, &x, &y, &dy| *dx += dy * f.derivative(x, y));
        Ok(())
    }

    fn blob(&self) -> Option<Blob> {
        Some(self.output.clone())
    }
}
