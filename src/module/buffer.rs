// src/module/buffer.rs

//! Shared numeric buffers.
//!
//! A module that produces an array output owns a [`Blob`]: the forward values
//! (`data`) and the gradient accumulated by its consumers (`delta`). Consumers
//! keep a clone of the handle, so no task ever needs to borrow another
//! module, only its buffers.

use std::cell::RefCell;
use std::rc::Rc;

use ndarray::Array2;

/// Forward values plus gradient accumulator, always the same shape.
#[derive(Debug, Clone)]
pub struct Buffer {
    pub data: Array2<f64>,
    pub delta: Array2<f64>,
}

impl Buffer {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            data: Array2::zeros((rows, cols)),
            delta: Array2::zeros((rows, cols)),
        }
    }

    /// `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }
}

pub type Blob = Rc<RefCell<Buffer>>;

pub fn new_blob(rows: usize, cols: usize) -> Blob {
    Rc::new(RefCell::new(Buffer::zeros(rows, cols)))
}

/// Target values for the current batch.
///
/// Only the first `valid` rows belong to the batch; a short final batch in
/// prediction mode leaves the remaining rows stale.
#[derive(Debug, Clone)]
pub struct LabelBatch {
    pub values: Array2<f64>,
    pub valid: usize,
}

pub type Labels = Rc<RefCell<LabelBatch>>;

/// Euclidean norm over all elements.
pub fn l2(values: &Array2<f64>) -> f64 {
    values.iter().map(|v| v * v).sum::<f64>().sqrt()
}
