//! Minimal tensor value used for example inputs and traced activations.
//!
//! This is deliberately not an operator library: it carries a shape and a
//! flat buffer so wrappers and kernels can pass values around while the
//! recorder captures operation structure.

use serde::Serialize;

use crate::error::{ModelportError, Result};

/// Flat tensor payload. Token ids are i64, activations are f32.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    I64(Vec<i64>),
    F32(Vec<f32>),
}

/// A shape plus a flat buffer, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    pub shape: Vec<usize>,
    pub data: TensorData,
}

/// Shape and dtype of a graph input or output, as serialized into artifacts.
#[derive(Debug, Clone, Serialize)]
pub struct TensorInfo {
    pub name: String,
    pub dtype: &'static str,
    pub shape: Vec<usize>,
}

impl Tensor {
    /// Build a `[1, n]` batch of token ids.
    pub fn from_ids(ids: &[i64]) -> Self {
        Self {
            shape: vec![1, ids.len()],
            data: TensorData::I64(ids.to_vec()),
        }
    }

    /// Build an f32 tensor, checking that the buffer matches the shape.
    pub fn f32(shape: Vec<usize>, data: Vec<f32>) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(ModelportError::Config {
                message: format!(
                    "tensor shape {shape:?} expects {expected} elements, got {}",
                    data.len()
                ),
            });
        }
        Ok(Self {
            shape,
            data: TensorData::F32(data),
        })
    }

    pub fn dtype(&self) -> &'static str {
        match self.data {
            TensorData::I64(_) => "int64",
            TensorData::F32(_) => "float32",
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow the id buffer, or error if this is not an id tensor.
    pub fn as_ids(&self) -> Result<&[i64]> {
        match &self.data {
            TensorData::I64(ids) => Ok(ids),
            TensorData::F32(_) => Err(ModelportError::Config {
                message: "expected an int64 tensor".into(),
            }),
        }
    }

    /// Borrow the f32 buffer, or error if this is an id tensor.
    pub fn as_f32(&self) -> Result<&[f32]> {
        match &self.data {
            TensorData::F32(v) => Ok(v),
            TensorData::I64(_) => Err(ModelportError::Config {
                message: "expected a float32 tensor".into(),
            }),
        }
    }

    /// Describe this tensor under a graph-level name.
    pub fn info(&self, name: &str) -> TensorInfo {
        TensorInfo {
            name: name.to_string(),
            dtype: self.dtype(),
            shape: self.shape.clone(),
        }
    }
}
