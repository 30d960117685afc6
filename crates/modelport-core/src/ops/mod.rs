//! Capability-injection table of primitive operations.
//!
//! The runtime model never calls math directly: every primitive goes through
//! an [`OpInvoker`], so the trace backend can observe invocations and the
//! patch registry can inject implementations the runtime is missing. The
//! table is owned by a single conversion run and passed explicitly into the
//! backend call — there is no process-wide symbol table to mutate.
//!
//! The builtin set deliberately omits `rms_norm`: that primitive is supplied
//! by the standard patch set before any model is loaded, mirroring runtimes
//! that ship without it.

pub mod patch;

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{ModelportError, Result};
use crate::tensor::Tensor;

/// Operator names used by the transformer runtime.
pub const EMBEDDING: &str = "embedding";
pub const RMS_NORM: &str = "rms_norm";
pub const LINEAR: &str = "linear";
pub const SILU: &str = "silu";
pub const ADD: &str = "add";
pub const KV_CACHE: &str = "kv_cache";

/// Primitives the full forward pass exercises. `verify_required` in the
/// patch module reports any of these still missing after patching.
pub const REQUIRED_FORWARD_OPS: &[&str] = &[EMBEDDING, RMS_NORM, LINEAR, SILU, ADD, KV_CACHE];

/// One primitive implementation.
pub type OpKernel = Arc<dyn Fn(&[Tensor]) -> Result<Tensor> + Send + Sync>;

/// Dispatch seam between the runtime model and the operator table. The trace
/// backend wraps a table in a recording implementation of this trait.
pub trait OpInvoker {
    fn invoke(&self, op: &str, inputs: &[Tensor]) -> Result<Tensor>;
}

/// Per-run table of operator implementations.
#[derive(Clone, Default)]
pub struct OpTable {
    kernels: HashMap<String, OpKernel>,
}

impl OpTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with the builtin primitive set. `rms_norm` is not included;
    /// apply the standard patch set before loading a model.
    pub fn builtin() -> Self {
        let mut table = Self::new();
        table.register(EMBEDDING, Arc::new(embedding_kernel));
        table.register(LINEAR, Arc::new(linear_kernel));
        table.register(SILU, Arc::new(silu_kernel));
        table.register(ADD, Arc::new(add_kernel));
        table.register(KV_CACHE, Arc::new(kv_cache_kernel));
        table
    }

    pub fn register(&mut self, name: &str, kernel: OpKernel) {
        self.kernels.insert(name.to_string(), kernel);
    }

    pub fn remove(&mut self, name: &str) -> Option<OpKernel> {
        self.kernels.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<OpKernel> {
        self.kernels.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.kernels.contains_key(name)
    }
}

impl OpInvoker for OpTable {
    fn invoke(&self, op: &str, inputs: &[Tensor]) -> Result<Tensor> {
        let kernel = self
            .get(op)
            .ok_or_else(|| ModelportError::MissingOperator { name: op.to_string() })?;
        kernel(inputs)
    }
}

fn arity(op: &str, inputs: &[Tensor], expected: usize) -> Result<()> {
    if inputs.len() != expected {
        return Err(ModelportError::Config {
            message: format!("op '{op}' expects {expected} input(s), got {}", inputs.len()),
        });
    }
    Ok(())
}

/// `[1, n]` ids x `[vocab, hidden]` table -> `[1, n, hidden]`.
fn embedding_kernel(inputs: &[Tensor]) -> Result<Tensor> {
    arity(EMBEDDING, inputs, 2)?;
    let ids = inputs[0].as_ids()?;
    let table = inputs[1].as_f32()?;
    let [vocab, hidden] = table_dims(&inputs[1])?;

    let mut out = Vec::with_capacity(ids.len() * hidden);
    for &id in ids {
        let row = id as usize;
        if row >= vocab {
            return Err(ModelportError::Config {
                message: format!("token id {id} out of range for vocab {vocab}"),
            });
        }
        out.extend_from_slice(&table[row * hidden..(row + 1) * hidden]);
    }
    Tensor::f32(vec![1, ids.len(), hidden], out)
}

/// `[1, n, h]` x `[h, out]` -> `[1, n, out]`.
fn linear_kernel(inputs: &[Tensor]) -> Result<Tensor> {
    arity(LINEAR, inputs, 2)?;
    let x = inputs[0].as_f32()?;
    let w = inputs[1].as_f32()?;
    let (n, h) = last_two(&inputs[0])?;
    let [wh, out_dim] = table_dims(&inputs[1])?;
    if wh != h {
        return Err(ModelportError::Config {
            message: format!("linear dims mismatch: input width {h}, weight height {wh}"),
        });
    }

    let mut out = vec![0.0f32; n * out_dim];
    for t in 0..n {
        for j in 0..out_dim {
            let mut acc = 0.0f32;
            for k in 0..h {
                acc += x[t * h + k] * w[k * out_dim + j];
            }
            out[t * out_dim + j] = acc;
        }
    }
    Tensor::f32(vec![1, n, out_dim], out)
}

fn silu_kernel(inputs: &[Tensor]) -> Result<Tensor> {
    arity(SILU, inputs, 1)?;
    let x = inputs[0].as_f32()?;
    let out = x.iter().map(|v| v / (1.0 + (-v).exp())).collect();
    Tensor::f32(inputs[0].shape.clone(), out)
}

fn add_kernel(inputs: &[Tensor]) -> Result<Tensor> {
    arity(ADD, inputs, 2)?;
    let a = inputs[0].as_f32()?;
    let b = inputs[1].as_f32()?;
    if inputs[0].shape != inputs[1].shape {
        return Err(ModelportError::Config {
            message: format!(
                "add shape mismatch: {:?} vs {:?}",
                inputs[0].shape, inputs[1].shape
            ),
        });
    }
    let out = a.iter().zip(b).map(|(x, y)| x + y).collect();
    Tensor::f32(inputs[0].shape.clone(), out)
}

/// Present-key-value bookkeeping stand-in: identity on the hidden states.
/// Its presence in the trace is what marks a cache-enabled graph.
fn kv_cache_kernel(inputs: &[Tensor]) -> Result<Tensor> {
    arity(KV_CACHE, inputs, 1)?;
    Ok(inputs[0].clone())
}

fn table_dims(t: &Tensor) -> Result<[usize; 2]> {
    match t.shape.as_slice() {
        [a, b] => Ok([*a, *b]),
        other => Err(ModelportError::Config {
            message: format!("expected a 2-D tensor, got shape {other:?}"),
        }),
    }
}

/// Sequence length and width of a `[1, n, h]` activation.
fn last_two(t: &Tensor) -> Result<(usize, usize)> {
    match t.shape.as_slice() {
        [1, n, h] => Ok((*n, *h)),
        other => Err(ModelportError::Config {
            message: format!("expected a [1, n, h] activation, got shape {other:?}"),
        }),
    }
}

/// Reference `rms_norm` used by the standard patch set:
/// `x / sqrt(mean(x^2) + eps) * weight`.
pub fn rms_norm_fallback(inputs: &[Tensor]) -> Result<Tensor> {
    arity(RMS_NORM, inputs, 2)?;
    let x = inputs[0].as_f32()?;
    let weight = inputs[1].as_f32()?;
    let (n, h) = last_two(&inputs[0])?;
    if weight.len() != h {
        return Err(ModelportError::Config {
            message: format!("rms_norm weight length {} does not match width {h}", weight.len()),
        });
    }

    const EPS: f32 = 1e-5;
    let mut out = vec![0.0f32; n * h];
    for t in 0..n {
        let row = &x[t * h..(t + 1) * h];
        let variance: f32 = row.iter().map(|v| v * v).sum::<f32>() / h as f32;
        let scale = 1.0 / (variance + EPS).sqrt();
        for k in 0..h {
            out[t * h + k] = row[k] * scale * weight[k];
        }
    }
    Tensor::f32(inputs[0].shape.clone(), out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_omits_rms_norm() {
        let table = OpTable::builtin();
        assert!(table.contains(EMBEDDING));
        assert!(table.contains(KV_CACHE));
        assert!(!table.contains(RMS_NORM));
    }

    #[test]
    fn test_missing_operator_error() {
        let table = OpTable::builtin();
        let input = Tensor::f32(vec![1, 1, 2], vec![1.0, 2.0]).unwrap();
        let err = table.invoke(RMS_NORM, &[input.clone(), input]).unwrap_err();
        assert!(matches!(err, ModelportError::MissingOperator { ref name } if name == RMS_NORM));
    }

    #[test]
    fn test_embedding_lookup() {
        let table = OpTable::builtin();
        let ids = Tensor::from_ids(&[1, 0]);
        let weights = Tensor::f32(vec![2, 3], vec![0.0, 0.1, 0.2, 1.0, 1.1, 1.2]).unwrap();
        let out = table.invoke(EMBEDDING, &[ids, weights]).unwrap();
        assert_eq!(out.shape, vec![1, 2, 3]);
        assert_eq!(out.as_f32().unwrap(), &[1.0, 1.1, 1.2, 0.0, 0.1, 0.2]);
    }

    #[test]
    fn test_embedding_rejects_out_of_range_id() {
        let table = OpTable::builtin();
        let ids = Tensor::from_ids(&[5]);
        let weights = Tensor::f32(vec![2, 3], vec![0.0; 6]).unwrap();
        assert!(table.invoke(EMBEDDING, &[ids, weights]).is_err());
    }

    #[test]
    fn test_rms_norm_fallback_normalizes() {
        let x = Tensor::f32(vec![1, 1, 2], vec![3.0, 4.0]).unwrap();
        let weight = Tensor::f32(vec![2], vec![1.0, 1.0]).unwrap();
        let out = rms_norm_fallback(&[x, weight]).unwrap();
        let values = out.as_f32().unwrap();
        // rms of [3, 4] is sqrt(12.5)
        let rms = 12.5f32.sqrt();
        assert!((values[0] - 3.0 / rms).abs() < 1e-4);
        assert!((values[1] - 4.0 / rms).abs() < 1e-4);
    }

    #[test]
    fn test_linear_shapes() {
        let table = OpTable::builtin();
        let x = Tensor::f32(vec![1, 2, 2], vec![1.0, 0.0, 0.0, 1.0]).unwrap();
        let w = Tensor::f32(vec![2, 2], vec![2.0, 0.0, 0.0, 2.0]).unwrap();
        let out = table.invoke(LINEAR, &[x, w]).unwrap();
        assert_eq!(out.shape, vec![1, 2, 2]);
        assert_eq!(out.as_f32().unwrap(), &[2.0, 0.0, 0.0, 2.0]);
    }
}
