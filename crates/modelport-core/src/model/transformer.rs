//! In-memory decoder-only transformer executed through the operator table.
//!
//! Every primitive goes through [`OpInvoker`] so the trace backend observes
//! the operation structure. Weights are materialized deterministically from
//! the config dimensions; the recorder consumes shapes and op order, not
//! numeric fidelity (weight loading belongs to the external model library).

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::ModelConfig;
use crate::error::Result;
use crate::ops::{OpInvoker, ADD, EMBEDDING, KV_CACHE, LINEAR, RMS_NORM, SILU};
use crate::tensor::Tensor;

#[derive(Debug)]
struct LayerWeights {
    input_norm: Tensor,
    attn_proj: Tensor,
    post_norm: Tensor,
    mlp_proj: Tensor,
}

/// Runtime model handle: embedding table plus per-layer projections.
#[derive(Debug)]
pub struct TransformerModel {
    config: ModelConfig,
    embedding: Tensor,
    layers: Vec<LayerWeights>,
    final_norm: Tensor,
}

impl TransformerModel {
    /// Materialize deterministic weights for the given config.
    pub fn materialize(config: &ModelConfig) -> Result<Self> {
        let hidden = config.hidden_size;
        let vocab = config.vocab_size;
        let seed = 0x6d70_0001u64
            ^ (vocab as u64)
            ^ ((hidden as u64) << 16)
            ^ ((config.num_hidden_layers as u64) << 32);
        let mut rng = StdRng::seed_from_u64(seed);

        let mut fill = |len: usize| -> Vec<f32> {
            (0..len).map(|_| rng.random_range(-0.1f32..0.1)).collect()
        };

        let embedding = Tensor::f32(vec![vocab, hidden], fill(vocab * hidden))?;
        let mut layers = Vec::with_capacity(config.num_hidden_layers);
        for _ in 0..config.num_hidden_layers {
            layers.push(LayerWeights {
                input_norm: Tensor::f32(vec![hidden], vec![1.0; hidden])?,
                attn_proj: Tensor::f32(vec![hidden, hidden], fill(hidden * hidden))?,
                post_norm: Tensor::f32(vec![hidden], vec![1.0; hidden])?,
                mlp_proj: Tensor::f32(vec![hidden, hidden], fill(hidden * hidden))?,
            });
        }
        let final_norm = Tensor::f32(vec![hidden], vec![1.0; hidden])?;

        Ok(Self {
            config: config.clone(),
            embedding,
            layers,
            final_norm,
        })
    }

    pub fn architecture(&self) -> &str {
        self.config.architecture()
    }

    pub fn hidden_size(&self) -> usize {
        self.config.hidden_size
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// Input-embedding lookup only.
    pub fn embed(&self, ops: &dyn OpInvoker, input_ids: &Tensor) -> Result<Tensor> {
        ops.invoke(EMBEDDING, &[input_ids.clone(), self.embedding.clone()])
    }

    /// Full forward pass over all layers. `use_cache` enables the
    /// present-key-value path, which records an extra cache op per layer.
    pub fn forward(&self, ops: &dyn OpInvoker, input_ids: &Tensor, use_cache: bool) -> Result<Tensor> {
        let mut hidden = self.embed(ops, input_ids)?;

        for layer in &self.layers {
            let normed = ops.invoke(RMS_NORM, &[hidden.clone(), layer.input_norm.clone()])?;
            let mut attn = ops.invoke(LINEAR, &[normed, layer.attn_proj.clone()])?;
            if use_cache {
                attn = ops.invoke(KV_CACHE, &[attn])?;
            }
            let residual = ops.invoke(ADD, &[hidden, attn])?;

            let normed = ops.invoke(RMS_NORM, &[residual.clone(), layer.post_norm.clone()])?;
            let projected = ops.invoke(LINEAR, &[normed, layer.mlp_proj.clone()])?;
            let activated = ops.invoke(SILU, &[projected])?;
            hidden = ops.invoke(ADD, &[residual, activated])?;
        }

        ops.invoke(RMS_NORM, &[hidden, self.final_norm.clone()])
    }
}
