//! Wrapper variants adapting the model's native call interface to the
//! single-tensor-in/single-tensor-out shape the tracer requires.
//!
//! The three variants trade fidelity against export success probability; the
//! pairing of variant to strategy is fixed per strategy, because each
//! strategy's tracer has a different operator-support ceiling.

use serde::Serialize;

use crate::config::{ExportConfig, ExportDefaults};
use crate::error::Result;
use crate::model::TransformerModel;
use crate::ops::OpInvoker;
use crate::tensor::Tensor;

/// The fixed wrapper variant set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WrapperKind {
    /// Input-embedding lookup only. Lowest fidelity, highest export success
    /// probability; last-resort fallback that at least validates plumbing.
    EmbeddingOnly,
    /// Full forward pass with caching forced off and a short example
    /// sequence, reducing traced-graph complexity.
    Reduced,
    /// Complete forward pass with default settings; example length dictated
    /// by the export configuration.
    Full,
}

impl WrapperKind {
    /// Prompt traced through this variant.
    pub fn example_prompt(self) -> &'static str {
        match self {
            WrapperKind::Full => ExportDefaults::EXAMPLE_PROMPT,
            WrapperKind::Reduced | WrapperKind::EmbeddingOnly => ExportDefaults::SHORT_PROMPT,
        }
    }

    /// Example-input ceiling for this variant.
    pub fn example_len(self, config: &ExportConfig) -> usize {
        match self {
            WrapperKind::Full => config.max_length,
            WrapperKind::Reduced => ExportDefaults::REDUCED_SEQUENCE_LENGTH.min(config.max_length),
            WrapperKind::EmbeddingOnly => ExportDefaults::EMBEDDING_SEQUENCE_LENGTH,
        }
    }

    /// Name of the single graph output this variant produces.
    pub fn output_name(self) -> &'static str {
        match self {
            WrapperKind::EmbeddingOnly => "embeddings",
            WrapperKind::Reduced => "hidden_states",
            WrapperKind::Full => "last_hidden_state",
        }
    }
}

impl std::fmt::Display for WrapperKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WrapperKind::EmbeddingOnly => "embedding-only",
            WrapperKind::Reduced => "reduced",
            WrapperKind::Full => "full",
        };
        f.write_str(name)
    }
}

/// A model adapted to `forward(example_input) -> tensor`.
pub struct ExportWrapper<'m> {
    model: &'m TransformerModel,
    kind: WrapperKind,
}

impl<'m> ExportWrapper<'m> {
    pub fn new(model: &'m TransformerModel, kind: WrapperKind) -> Self {
        Self { model, kind }
    }

    pub fn kind(&self) -> WrapperKind {
        self.kind
    }

    /// Run the wrapped forward pass through the given operator dispatch.
    pub fn forward(&self, ops: &dyn OpInvoker, input_ids: &Tensor) -> Result<Tensor> {
        match self.kind {
            WrapperKind::EmbeddingOnly => self.model.embed(ops, input_ids),
            WrapperKind::Reduced => self.model.forward(ops, input_ids, false),
            WrapperKind::Full => self.model.forward(ops, input_ids, true),
        }
    }
}
