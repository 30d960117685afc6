//! Model source resolution and the in-memory runtime model.

mod loader;
mod synthetic;
mod transformer;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokenizers::Tokenizer;

use crate::config::ExportDefaults;
use crate::error::{ModelportError, Result};

pub use loader::ModelLoader;
pub use synthetic::{write_test_model, SyntheticSpec};
pub use transformer::TransformerModel;

/// Caller-provided model location plus optional task hint.
#[derive(Debug, Clone)]
pub struct ModelSource {
    pub path: PathBuf,
    pub task: Option<String>,
}

impl ModelSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            task: None,
        }
    }

    #[must_use]
    pub fn task(mut self, task: impl Into<String>) -> Self {
        self.task = Some(task.into());
        self
    }
}

/// The slice of `config.json` the export engine needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub model_type: String,
    #[serde(default)]
    pub architectures: Vec<String>,
    pub hidden_size: usize,
    pub num_hidden_layers: usize,
    pub vocab_size: usize,
    #[serde(default = "default_max_position_embeddings")]
    pub max_position_embeddings: usize,
}

fn default_max_position_embeddings() -> usize {
    ExportDefaults::MAX_SEQUENCE_LENGTH
}

impl ModelConfig {
    /// Architecture tag used by the native export support list.
    pub fn architecture(&self) -> &str {
        &self.model_type
    }
}

/// A loaded model: runtime handle, tokenizer, config, resolved task hint.
/// Produced once per conversion run and never mutated afterwards.
#[derive(Debug)]
pub struct LoadedModel {
    pub model: TransformerModel,
    pub tokenizer: Tokenizer,
    pub config: ModelConfig,
    pub task: String,
}

impl LoadedModel {
    /// Encode an example prompt, truncated to `max_len` tokens. Falls back
    /// to a single pad id when the prompt encodes to nothing.
    pub fn example_ids(&self, prompt: &str, max_len: usize) -> Result<Vec<i64>> {
        let encoding = self
            .tokenizer
            .encode(prompt, false)
            .map_err(|e| ModelportError::Config {
                message: format!("tokenizer failed to encode example input: {e}"),
            })?;
        let mut ids: Vec<i64> = encoding
            .get_ids()
            .iter()
            .take(max_len.max(1))
            .map(|&id| i64::from(id))
            .collect();
        if ids.is_empty() {
            ids.push(0);
        }
        Ok(ids)
    }
}
