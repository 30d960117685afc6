//! Resolves a model source path into a loaded model.
//!
//! A load failure is terminal for the whole conversion run: no export
//! strategy is attempted over a model that did not resolve.

use std::path::Path;

use tokenizers::Tokenizer;
use tracing::{debug, info};

use super::{LoadedModel, ModelConfig, ModelSource, TransformerModel};
use crate::config::ExportDefaults;
use crate::error::{ModelportError, Result};

const CONFIG_FILE: &str = "config.json";
const TOKENIZER_FILE: &str = "tokenizer.json";

/// Loads a model directory: `config.json` plus `tokenizer.json`.
#[derive(Debug, Default)]
pub struct ModelLoader;

impl ModelLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load the model at `source.path`. Fails with a terminal load error
    /// when the path does not resolve to a recognizable model/tokenizer pair.
    pub fn load(&self, source: &ModelSource) -> Result<LoadedModel> {
        let path = &source.path;
        if !path.is_dir() {
            return Err(load_error(path, "model path does not exist or is not a directory"));
        }

        let config = self.read_config(path)?;
        let tokenizer = self.read_tokenizer(path)?;
        debug!(
            architecture = %config.architecture(),
            hidden_size = config.hidden_size,
            layers = config.num_hidden_layers,
            "parsed model config"
        );

        let model = TransformerModel::materialize(&config)?;
        let task = source
            .task
            .clone()
            .unwrap_or_else(|| ExportDefaults::TASK.to_string());

        info!(
            architecture = %config.architecture(),
            task = %task,
            "model loaded from {}",
            path.display()
        );
        Ok(LoadedModel {
            model,
            tokenizer,
            config,
            task,
        })
    }

    fn read_config(&self, path: &Path) -> Result<ModelConfig> {
        let config_path = path.join(CONFIG_FILE);
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|e| load_error(path, &format!("missing {CONFIG_FILE}: {e}")))?;
        let config: ModelConfig = serde_json::from_str(&raw)
            .map_err(|e| load_error(path, &format!("invalid {CONFIG_FILE}: {e}")))?;

        if config.hidden_size == 0 || config.vocab_size == 0 {
            return Err(load_error(path, "config declares a zero-sized model"));
        }
        Ok(config)
    }

    fn read_tokenizer(&self, path: &Path) -> Result<Tokenizer> {
        let tokenizer_path = path.join(TOKENIZER_FILE);
        if !tokenizer_path.is_file() {
            return Err(load_error(path, &format!("missing {TOKENIZER_FILE}")));
        }
        Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| load_error(path, &format!("invalid {TOKENIZER_FILE}: {e}")))
    }
}

fn load_error(path: &Path, message: &str) -> ModelportError {
    ModelportError::Load {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}
