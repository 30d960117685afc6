//! Synthetic test-model generator.
//!
//! Writes a minimal model directory the loader accepts: a qwen2-flavored
//! `config.json` and a WordLevel `tokenizer.json`. Used to validate the
//! conversion toolchain end to end without downloading real weights.

use std::path::Path;

use serde_json::json;

use crate::error::{ModelportError, Result};

/// Shape of the generated model.
#[derive(Debug, Clone)]
pub struct SyntheticSpec {
    pub model_type: String,
    pub hidden_size: usize,
    pub num_hidden_layers: usize,
    pub vocab_size: usize,
}

impl Default for SyntheticSpec {
    fn default() -> Self {
        Self {
            model_type: "qwen2".to_string(),
            hidden_size: 8,
            num_hidden_layers: 2,
            vocab_size: 32,
        }
    }
}

/// Words the example prompts tokenize into. The remaining vocabulary slots
/// are filled with placeholder tokens up to `vocab_size`.
const BASE_VOCAB: &[&str] = &[
    "<unk>", "hello", ",", "how", "are", "you", "?", "world", ".",
];

/// Write `config.json` and `tokenizer.json` into `dir`, creating it if
/// needed.
pub fn write_test_model(dir: &Path, spec: &SyntheticSpec) -> Result<()> {
    if spec.vocab_size < BASE_VOCAB.len() {
        return Err(ModelportError::Config {
            message: format!(
                "synthetic vocab_size must be at least {}, got {}",
                BASE_VOCAB.len(),
                spec.vocab_size
            ),
        });
    }
    std::fs::create_dir_all(dir)
        .map_err(|e| ModelportError::io("creating synthetic model dir", dir, e))?;

    let config = json!({
        "model_type": spec.model_type,
        "architectures": [format!("{}Model", capitalize(&spec.model_type))],
        "hidden_size": spec.hidden_size,
        "num_hidden_layers": spec.num_hidden_layers,
        "vocab_size": spec.vocab_size,
        "max_position_embeddings": 128,
    });
    write_json(&dir.join("config.json"), &config)?;

    let mut vocab = serde_json::Map::new();
    for (id, word) in BASE_VOCAB.iter().enumerate() {
        vocab.insert((*word).to_string(), json!(id));
    }
    for id in BASE_VOCAB.len()..spec.vocab_size {
        vocab.insert(format!("tok{id}"), json!(id));
    }

    let tokenizer = json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [],
        "normalizer": { "type": "Lowercase" },
        "pre_tokenizer": { "type": "Whitespace" },
        "post_processor": null,
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": vocab,
            "unk_token": "<unk>",
        },
    });
    write_json(&dir.join("tokenizer.json"), &tokenizer)?;

    Ok(())
}

fn write_json(path: &Path, value: &serde_json::Value) -> Result<()> {
    let raw = serde_json::to_string_pretty(value)?;
    std::fs::write(path, raw).map_err(|e| ModelportError::io("writing synthetic model file", path, e))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_writes_both_files() {
        let dir = TempDir::new().unwrap();
        write_test_model(dir.path(), &SyntheticSpec::default()).unwrap();
        assert!(dir.path().join("config.json").is_file());
        assert!(dir.path().join("tokenizer.json").is_file());
    }

    #[test]
    fn test_rejects_tiny_vocab() {
        let dir = TempDir::new().unwrap();
        let spec = SyntheticSpec {
            vocab_size: 2,
            ..SyntheticSpec::default()
        };
        assert!(write_test_model(dir.path(), &spec).is_err());
    }

    #[test]
    fn test_tokenizer_loads_and_covers_prompt() {
        let dir = TempDir::new().unwrap();
        write_test_model(dir.path(), &SyntheticSpec::default()).unwrap();

        let tokenizer = tokenizers::Tokenizer::from_file(dir.path().join("tokenizer.json")).unwrap();
        let encoding = tokenizer.encode("Hello, how are you?", false).unwrap();
        assert!(!encoding.get_ids().is_empty());
        // Every id fits the default vocab.
        assert!(encoding.get_ids().iter().all(|&id| (id as usize) < 32));
    }
}
