//! Conversion configuration and shared default constants.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

/// Axis index -> symbolic name, e.g. `{0: "batch_size", 1: "sequence_length"}`.
pub type AxisMap = BTreeMap<usize, String>;

/// Defaults shared by the conversion entry points.
pub struct ExportDefaults;

impl ExportDefaults {
    /// Operator-set version declared on produced artifacts.
    pub const OPSET: u32 = 14;
    /// Example-input ceiling for the full forward pass.
    pub const MAX_SEQUENCE_LENGTH: usize = 128;
    /// Example-input ceiling for the reduced forward pass.
    pub const REDUCED_SEQUENCE_LENGTH: usize = 4;
    /// Example-input ceiling for the embedding-only trace.
    pub const EMBEDDING_SEQUENCE_LENGTH: usize = 8;
    /// Operator-set version forced by the embedding-only fallback.
    pub const EMBEDDING_OPSET: u32 = 11;
    /// File extension of produced graph artifacts.
    pub const GRAPH_EXTENSION: &'static str = "graph";
    /// Task hint assumed when the model source does not carry one.
    pub const TASK: &'static str = "text-generation";
    /// Example prompt traced through the full forward pass.
    pub const EXAMPLE_PROMPT: &'static str = "Hello, how are you?";
    /// Example prompt for the short-sequence wrappers.
    pub const SHORT_PROMPT: &'static str = "Hello";
}

/// Immutable per-run export configuration.
#[derive(Debug, Clone, Serialize)]
pub struct ExportConfig {
    /// Destination path of the primary artifact.
    pub output: PathBuf,
    /// Operator-set version passed to the trace backend.
    pub opset: u32,
    /// Maximum example-input sequence length.
    pub max_length: usize,
    /// Named input/output -> dynamic axis specification.
    pub dynamic_axes: BTreeMap<String, AxisMap>,
    /// Replace an existing regular file at the destination.
    pub overwrite: bool,
}

impl ExportConfig {
    /// Configuration with spec defaults for the given destination.
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            opset: ExportDefaults::OPSET,
            max_length: ExportDefaults::MAX_SEQUENCE_LENGTH,
            dynamic_axes: default_dynamic_axes("input_ids", "last_hidden_state"),
            overwrite: false,
        }
    }

    #[must_use]
    pub fn opset(mut self, opset: u32) -> Self {
        self.opset = opset;
        self
    }

    #[must_use]
    pub fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    #[must_use]
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Working directory the strategies export into, sibling of the
    /// destination. Secondary artifacts stay here after promotion.
    pub fn working_dir(&self) -> PathBuf {
        self.output.with_extension("artifacts")
    }
}

/// Batch and sequence axes marked dynamic for one input and one output name.
pub fn default_dynamic_axes(input: &str, output: &str) -> BTreeMap<String, AxisMap> {
    let mut axes = BTreeMap::new();
    let mut per_tensor = AxisMap::new();
    per_tensor.insert(0, "batch_size".to_string());
    per_tensor.insert(1, "sequence_length".to_string());
    axes.insert(input.to_string(), per_tensor.clone());
    axes.insert(output.to_string(), per_tensor);
    axes
}
