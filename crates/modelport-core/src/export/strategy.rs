//! The ordered export strategy chain.
//!
//! Four tiers, tried highest-fidelity first. Each tier pairs a wrapper
//! variant with trace parameters and writes its artifacts into the run's
//! working directory; the orchestrator owns ordering and fallback.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::config::{ExportConfig, ExportDefaults};
use crate::error::{ModelportError, Result};
use crate::model::LoadedModel;
use crate::ops::OpTable;
use crate::tensor::Tensor;
use crate::trace::{TraceBackend, TraceOptions};

use super::wrapper::{ExportWrapper, WrapperKind};
use super::ExportFidelity;

/// Architectures the native tier knows how to export.
pub const NATIVE_SUPPORTED_ARCHITECTURES: [&str; 4] = ["qwen2", "llama", "mistral", "gpt2"];

/// Task hints the high-level tier understands.
pub const HIGH_LEVEL_SUPPORTED_TASKS: [&str; 1] = ["text-generation"];

/// Stable identifier of one export tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyId {
    HighLevel,
    Native,
    DirectTrace,
    EmbeddingOnly,
}

impl StrategyId {
    /// What a success at this tier delivers.
    pub fn fidelity(self) -> ExportFidelity {
        match self {
            StrategyId::HighLevel | StrategyId::Native => ExportFidelity::Full,
            StrategyId::DirectTrace => ExportFidelity::Reduced,
            StrategyId::EmbeddingOnly => ExportFidelity::EmbeddingOnly,
        }
    }
}

impl std::fmt::Display for StrategyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StrategyId::HighLevel => "high-level",
            StrategyId::Native => "native",
            StrategyId::DirectTrace => "direct-trace",
            StrategyId::EmbeddingOnly => "embedding-only",
        };
        f.write_str(name)
    }
}

/// What a tier supports, surfaced in the run report.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct StrategyCapabilities {
    pub dynamic_axes: bool,
    pub kv_cache: bool,
    pub requires_config: bool,
}

/// One export tier. `export` writes artifacts into `working_dir` and returns
/// the paths it produced; any error return means the tier produced nothing
/// usable and the next tier should run.
pub trait ExportStrategy {
    fn id(&self) -> StrategyId;
    fn capabilities(&self) -> StrategyCapabilities;
    fn wrapper_kind(&self) -> WrapperKind;

    fn export(
        &self,
        loaded: &LoadedModel,
        ops: &OpTable,
        config: &ExportConfig,
        working_dir: &Path,
    ) -> Result<Vec<PathBuf>>;
}

fn example_tensor(loaded: &LoadedModel, kind: WrapperKind, config: &ExportConfig) -> Result<Tensor> {
    let ids = loaded.example_ids(kind.example_prompt(), kind.example_len(config))?;
    Ok(Tensor::from_ids(&ids))
}

fn trace_options(
    kind: WrapperKind,
    opset: u32,
    config: &ExportConfig,
    dynamic_axes: bool,
) -> TraceOptions {
    TraceOptions {
        opset,
        input_name: "input_ids".to_string(),
        output_name: kind.output_name().to_string(),
        dynamic_axes: if dynamic_axes {
            config.dynamic_axes.clone()
        } else {
            Default::default()
        },
    }
}

/// Tier 1: the managed exporter path. Produces a cache-free decoder graph
/// and a with-past companion, mirroring what downstream runtimes expect from
/// a text-generation export.
pub struct HighLevelExport {
    backend: Arc<dyn TraceBackend>,
}

impl HighLevelExport {
    pub fn new(backend: Arc<dyn TraceBackend>) -> Self {
        Self { backend }
    }
}

impl ExportStrategy for HighLevelExport {
    fn id(&self) -> StrategyId {
        StrategyId::HighLevel
    }

    fn capabilities(&self) -> StrategyCapabilities {
        StrategyCapabilities {
            dynamic_axes: true,
            kv_cache: true,
            requires_config: false,
        }
    }

    fn wrapper_kind(&self) -> WrapperKind {
        WrapperKind::Full
    }

    fn export(
        &self,
        loaded: &LoadedModel,
        ops: &OpTable,
        config: &ExportConfig,
        working_dir: &Path,
    ) -> Result<Vec<PathBuf>> {
        if !HIGH_LEVEL_SUPPORTED_TASKS.contains(&loaded.task.as_str()) {
            return Err(ModelportError::strategy(
                StrategyId::HighLevel,
                format!("task '{}' is not supported by the high-level exporter", loaded.task),
            ));
        }

        let example = example_tensor(loaded, WrapperKind::Full, config)?;

        // Cache-free decoder first, then the with-past variant.
        let no_cache = working_dir.join("decoder_model.graph");
        let wrapper = ExportWrapper::new(&loaded.model, WrapperKind::Reduced);
        let options = trace_options(WrapperKind::Reduced, config.opset, config, true);
        self.backend.trace(&wrapper, ops, &example, &options, &no_cache)?;

        let with_past = working_dir.join("decoder_with_past_model.graph");
        let wrapper = ExportWrapper::new(&loaded.model, WrapperKind::Full);
        let options = trace_options(WrapperKind::Full, config.opset, config, true);
        self.backend.trace(&wrapper, ops, &example, &options, &with_past)?;

        Ok(vec![no_cache, with_past])
    }
}

/// Tier 2: the framework-native exporter path, gated on an architecture
/// support list read from the model config.
pub struct NativeExport {
    backend: Arc<dyn TraceBackend>,
}

impl NativeExport {
    pub fn new(backend: Arc<dyn TraceBackend>) -> Self {
        Self { backend }
    }
}

impl ExportStrategy for NativeExport {
    fn id(&self) -> StrategyId {
        StrategyId::Native
    }

    fn capabilities(&self) -> StrategyCapabilities {
        StrategyCapabilities {
            dynamic_axes: true,
            kv_cache: true,
            requires_config: true,
        }
    }

    fn wrapper_kind(&self) -> WrapperKind {
        WrapperKind::Full
    }

    fn export(
        &self,
        loaded: &LoadedModel,
        ops: &OpTable,
        config: &ExportConfig,
        working_dir: &Path,
    ) -> Result<Vec<PathBuf>> {
        let arch = loaded.config.architecture();
        if !NATIVE_SUPPORTED_ARCHITECTURES.contains(&arch) {
            return Err(ModelportError::UnsupportedArchitecture {
                arch: arch.to_string(),
            });
        }
        debug!(architecture = %arch, "architecture accepted by native exporter");

        let example = example_tensor(loaded, WrapperKind::Full, config)?;
        let output = working_dir.join("model.graph");
        let wrapper = ExportWrapper::new(&loaded.model, WrapperKind::Full);
        let options = trace_options(WrapperKind::Full, config.opset, config, true);
        self.backend.trace(&wrapper, ops, &example, &options, &output)?;
        Ok(vec![output])
    }
}

/// Tier 3: direct trace of a reduced forward pass. Caching disabled, short
/// example input, explicit axes.
pub struct DirectTraceExport {
    backend: Arc<dyn TraceBackend>,
}

impl DirectTraceExport {
    pub fn new(backend: Arc<dyn TraceBackend>) -> Self {
        Self { backend }
    }
}

impl ExportStrategy for DirectTraceExport {
    fn id(&self) -> StrategyId {
        StrategyId::DirectTrace
    }

    fn capabilities(&self) -> StrategyCapabilities {
        StrategyCapabilities {
            dynamic_axes: true,
            kv_cache: false,
            requires_config: false,
        }
    }

    fn wrapper_kind(&self) -> WrapperKind {
        WrapperKind::Reduced
    }

    fn export(
        &self,
        loaded: &LoadedModel,
        ops: &OpTable,
        config: &ExportConfig,
        working_dir: &Path,
    ) -> Result<Vec<PathBuf>> {
        let example = example_tensor(loaded, WrapperKind::Reduced, config)?;
        let output = working_dir.join("model.graph");
        let wrapper = ExportWrapper::new(&loaded.model, WrapperKind::Reduced);
        let options = trace_options(WrapperKind::Reduced, config.opset, config, true);
        self.backend.trace(&wrapper, ops, &example, &options, &output)?;
        Ok(vec![output])
    }
}

/// Tier 4: embedding-only last resort. Pinned to a low operator-set version
/// so it survives backends that reject everything newer.
pub struct EmbeddingOnlyExport {
    backend: Arc<dyn TraceBackend>,
}

impl EmbeddingOnlyExport {
    pub fn new(backend: Arc<dyn TraceBackend>) -> Self {
        Self { backend }
    }
}

impl ExportStrategy for EmbeddingOnlyExport {
    fn id(&self) -> StrategyId {
        StrategyId::EmbeddingOnly
    }

    fn capabilities(&self) -> StrategyCapabilities {
        StrategyCapabilities {
            dynamic_axes: false,
            kv_cache: false,
            requires_config: false,
        }
    }

    fn wrapper_kind(&self) -> WrapperKind {
        WrapperKind::EmbeddingOnly
    }

    fn export(
        &self,
        loaded: &LoadedModel,
        ops: &OpTable,
        config: &ExportConfig,
        working_dir: &Path,
    ) -> Result<Vec<PathBuf>> {
        let example = example_tensor(loaded, WrapperKind::EmbeddingOnly, config)?;
        let output = working_dir.join("model_embedding.graph");
        let wrapper = ExportWrapper::new(&loaded.model, WrapperKind::EmbeddingOnly);
        let options = trace_options(
            WrapperKind::EmbeddingOnly,
            ExportDefaults::EMBEDDING_OPSET,
            config,
            false,
        );
        self.backend.trace(&wrapper, ops, &example, &options, &output)?;
        Ok(vec![output])
    }
}

/// The full chain in priority order, all sharing one trace backend.
pub fn default_strategies(backend: Arc<dyn TraceBackend>) -> Vec<Box<dyn ExportStrategy>> {
    vec![
        Box::new(HighLevelExport::new(backend.clone())),
        Box::new(NativeExport::new(backend.clone())),
        Box::new(DirectTraceExport::new(backend.clone())),
        Box::new(EmbeddingOnlyExport::new(backend)),
    ]
}
