//! Modelport - Headless library for converting pretrained transformer
//! language models into portable computation-graph artifacts.
//!
//! The engine loads a model directory, patches missing runtime primitives
//! into the operator table, then walks an ordered chain of export strategies
//! from highest fidelity (managed exporter with key/value caching) down to an
//! embedding-only last resort. The first strategy whose artifacts resolve
//! wins; the full attempt history is kept either way.
//!
//! # Example
//!
//! ```rust,ignore
//! use modelport::{convert_logged, ExportConfig, ModelSource};
//!
//! fn main() -> modelport::Result<()> {
//!     let source = ModelSource::new("models/qwen2-0.5b");
//!     let config = ExportConfig::new("out/model.graph");
//!
//!     let outcome = convert_logged(&source, &config)?;
//!     println!("exported via {} at {} fidelity", outcome.strategy, outcome.fidelity);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod ops;
pub mod tensor;
pub mod trace;

// Re-export commonly used types
pub use config::{default_dynamic_axes, AxisMap, ExportConfig, ExportDefaults};
pub use error::{ModelportError, Result};
pub use export::{
    convert, convert_logged, ConversionOutcome, EventSink, ExportEvent, ExportFidelity,
    ExportOrchestrator, LogSink, MemorySink, StrategyId, WrapperKind,
};
pub use model::{write_test_model, LoadedModel, ModelConfig, ModelLoader, ModelSource, SyntheticSpec};
pub use ops::patch::{standard_patches, PatchRegistry, PatchSpec};
pub use ops::{OpInvoker, OpTable};
pub use tensor::{Tensor, TensorData, TensorInfo};
pub use trace::{GraphRecorder, TraceBackend, TraceOptions, TracedGraph};
