//! The export engine: wrapper variants, the strategy chain, artifact
//! resolution and the orchestrating fallback loop.

pub mod artifact;
pub mod events;
pub mod orchestrator;
pub mod strategy;
pub mod wrapper;

use serde::Serialize;

pub use artifact::{Artifact, ArtifactRole, ResolvedArtifacts};
pub use events::{EventSink, ExportEvent, LogSink, MemorySink};
pub use orchestrator::{
    convert, convert_logged, AttemptOutcome, ConversionOutcome, ExportAttempt, ExportOrchestrator,
    REPORT_FILE,
};
pub use strategy::{
    default_strategies, DirectTraceExport, EmbeddingOnlyExport, ExportStrategy, HighLevelExport,
    NativeExport, StrategyCapabilities, StrategyId, NATIVE_SUPPORTED_ARCHITECTURES,
};
pub use wrapper::{ExportWrapper, WrapperKind};

/// Fidelity delivered by the winning strategy. Anything below `Full` means
/// the run degraded through the fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportFidelity {
    Full,
    Reduced,
    EmbeddingOnly,
}

impl ExportFidelity {
    pub fn is_degraded(self) -> bool {
        self != ExportFidelity::Full
    }
}

impl std::fmt::Display for ExportFidelity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ExportFidelity::Full => "full",
            ExportFidelity::Reduced => "reduced",
            ExportFidelity::EmbeddingOnly => "embedding-only",
        };
        f.write_str(name)
    }
}
