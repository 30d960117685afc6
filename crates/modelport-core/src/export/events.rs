//! Progress events emitted while a conversion runs.

use std::path::PathBuf;
use std::sync::Mutex;

use tracing::{info, warn};

use super::artifact::ArtifactRole;
use super::strategy::StrategyId;
use super::ExportFidelity;

/// One observable step of a conversion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportEvent {
    /// A model was loaded from the given directory.
    ModelLoaded { path: PathBuf, architecture: String },
    /// A strategy attempt is starting.
    StrategyStarted { strategy: StrategyId },
    /// The attempt produced artifacts in the working directory.
    StrategySucceeded { strategy: StrategyId, files: Vec<PathBuf> },
    /// The attempt failed; the run moves on to the next strategy.
    StrategyFailed { strategy: StrategyId, message: String },
    /// A lower-fidelity strategy won after a higher one failed.
    Degraded { fidelity: ExportFidelity },
    /// One produced file was accounted for during resolution.
    ArtifactResolved {
        path: PathBuf,
        role: ArtifactRole,
        size: u64,
    },
    /// The primary artifact reached its destination.
    ArtifactPromoted { from: PathBuf, to: PathBuf },
}

/// Receives conversion progress. Implementations must tolerate being called
/// once per event in strategy-priority order.
pub trait EventSink {
    fn emit(&self, event: ExportEvent);
}

/// Forwards events to the `tracing` subscriber.
#[derive(Debug, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: ExportEvent) {
        match event {
            ExportEvent::ModelLoaded { path, architecture } => {
                info!(path = %path.display(), architecture = %architecture, "model loaded");
            }
            ExportEvent::StrategyStarted { strategy } => {
                info!(strategy = %strategy, "export attempt started");
            }
            ExportEvent::StrategySucceeded { strategy, files } => {
                info!(strategy = %strategy, files = files.len(), "export attempt succeeded");
            }
            ExportEvent::StrategyFailed { strategy, message } => {
                warn!(strategy = %strategy, error = %message, "export attempt failed, falling back");
            }
            ExportEvent::Degraded { fidelity } => {
                warn!(fidelity = %fidelity, "conversion succeeded at reduced fidelity");
            }
            ExportEvent::ArtifactResolved { path, role, size } => {
                info!(path = %path.display(), role = ?role, size, "artifact resolved");
            }
            ExportEvent::ArtifactPromoted { from, to } => {
                info!(from = %from.display(), to = %to.display(), "primary artifact promoted");
            }
        }
    }
}

/// Buffers events for inspection. Test-oriented but kept in the public API so
/// embedders can assert on run shape.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<ExportEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ExportEvent> {
        self.events.lock().expect("event sink lock poisoned").clone()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: ExportEvent) {
        self.events.lock().expect("event sink lock poisoned").push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_preserves_order() {
        let sink = MemorySink::new();
        sink.emit(ExportEvent::StrategyStarted {
            strategy: StrategyId::HighLevel,
        });
        sink.emit(ExportEvent::StrategyFailed {
            strategy: StrategyId::HighLevel,
            message: "boom".into(),
        });
        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            ExportEvent::StrategyStarted {
                strategy: StrategyId::HighLevel
            }
        );
    }
}
