//! Conversion run orchestration: the strategy fallback loop, the attempt
//! ledger and the run report.
//!
//! The orchestrator tries each strategy in priority order and stops at the
//! first one whose artifacts resolve. Strategy failures are absorbed into the
//! ledger and never abort the run; only load failures, artifact collisions
//! and exhaustion of the whole chain surface to the caller.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::ExportConfig;
use crate::error::{ModelportError, Result};
use crate::model::{LoadedModel, ModelLoader, ModelSource};
use crate::ops::patch::{standard_patches, verify_required, PatchRegistry};
use crate::ops::OpTable;
use crate::trace::GraphRecorder;

use super::artifact::{self, ResolvedArtifacts};
use super::events::{EventSink, ExportEvent, LogSink};
use super::strategy::{default_strategies, ExportStrategy, StrategyCapabilities, StrategyId};
use super::wrapper::WrapperKind;
use super::ExportFidelity;

/// Name of the run report written next to the artifacts.
pub const REPORT_FILE: &str = "export_report.json";

/// How one strategy attempt ended.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success { files: Vec<PathBuf> },
    Failure { error: String },
}

/// One entry of the attempt ledger, recorded in chain order.
#[derive(Debug, Clone, Serialize)]
pub struct ExportAttempt {
    pub strategy: StrategyId,
    pub wrapper: WrapperKind,
    pub at: DateTime<Utc>,
    pub outcome: AttemptOutcome,
}

impl ExportAttempt {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, AttemptOutcome::Success { .. })
    }
}

/// Result of a successful conversion run.
#[derive(Debug, Serialize)]
pub struct ConversionOutcome {
    pub strategy: StrategyId,
    pub fidelity: ExportFidelity,
    pub artifacts: ResolvedArtifacts,
    pub attempts: Vec<ExportAttempt>,
    pub report: PathBuf,
}

#[derive(Serialize)]
struct ExportReport<'a> {
    /// `complete` after a promoted primary, `aborted` when finalization
    /// failed after a strategy had already succeeded.
    status: &'static str,
    config: &'a ExportConfig,
    architecture: &'a str,
    task: &'a str,
    strategy: StrategyId,
    capabilities: StrategyCapabilities,
    #[serde(skip_serializing_if = "Option::is_none")]
    fidelity: Option<ExportFidelity>,
    attempts: &'a [ExportAttempt],
    #[serde(skip_serializing_if = "Option::is_none")]
    artifacts: Option<&'a ResolvedArtifacts>,
}

/// Drives an ordered strategy chain against one loaded model.
pub struct ExportOrchestrator {
    strategies: Vec<Box<dyn ExportStrategy>>,
}

impl ExportOrchestrator {
    pub fn new(strategies: Vec<Box<dyn ExportStrategy>>) -> Self {
        Self { strategies }
    }

    /// The bundled chain backed by the reference graph recorder.
    pub fn with_default_chain() -> Self {
        Self::new(default_strategies(Arc::new(GraphRecorder::new())))
    }

    /// Run the chain to the first strategy whose artifacts resolve.
    ///
    /// Unresolvable output (`ArtifactNotFound`) downgrades that strategy's
    /// success to a recorded failure and the chain continues. A collision at
    /// the destination aborts the run instead; retrying a lower tier could
    /// not make the destination writable.
    pub fn run(
        &self,
        loaded: &LoadedModel,
        ops: &OpTable,
        config: &ExportConfig,
        sink: &dyn EventSink,
    ) -> Result<ConversionOutcome> {
        let working_dir = config.working_dir();
        fs::create_dir_all(&working_dir)
            .map_err(|e| ModelportError::io("creating working directory", &working_dir, e))?;

        let mut attempts: Vec<ExportAttempt> = Vec::new();
        for strategy in &self.strategies {
            let id = strategy.id();
            sink.emit(ExportEvent::StrategyStarted { strategy: id });
            // Partial output of a failed earlier tier must not leak into this
            // tier's resolution.
            clear_graph_files(&working_dir)?;

            let produced = match strategy.export(loaded, ops, config, &working_dir) {
                Ok(files) => files,
                Err(err) => {
                    record_failure(&mut attempts, strategy.as_ref(), &err, sink);
                    continue;
                }
            };

            // The ledger entry precedes resolution, so an aborted finalize
            // still shows which strategy had already succeeded.
            attempts.push(ExportAttempt {
                strategy: id,
                wrapper: strategy.wrapper_kind(),
                at: Utc::now(),
                outcome: AttemptOutcome::Success {
                    files: produced.clone(),
                },
            });

            let resolved = match artifact::resolve(&working_dir, config) {
                Ok(resolved) => resolved,
                Err(err @ ModelportError::ArtifactNotFound { .. }) => {
                    // A success with no usable output is a failure.
                    attempts.pop();
                    record_failure(&mut attempts, strategy.as_ref(), &err, sink);
                    continue;
                }
                Err(err) => {
                    sink.emit(ExportEvent::StrategySucceeded {
                        strategy: id,
                        files: produced,
                    });
                    warn!(
                        strategy = %id,
                        error = %err,
                        "run aborted during artifact resolution after a successful strategy"
                    );
                    if let Err(report_err) = write_report(
                        &working_dir,
                        loaded,
                        config,
                        strategy.as_ref(),
                        None,
                        &attempts,
                        None,
                    ) {
                        warn!(error = %report_err, "failed to write aborted-run report");
                    }
                    return Err(err);
                }
            };

            sink.emit(ExportEvent::StrategySucceeded {
                strategy: id,
                files: produced,
            });
            for artifact in
                std::iter::once(&resolved.primary).chain(resolved.secondaries.iter())
            {
                sink.emit(ExportEvent::ArtifactResolved {
                    path: artifact.path.clone(),
                    role: artifact.role,
                    size: artifact.size,
                });
            }
            sink.emit(ExportEvent::ArtifactPromoted {
                from: working_dir.clone(),
                to: resolved.primary.path.clone(),
            });

            let fidelity = id.fidelity();
            if fidelity != ExportFidelity::Full {
                sink.emit(ExportEvent::Degraded { fidelity });
            }

            let report = write_report(
                &working_dir,
                loaded,
                config,
                strategy.as_ref(),
                Some(fidelity),
                &attempts,
                Some(&resolved),
            )?;
            info!(
                strategy = %id,
                fidelity = %fidelity,
                output = %resolved.primary.path.display(),
                "conversion finished"
            );
            return Ok(ConversionOutcome {
                strategy: id,
                fidelity,
                artifacts: resolved,
                attempts,
                report,
            });
        }

        warn!(attempts = attempts.len(), "export strategy chain exhausted");
        Err(ModelportError::AllStrategiesFailed { attempts })
    }
}

fn record_failure(
    attempts: &mut Vec<ExportAttempt>,
    strategy: &dyn ExportStrategy,
    err: &ModelportError,
    sink: &dyn EventSink,
) {
    attempts.push(ExportAttempt {
        strategy: strategy.id(),
        wrapper: strategy.wrapper_kind(),
        at: Utc::now(),
        outcome: AttemptOutcome::Failure {
            error: err.to_string(),
        },
    });
    sink.emit(ExportEvent::StrategyFailed {
        strategy: strategy.id(),
        message: err.to_string(),
    });
}

fn clear_graph_files(working_dir: &Path) -> Result<()> {
    for stale in artifact::list_graph_files(working_dir)? {
        fs::remove_file(&stale)
            .map_err(|e| ModelportError::io("clearing stale artifact", &stale, e))?;
    }
    Ok(())
}

fn write_report(
    working_dir: &Path,
    loaded: &LoadedModel,
    config: &ExportConfig,
    strategy: &dyn ExportStrategy,
    fidelity: Option<ExportFidelity>,
    attempts: &[ExportAttempt],
    artifacts: Option<&ResolvedArtifacts>,
) -> Result<PathBuf> {
    let report = ExportReport {
        status: if artifacts.is_some() { "complete" } else { "aborted" },
        config,
        architecture: loaded.config.architecture(),
        task: &loaded.task,
        strategy: strategy.id(),
        capabilities: strategy.capabilities(),
        fidelity,
        attempts,
        artifacts,
    };
    let path = working_dir.join(REPORT_FILE);
    let json = serde_json::to_vec_pretty(&report)?;
    fs::write(&path, json).map_err(|e| ModelportError::io("writing run report", &path, e))?;
    Ok(path)
}

/// Convert one model end to end: patch the operator table, load the model,
/// then run the default strategy chain. Patching happens strictly before the
/// model is touched.
pub fn convert(
    source: &ModelSource,
    config: &ExportConfig,
    sink: &dyn EventSink,
) -> Result<ConversionOutcome> {
    let mut table = OpTable::builtin();
    let mut registry = PatchRegistry::new();
    for spec in standard_patches() {
        registry.apply(&mut table, &spec);
    }
    verify_required(&table);

    let loaded = ModelLoader::new().load(source)?;
    sink.emit(ExportEvent::ModelLoaded {
        path: source.path.clone(),
        architecture: loaded.config.architecture().to_string(),
    });

    ExportOrchestrator::with_default_chain().run(&loaded, &table, config, sink)
}

/// `convert` with progress forwarded to the `tracing` subscriber.
pub fn convert_logged(source: &ModelSource, config: &ExportConfig) -> Result<ConversionOutcome> {
    convert(source, config, &LogSink)
}
