//! End-to-end conversion tests over a synthetic model directory, plus
//! fallback-loop behavior with scripted strategy chains.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use modelport::export::artifact::ArtifactRole;
use modelport::export::orchestrator::AttemptOutcome;
use modelport::export::strategy::{ExportStrategy, StrategyCapabilities};
use modelport::export::ExportFidelity;
use modelport::ops::OpTable;
use modelport::{
    convert, standard_patches, ExportConfig, ExportEvent, LoadedModel, MemorySink, ModelLoader,
    ModelSource, ModelportError, PatchRegistry, StrategyId, SyntheticSpec, WrapperKind,
};

fn synthetic_model(dir: &Path, model_type: &str) -> ModelSource {
    let spec = SyntheticSpec {
        model_type: model_type.to_string(),
        ..SyntheticSpec::default()
    };
    modelport::write_test_model(dir, &spec).unwrap();
    ModelSource::new(dir)
}

fn load(source: &ModelSource) -> LoadedModel {
    ModelLoader::new().load(source).unwrap()
}

fn patched_table() -> OpTable {
    let mut table = OpTable::builtin();
    let mut registry = PatchRegistry::new();
    for spec in standard_patches() {
        registry.apply(&mut table, &spec);
    }
    table
}

#[test]
fn test_convert_synthetic_model_end_to_end() {
    let tmp = TempDir::new().unwrap();
    let source = synthetic_model(&tmp.path().join("model"), "qwen2");
    let config = ExportConfig::new(tmp.path().join("out/model.graph")).max_length(4);

    let sink = MemorySink::new();
    let outcome = convert(&source, &config, &sink).unwrap();

    // First tier wins at default opset.
    assert_eq!(outcome.strategy, StrategyId::HighLevel);
    assert_eq!(outcome.fidelity, ExportFidelity::Full);
    assert_eq!(outcome.attempts.len(), 1);
    assert!(outcome.attempts[0].succeeded());

    // Primary promoted to the destination, digest recorded.
    let primary = &outcome.artifacts.primary;
    assert_eq!(primary.path, config.output);
    assert_eq!(primary.role, ArtifactRole::Primary);
    assert!(primary.sha256.is_some());
    assert!(primary.size > 0);

    // The with-past companion stays in the working directory.
    assert_eq!(outcome.artifacts.secondaries.len(), 1);
    let secondary = &outcome.artifacts.secondaries[0];
    assert!(secondary.path.starts_with(config.working_dir()));
    assert!(secondary.path.ends_with("decoder_with_past_model.graph"));
    assert!(secondary.path.is_file());

    // Run report sits next to the artifacts and parses as JSON.
    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&outcome.report).unwrap()).unwrap();
    assert_eq!(report["status"], "complete");
    assert_eq!(report["strategy"], "high_level");
    assert_eq!(report["architecture"], "qwen2");
    assert_eq!(report["task"], "text-generation");
    assert_eq!(report["capabilities"]["dynamic_axes"], true);
    assert_eq!(report["capabilities"]["kv_cache"], true);
    assert_eq!(report["capabilities"]["requires_config"], false);

    let events = sink.events();
    assert!(matches!(events[0], ExportEvent::ModelLoaded { .. }));
    assert!(events
        .iter()
        .all(|e| !matches!(e, ExportEvent::Degraded { .. })));
}

#[test]
fn test_low_opset_degrades_to_embedding_only() {
    let tmp = TempDir::new().unwrap();
    let source = synthetic_model(&tmp.path().join("model"), "qwen2");
    let config = ExportConfig::new(tmp.path().join("out.graph"))
        .opset(11)
        .max_length(4);

    let sink = MemorySink::new();
    let outcome = convert(&source, &config, &sink).unwrap();

    // silu needs opset 14, so every forward-pass tier fails and the
    // embedding-only fallback wins.
    assert_eq!(outcome.strategy, StrategyId::EmbeddingOnly);
    assert_eq!(outcome.fidelity, ExportFidelity::EmbeddingOnly);
    assert!(outcome.fidelity.is_degraded());
    assert_eq!(outcome.attempts.len(), 4);
    for attempt in &outcome.attempts[..3] {
        assert!(!attempt.succeeded());
    }
    assert_eq!(outcome.attempts[3].wrapper, WrapperKind::EmbeddingOnly);

    assert!(sink
        .events()
        .iter()
        .any(|e| matches!(e, ExportEvent::Degraded { fidelity: ExportFidelity::EmbeddingOnly })));
    assert!(config.output.is_file());
}

#[test]
fn test_load_failure_attempts_no_strategy() {
    let tmp = TempDir::new().unwrap();
    let source = ModelSource::new(tmp.path().join("does-not-exist"));
    let config = ExportConfig::new(tmp.path().join("out.graph"));

    let sink = MemorySink::new();
    let err = convert(&source, &config, &sink).unwrap_err();
    assert!(matches!(err, ModelportError::Load { .. }));
    assert!(sink
        .events()
        .iter()
        .all(|e| !matches!(e, ExportEvent::StrategyStarted { .. })));
}

#[test]
fn test_destination_collision_is_terminal() {
    let tmp = TempDir::new().unwrap();
    let source = synthetic_model(&tmp.path().join("model"), "qwen2");
    let dest = tmp.path().join("out.graph");
    fs::write(&dest, "occupied").unwrap();

    let config = ExportConfig::new(&dest).max_length(4);
    let err = convert(&source, &config, &MemorySink::new()).unwrap_err();
    assert!(matches!(err, ModelportError::ArtifactCollision { .. }));
    assert_eq!(fs::read_to_string(&dest).unwrap(), "occupied");

    // The aborted run still reports the strategy that had succeeded before
    // finalization failed.
    let report_path = config.working_dir().join("export_report.json");
    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(report["status"], "aborted");
    assert_eq!(report["strategy"], "high_level");
    assert!(report["attempts"][0]["outcome"]["success"].is_object());
    assert!(report["fidelity"].is_null());

    // --force equivalent: overwrite allows the same run to finish.
    let outcome = convert(&source, &config.overwrite(true), &MemorySink::new()).unwrap();
    assert_eq!(outcome.strategy, StrategyId::HighLevel);
    assert_ne!(fs::read_to_string(&dest).unwrap(), "occupied");
}

// Scripted strategies for fallback-loop tests.

enum Script {
    Fail,
    Succeed,
    SucceedWithoutFiles,
}

struct ScriptedStrategy {
    id: StrategyId,
    script: Script,
}

impl ScriptedStrategy {
    fn new(id: StrategyId, script: Script) -> Box<dyn ExportStrategy> {
        Box::new(Self { id, script })
    }
}

impl ExportStrategy for ScriptedStrategy {
    fn id(&self) -> StrategyId {
        self.id
    }

    fn capabilities(&self) -> StrategyCapabilities {
        StrategyCapabilities {
            dynamic_axes: false,
            kv_cache: false,
            requires_config: false,
        }
    }

    fn wrapper_kind(&self) -> WrapperKind {
        WrapperKind::Reduced
    }

    fn export(
        &self,
        _loaded: &LoadedModel,
        _ops: &OpTable,
        _config: &ExportConfig,
        working_dir: &Path,
    ) -> modelport::Result<Vec<PathBuf>> {
        match self.script {
            Script::Fail => Err(ModelportError::strategy(self.id, "scripted failure")),
            Script::Succeed => {
                let path = working_dir.join("model.graph");
                fs::write(&path, format!("{}", self.id)).unwrap();
                Ok(vec![path])
            }
            Script::SucceedWithoutFiles => Ok(vec![]),
        }
    }
}

#[test]
fn test_fallback_stops_at_first_success() {
    let tmp = TempDir::new().unwrap();
    let source = synthetic_model(&tmp.path().join("model"), "qwen2");
    let loaded = load(&source);
    let config = ExportConfig::new(tmp.path().join("out.graph"));

    let orchestrator = modelport::ExportOrchestrator::new(vec![
        ScriptedStrategy::new(StrategyId::HighLevel, Script::Fail),
        ScriptedStrategy::new(StrategyId::Native, Script::Fail),
        ScriptedStrategy::new(StrategyId::DirectTrace, Script::Succeed),
        ScriptedStrategy::new(StrategyId::EmbeddingOnly, Script::Succeed),
    ]);
    let outcome = orchestrator
        .run(&loaded, &patched_table(), &config, &MemorySink::new())
        .unwrap();

    // Third tier wins; the fourth never runs.
    assert_eq!(outcome.strategy, StrategyId::DirectTrace);
    assert_eq!(outcome.attempts.len(), 3);
    assert!(matches!(outcome.attempts[0].outcome, AttemptOutcome::Failure { .. }));
    assert!(matches!(outcome.attempts[1].outcome, AttemptOutcome::Failure { .. }));
    assert!(outcome.attempts[2].succeeded());
    assert_eq!(fs::read_to_string(&config.output).unwrap(), "direct-trace");
}

#[test]
fn test_exhaustion_keeps_ordered_attempt_history() {
    let tmp = TempDir::new().unwrap();
    let source = synthetic_model(&tmp.path().join("model"), "qwen2");
    let loaded = load(&source);
    let config = ExportConfig::new(tmp.path().join("out.graph"));

    let orchestrator = modelport::ExportOrchestrator::new(vec![
        ScriptedStrategy::new(StrategyId::HighLevel, Script::Fail),
        ScriptedStrategy::new(StrategyId::Native, Script::Fail),
        ScriptedStrategy::new(StrategyId::EmbeddingOnly, Script::Fail),
    ]);
    let err = orchestrator
        .run(&loaded, &patched_table(), &config, &MemorySink::new())
        .unwrap_err();

    match err {
        ModelportError::AllStrategiesFailed { attempts } => {
            let order: Vec<StrategyId> = attempts.iter().map(|a| a.strategy).collect();
            assert_eq!(
                order,
                vec![StrategyId::HighLevel, StrategyId::Native, StrategyId::EmbeddingOnly]
            );
            assert!(attempts.iter().all(|a| !a.succeeded()));
        }
        other => panic!("expected exhaustion, got {other:?}"),
    }
    assert!(!config.output.exists());
}

#[test]
fn test_empty_success_downgrades_and_chain_continues() {
    let tmp = TempDir::new().unwrap();
    let source = synthetic_model(&tmp.path().join("model"), "qwen2");
    let loaded = load(&source);
    let config = ExportConfig::new(tmp.path().join("out.graph"));

    let sink = MemorySink::new();
    let orchestrator = modelport::ExportOrchestrator::new(vec![
        ScriptedStrategy::new(StrategyId::HighLevel, Script::SucceedWithoutFiles),
        ScriptedStrategy::new(StrategyId::DirectTrace, Script::Succeed),
    ]);
    let outcome = orchestrator
        .run(&loaded, &patched_table(), &config, &sink)
        .unwrap();

    // A strategy that claims success but writes nothing is recorded as a
    // failure and the chain moves on.
    assert_eq!(outcome.strategy, StrategyId::DirectTrace);
    assert_eq!(outcome.attempts.len(), 2);
    match &outcome.attempts[0].outcome {
        AttemptOutcome::Failure { error } => assert!(error.contains("No graph artifact")),
        other => panic!("expected downgraded failure, got {other:?}"),
    }
    assert!(sink.events().iter().any(|e| matches!(
        e,
        ExportEvent::StrategyFailed {
            strategy: StrategyId::HighLevel,
            ..
        }
    )));
}

#[test]
fn test_unknown_architecture_skips_native_tier() {
    let tmp = TempDir::new().unwrap();
    let source = synthetic_model(&tmp.path().join("model"), "bloom");
    let loaded = load(&source);
    let config = ExportConfig::new(tmp.path().join("out.graph"));

    let orchestrator = modelport::ExportOrchestrator::new(vec![Box::new(
        modelport::export::strategy::NativeExport::new(std::sync::Arc::new(
            modelport::GraphRecorder::new(),
        )),
    )]);
    let err = orchestrator
        .run(&loaded, &patched_table(), &config, &MemorySink::new())
        .unwrap_err();
    match err {
        ModelportError::AllStrategiesFailed { attempts } => match &attempts[0].outcome {
            AttemptOutcome::Failure { error } => assert!(error.contains("bloom")),
            other => panic!("expected architecture failure, got {other:?}"),
        },
        other => panic!("expected exhaustion, got {other:?}"),
    }
}
