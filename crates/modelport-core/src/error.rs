//! Error types for modelport.
//!
//! Only `Load` is terminal for a conversion run: every strategy-level failure
//! is absorbed by the orchestrator's fallback loop, and `AllStrategiesFailed`
//! carries the full ordered attempt history so callers can tell "nothing
//! worked" apart from "worked partially, couldn't finalize".

use std::path::PathBuf;
use thiserror::Error;

use crate::export::{ExportAttempt, StrategyId};

/// Main error type for modelport operations.
#[derive(Debug, Error)]
pub enum ModelportError {
    // Model loading errors (terminal — no strategy is attempted)
    #[error("Model load failed at {path}: {message}")]
    Load { path: PathBuf, message: String },

    // Capability patching errors
    #[error("Patch target '{target}' unavailable: {message}")]
    Patch { target: String, message: String },

    // Per-strategy errors (recovered locally by the fallback loop)
    #[error("Strategy '{strategy}' failed: {message}")]
    Strategy {
        strategy: StrategyId,
        message: String,
    },

    #[error("Operator '{name}' is not available in the operator table")]
    MissingOperator { name: String },

    #[error("Operator '{name}' requires operator-set version {required}, trace uses {requested}")]
    UnsupportedOperator {
        name: String,
        required: u32,
        requested: u32,
    },

    #[error("Architecture '{arch}' is not in the native export support list")]
    UnsupportedArchitecture { arch: String },

    // Artifact resolution errors
    #[error("No graph artifact found in {dir}")]
    ArtifactNotFound { dir: PathBuf },

    #[error("Destination {path} is already occupied; refusing to overwrite")]
    ArtifactCollision { path: PathBuf },

    // Run-level exhaustion: one recorded attempt per strategy tried
    #[error("All export strategies failed after {} attempt(s)", attempts.len())]
    AllStrategiesFailed { attempts: Vec<ExportAttempt> },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias for modelport operations.
pub type Result<T> = std::result::Result<T, ModelportError>;

// Conversion implementations for common error types

impl From<std::io::Error> for ModelportError {
    fn from(err: std::io::Error) -> Self {
        ModelportError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for ModelportError {
    fn from(err: serde_json::Error) -> Self {
        ModelportError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl ModelportError {
    /// Create an IO error with operation context and path.
    pub fn io(context: &str, path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        ModelportError::Io {
            message: format!("{context}: {err}"),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create a strategy error from any failure inside one export tier.
    pub fn strategy(strategy: StrategyId, err: impl std::fmt::Display) -> Self {
        ModelportError::Strategy {
            strategy,
            message: err.to_string(),
        }
    }

    /// True for errors the fallback loop absorbs instead of aborting the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ModelportError::Strategy { .. }
                | ModelportError::MissingOperator { .. }
                | ModelportError::UnsupportedOperator { .. }
                | ModelportError::UnsupportedArchitecture { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ModelportError::UnsupportedArchitecture {
            arch: "bloom".into(),
        };
        assert_eq!(
            err.to_string(),
            "Architecture 'bloom' is not in the native export support list"
        );
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(ModelportError::MissingOperator {
            name: "rms_norm".into()
        }
        .is_recoverable());
        assert!(!ModelportError::Load {
            path: PathBuf::from("models/missing"),
            message: "no config.json".into(),
        }
        .is_recoverable());
    }

    #[test]
    fn test_exhaustion_display_counts_attempts() {
        let err = ModelportError::AllStrategiesFailed { attempts: vec![] };
        assert_eq!(err.to_string(), "All export strategies failed after 0 attempt(s)");
    }
}
