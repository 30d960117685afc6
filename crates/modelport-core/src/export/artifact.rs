//! Locating exported graph files and promoting the primary to its
//! destination.
//!
//! Strategies write into the run's working directory under names of their own
//! choosing. Resolution scans that directory, picks the primary by a fixed
//! name preference, copies it to the configured destination and reports any
//! remaining files as secondaries in place.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::config::{ExportConfig, ExportDefaults};
use crate::error::{ModelportError, Result};

/// Substrings tried in order when more than one graph file was produced.
const PRIMARY_NAME_PREFERENCE: [&str; 2] = ["decoder_model", "model"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactRole {
    /// The file promoted to the configured destination.
    Primary,
    /// Companion output left in the working directory.
    Secondary,
}

/// One file produced by a conversion run.
#[derive(Debug, Clone, Serialize)]
pub struct Artifact {
    pub path: PathBuf,
    pub size: u64,
    pub role: ArtifactRole,
    /// Hex SHA-256 digest; computed for the primary only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

/// Outcome of artifact resolution: exactly one primary, zero or more
/// secondaries still in the working directory.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedArtifacts {
    pub primary: Artifact,
    pub secondaries: Vec<Artifact>,
}

/// Graph files in `dir`, sorted by file name so resolution is deterministic
/// regardless of readdir order.
pub fn list_graph_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir)
        .map_err(|e| ModelportError::io("reading working directory", dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ModelportError::io("reading working directory", dir, e))?;
        let path = entry.path();
        let is_graph = path
            .extension()
            .is_some_and(|ext| ext == ExportDefaults::GRAPH_EXTENSION);
        if path.is_file() && is_graph {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Index of the primary among sorted candidates: first file whose name
/// contains a preferred substring, otherwise the first file.
fn pick_primary(candidates: &[PathBuf]) -> usize {
    for needle in PRIMARY_NAME_PREFERENCE {
        let hit = candidates.iter().position(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.contains(needle))
        });
        if let Some(index) = hit {
            return index;
        }
    }
    0
}

fn file_size(path: &Path) -> Result<u64> {
    let meta =
        fs::metadata(path).map_err(|e| ModelportError::io("reading artifact metadata", path, e))?;
    Ok(meta.len())
}

/// Hex SHA-256 of a file's contents.
pub fn sha256_file(path: &Path) -> Result<String> {
    let bytes = fs::read(path).map_err(|e| ModelportError::io("digesting artifact", path, e))?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Scan the working directory, promote the primary graph file to
/// `config.output` and describe every produced file.
///
/// Fails with `ArtifactNotFound` when the strategy claimed success but wrote
/// no graph files, and with `ArtifactCollision` when the destination exists
/// and overwriting was not requested. A destination directory is a collision
/// even with overwrite enabled.
pub fn resolve(working_dir: &Path, config: &ExportConfig) -> Result<ResolvedArtifacts> {
    let candidates = list_graph_files(working_dir)?;
    if candidates.is_empty() {
        return Err(ModelportError::ArtifactNotFound {
            dir: working_dir.to_path_buf(),
        });
    }

    let primary_index = pick_primary(&candidates);
    let source = &candidates[primary_index];
    debug!(
        candidates = candidates.len(),
        primary = %source.display(),
        "resolved primary artifact"
    );

    let dest = &config.output;
    if dest.is_dir() || (dest.exists() && !config.overwrite) {
        return Err(ModelportError::ArtifactCollision { path: dest.clone() });
    }
    if let Some(parent) = dest.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| ModelportError::io("creating destination directory", parent, e))?;
        }
    }
    fs::copy(source, dest).map_err(|e| ModelportError::io("promoting primary artifact", dest, e))?;

    let primary = Artifact {
        size: file_size(dest)?,
        sha256: Some(sha256_file(dest)?),
        path: dest.clone(),
        role: ArtifactRole::Primary,
    };
    let secondaries = candidates
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != primary_index)
        .map(|(_, path)| {
            Ok(Artifact {
                size: file_size(path)?,
                sha256: None,
                path: path.clone(),
                role: ArtifactRole::Secondary,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ResolvedArtifacts { primary, secondaries })
}
