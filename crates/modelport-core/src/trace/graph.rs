//! Serialized graph artifact types.
//!
//! The bundled recorder emits a self-describing JSON container: declared
//! inputs/outputs, dynamic-axis names, and the recorded operation list. The
//! inference engine's own wire format is out of scope; this container is
//! what the reference backend produces.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::config::AxisMap;
use crate::error::{ModelportError, Result};
use crate::tensor::TensorInfo;

pub const GRAPH_FORMAT: &str = "modelport-graph";
pub const GRAPH_VERSION: u32 = 1;

/// One recorded operation.
#[derive(Debug, Clone, Serialize)]
pub struct GraphNode {
    pub name: String,
    pub op: String,
    pub input_shapes: Vec<Vec<usize>>,
    pub output_shape: Vec<usize>,
}

/// A complete traced computation graph.
#[derive(Debug, Serialize)]
pub struct TracedGraph {
    pub format: &'static str,
    pub version: u32,
    pub producer: String,
    pub opset: u32,
    pub inputs: Vec<TensorInfo>,
    pub outputs: Vec<TensorInfo>,
    pub dynamic_axes: BTreeMap<String, AxisMap>,
    pub nodes: Vec<GraphNode>,
}

impl TracedGraph {
    /// Serialize to `path`, returning the byte size written.
    pub fn write(&self, path: &Path) -> Result<u64> {
        let raw = serde_json::to_vec_pretty(self)?;
        std::fs::write(path, &raw)
            .map_err(|e| ModelportError::io("writing graph artifact", path, e))?;
        Ok(raw.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_produces_nonempty_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.graph");
        let graph = TracedGraph {
            format: GRAPH_FORMAT,
            version: GRAPH_VERSION,
            producer: "modelport".into(),
            opset: 14,
            inputs: vec![],
            outputs: vec![],
            dynamic_axes: BTreeMap::new(),
            nodes: vec![],
        };

        let size = graph.write(&path).unwrap();
        assert!(size > 0);
        assert_eq!(std::fs::metadata(&path).unwrap().len(), size);
    }
}
