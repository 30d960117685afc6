//! Graph-tracing backend seam.
//!
//! [`TraceBackend`] is the contract every export strategy invokes: run a
//! wrapped model on an example input and serialize the resulting graph to a
//! file. [`GraphRecorder`] is the bundled reference backend; it observes the
//! forward pass through a recording operator table and enforces each
//! operator's minimum operator-set version, so a low-opset trace fails the
//! same way the real exporters do on unsupported operators.

pub mod graph;

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;

use crate::config::AxisMap;
use crate::error::{ModelportError, Result};
use crate::export::wrapper::ExportWrapper;
use crate::ops::{OpInvoker, OpTable, ADD, EMBEDDING, KV_CACHE, LINEAR, RMS_NORM, SILU};
use crate::tensor::Tensor;

pub use graph::{GraphNode, TracedGraph, GRAPH_FORMAT, GRAPH_VERSION};

/// Per-trace parameters supplied by the invoking strategy.
#[derive(Debug, Clone)]
pub struct TraceOptions {
    pub opset: u32,
    pub input_name: String,
    pub output_name: String,
    pub dynamic_axes: BTreeMap<String, AxisMap>,
}

/// External graph-tracing backend: given a callable and an example input,
/// produce a serialized graph file. Blocking, no timeout.
pub trait TraceBackend: Send + Sync {
    fn trace(
        &self,
        wrapper: &ExportWrapper<'_>,
        ops: &OpTable,
        example: &Tensor,
        options: &TraceOptions,
        output: &Path,
    ) -> Result<()>;
}

/// Minimum operator-set version per primitive. Requesting a lower version
/// fails the trace, mirroring exporter behavior on old opsets.
fn min_opset(op: &str) -> u32 {
    match op {
        SILU => 14,
        RMS_NORM => 13,
        EMBEDDING | LINEAR | ADD | KV_CACHE => 1,
        _ => 1,
    }
}

/// Bundled reference backend: records every operator invocation made by the
/// wrapped forward pass and writes the recorded graph as a JSON container.
#[derive(Debug, Default)]
pub struct GraphRecorder;

impl GraphRecorder {
    pub fn new() -> Self {
        Self
    }
}

struct RecordingOps<'a> {
    inner: &'a OpTable,
    opset: u32,
    nodes: RefCell<Vec<GraphNode>>,
}

impl OpInvoker for RecordingOps<'_> {
    fn invoke(&self, op: &str, inputs: &[Tensor]) -> Result<Tensor> {
        let required = min_opset(op);
        if required > self.opset {
            return Err(ModelportError::UnsupportedOperator {
                name: op.to_string(),
                required,
                requested: self.opset,
            });
        }

        let output = self.inner.invoke(op, inputs)?;
        let mut nodes = self.nodes.borrow_mut();
        let name = format!("{op}_{}", nodes.len());
        nodes.push(GraphNode {
            name,
            op: op.to_string(),
            input_shapes: inputs.iter().map(|t| t.shape.clone()).collect(),
            output_shape: output.shape.clone(),
        });
        Ok(output)
    }
}

impl TraceBackend for GraphRecorder {
    fn trace(
        &self,
        wrapper: &ExportWrapper<'_>,
        ops: &OpTable,
        example: &Tensor,
        options: &TraceOptions,
        output: &Path,
    ) -> Result<()> {
        let recording = RecordingOps {
            inner: ops,
            opset: options.opset,
            nodes: RefCell::new(Vec::new()),
        };

        let result = wrapper.forward(&recording, example)?;
        let nodes = recording.nodes.into_inner();
        debug!(
            ops = nodes.len(),
            opset = options.opset,
            "recorded forward pass for {}",
            output.display()
        );

        let graph = TracedGraph {
            format: GRAPH_FORMAT,
            version: GRAPH_VERSION,
            producer: format!("modelport {}", env!("CARGO_PKG_VERSION")),
            opset: options.opset,
            inputs: vec![example.info(&options.input_name)],
            outputs: vec![result.info(&options.output_name)],
            dynamic_axes: options.dynamic_axes.clone(),
            nodes,
        };
        graph.write(output)?;
        Ok(())
    }
}
