//! Contract between the gateway and the graph execution engine.
//!
//! The engine is a black box to the rest of the workspace: it validates
//! graphs before they are enqueued, and it executes dequeued jobs while
//! pushing [`ProgressEvent`]s. Its terminal event for a completed job
//! is `executing { node: null }`; the gateway translates the returned
//! outputs into a `done` event.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::CoreError;
use crate::events::{JobOutputs, ProgressEvent};
use crate::graph::{parse_link, Graph, NodeId};
use crate::types::JobId;

/// Result of pre-submission graph validation.
#[derive(Debug, Clone, Serialize)]
pub struct Validation {
    pub ok: bool,
    /// Overall failure reason when `ok` is false.
    pub error: Option<String>,
    /// Terminal nodes the engine will execute.
    pub outputs_to_execute: Vec<NodeId>,
    /// Per-node problems (dangling links, bad input shapes).
    pub node_errors: BTreeMap<NodeId, Vec<String>>,
}

impl Validation {
    fn failure(error: impl Into<String>, node_errors: BTreeMap<NodeId, Vec<String>>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
            outputs_to_execute: Vec::new(),
            node_errors,
        }
    }
}

/// The execution engine as seen by the gateway.
#[async_trait]
pub trait GraphExecutor: Send + Sync {
    /// Validate a graph before it may be enqueued.
    async fn validate(&self, graph: &Graph) -> Validation;

    /// Execute a job, pushing progress events as execution advances.
    ///
    /// Cancellation is cooperative: implementations should observe
    /// `cancel` at node boundaries and return `Err` with a Validation
    /// or Internal error, or `Ok` with whatever outputs completed.
    /// There is no forced termination.
    async fn execute(
        &self,
        job_id: JobId,
        graph: &Graph,
        outputs_to_execute: &[NodeId],
        events: mpsc::Sender<ProgressEvent>,
        cancel: CancellationToken,
    ) -> Result<JobOutputs, CoreError>;
}

/// Structural validation shared by executor implementations.
///
/// Checks, in order: non-empty graph, no dangling links, no cycles.
/// On success the requested outputs are the graph's terminal nodes.
pub fn validate_structure(graph: &Graph) -> Validation {
    if graph.is_empty() {
        return Validation::failure("Graph contains no nodes", BTreeMap::new());
    }

    // Dangling links: every link target must exist.
    let mut node_errors: BTreeMap<NodeId, Vec<String>> = BTreeMap::new();
    for (id, node) in &graph.nodes {
        for (input, value) in &node.inputs {
            if let Some(target) = parse_link(value) {
                if graph.node(target).is_none() {
                    node_errors
                        .entry(id.clone())
                        .or_default()
                        .push(format!("input '{input}' links to missing node '{target}'"));
                }
            }
        }
    }
    if !node_errors.is_empty() {
        return Validation::failure("Graph references missing nodes", node_errors);
    }

    if let Some(cycle_node) = find_cycle(graph) {
        let mut errors = BTreeMap::new();
        errors
            .entry(cycle_node.clone())
            .or_insert_with(Vec::new)
            .push("node participates in a cycle".to_string());
        return Validation::failure("Graph contains a cycle", errors);
    }

    Validation {
        ok: true,
        error: None,
        outputs_to_execute: graph.terminal_nodes(),
        node_errors: BTreeMap::new(),
    }
}

/// Depth-first cycle search. Returns a node on a cycle, if any.
fn find_cycle(graph: &Graph) -> Option<NodeId> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        InProgress,
        Finished,
    }

    let mut marks: BTreeMap<&str, Mark> = BTreeMap::new();

    for start in graph.nodes.keys() {
        if marks.contains_key(start.as_str()) {
            continue;
        }
        // Iterative DFS with an explicit stack of (node, deps, next dep index).
        let mut stack: Vec<(&str, Vec<&str>, usize)> =
            vec![(start.as_str(), graph.dependencies_of(start), 0)];
        marks.insert(start.as_str(), Mark::InProgress);

        while let Some(frame) = stack.last_mut() {
            if frame.2 < frame.1.len() {
                let next = frame.1[frame.2];
                frame.2 += 1;
                match marks.get(next) {
                    Some(Mark::InProgress) => return Some(next.to_string()),
                    Some(Mark::Finished) => {}
                    None => {
                        marks.insert(next, Mark::InProgress);
                        let next_deps = graph.dependencies_of(next);
                        stack.push((next, next_deps, 0));
                    }
                }
            } else {
                let node = frame.0;
                marks.insert(node, Mark::Finished);
                stack.pop();
            }
        }
    }
    None
}
