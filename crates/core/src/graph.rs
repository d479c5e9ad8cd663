//! Node-graph model for generation workflows.
//!
//! A graph is a map of node ids to nodes; each node has a class name
//! and named inputs. An input value is either a literal (string,
//! number, bool) or a link: a two-element array `[node_id, output_index]`
//! referencing another node's output. This matches the JSON documents
//! the execution engine consumes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Node identifier within a graph (the JSON object key).
pub type NodeId = String;

/// A single node: its class and named input values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub class_type: String,
    #[serde(default)]
    pub inputs: BTreeMap<String, serde_json::Value>,
}

/// A generation workflow graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Graph {
    pub nodes: BTreeMap<NodeId, GraphNode>,
}

impl Graph {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    /// Set a named input on a node to a literal value.
    ///
    /// Returns [`CoreError::Template`] if the node does not exist, so a
    /// malformed template surfaces before the graph reaches the queue.
    /// The input itself may be new; templates commonly leave slots
    /// unset.
    pub fn set_input(
        &mut self,
        node_id: &str,
        input: &str,
        value: serde_json::Value,
    ) -> Result<(), CoreError> {
        let node = self.nodes.get_mut(node_id).ok_or_else(|| {
            CoreError::Template(format!("graph has no node '{node_id}' (wanted input '{input}')"))
        })?;
        node.inputs.insert(input.to_string(), value);
        Ok(())
    }

    pub fn input(&self, node_id: &str, input: &str) -> Option<&serde_json::Value> {
        self.nodes.get(node_id).and_then(|n| n.inputs.get(input))
    }

    /// Ids of nodes `node_id` links to through its inputs.
    pub fn dependencies_of(&self, node_id: &str) -> Vec<&str> {
        let Some(node) = self.nodes.get(node_id) else {
            return Vec::new();
        };
        node.inputs
            .values()
            .filter_map(|v| parse_link(v))
            .collect()
    }

    /// Ids of terminal nodes: nodes no other node links to.
    ///
    /// These are the graph's requested outputs.
    pub fn terminal_nodes(&self) -> Vec<NodeId> {
        let mut referenced = std::collections::BTreeSet::new();
        for node in self.nodes.values() {
            for value in node.inputs.values() {
                if let Some(target) = parse_link(value) {
                    referenced.insert(target);
                }
            }
        }
        self.nodes
            .keys()
            .filter(|id| !referenced.contains(id.as_str()))
            .cloned()
            .collect()
    }
}

/// Interpret an input value as a link, returning the target node id.
///
/// Links are `[node_id, output_index]` arrays; anything else is a
/// literal.
pub fn parse_link(value: &serde_json::Value) -> Option<&str> {
    let arr = value.as_array()?;
    if arr.len() != 2 {
        return None;
    }
    let target = arr[0].as_str()?;
    arr[1].as_u64()?;
    Some(target)
}
