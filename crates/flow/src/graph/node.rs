//! Graph vertices

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::NodeStatus;
use crate::nodes::{NodeBehavior, NodeKind};

/// Position of a node inside its [`Flow`](super::Flow)
///
/// Only meaningful for the flow that returned it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeIndex(pub(crate) usize);

impl NodeIndex {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// A vertex of the dependency graph
///
/// Edges are stored on both ends: if `a` lists `b` in its outputs, `b` lists
/// `a` in its inputs. Outputs keep insertion order. Inputs are sorted by
/// registration index.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) id: String,
    pub(crate) status: NodeStatus,
    pub(crate) result: Option<Value>,
    pub(crate) behavior: NodeBehavior,
    pub(crate) inputs: Vec<NodeIndex>,
    pub(crate) outputs: Vec<NodeIndex>,
}

impl Node {
    pub(crate) fn new(id: String, behavior: NodeBehavior) -> Self {
        Self {
            id,
            status: NodeStatus::Inactive,
            result: None,
            behavior,
            inputs: Vec::new(),
            outputs: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> NodeStatus {
        self.status
    }

    /// Output value, set once the node finished
    pub fn result(&self) -> Option<&Value> {
        self.result.as_ref()
    }

    pub fn kind(&self) -> NodeKind {
        self.behavior.kind()
    }

    /// Node-specific configuration and working state
    pub fn behavior(&self) -> &NodeBehavior {
        &self.behavior
    }

    pub fn inputs(&self) -> &[NodeIndex] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[NodeIndex] {
        &self.outputs
    }
}
