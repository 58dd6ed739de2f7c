//! Freezing flows to portable snapshots and rebuilding them
//!
//! A snapshot holds everything needed to resume a flow on a later decision
//! task: flow identity, the id counter, props, and per node its kind tag,
//! output ids, status, result and serialized behaviour state. Inputs are
//! not stored; they are rebuilt from the output lists.
//!
//! ```
//! use flowser_flow::prelude::*;
//!
//! let mut template = Flow::new();
//! let a = template.add_timer().unwrap();
//! let b = template.add(PassThrough::new()).unwrap();
//! template.connect(a, b).unwrap();
//!
//! let instance = template.copy().unwrap();
//! assert_eq!(instance.freeze().unwrap(), template.freeze().unwrap());
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::FlowConfig;
use crate::graph::{Flow, NodeStatus};
use crate::nodes::{NodeBehavior, NodeKind};

/// Errors rebuilding a flow from a snapshot
#[derive(Debug, thiserror::Error)]
pub enum ReplicationError {
    #[error("unknown flow type: {0}")]
    UnknownFlowType(String),

    #[error("duplicate node id in snapshot: {0}")]
    DuplicateNode(String),

    #[error("node {from} has an output to unknown node {to}")]
    UnknownEdgeTarget { from: String, to: String },

    #[error("invalid ctx for node {node_id}: {source}")]
    InvalidContext {
        node_id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Frozen form of a [`Flow`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowSnapshot {
    pub flow_type: String,

    #[serde(default)]
    pub idx: u64,

    #[serde(default)]
    pub props: Map<String, Value>,

    #[serde(default)]
    pub nodes: Vec<NodeSnapshot>,
}

/// Frozen form of one node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub id: String,

    pub kind: NodeKind,

    /// Ids of the node's outputs, in edge order
    #[serde(default)]
    pub outputs: Vec<String>,

    #[serde(default)]
    pub status: NodeStatus,

    #[serde(default)]
    pub result: Option<Value>,

    /// Behaviour configuration and working state
    #[serde(default)]
    pub ctx: Value,
}

impl FlowSnapshot {
    pub fn to_json(&self) -> Result<String, ReplicationError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ReplicationError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Capture a flow as a snapshot
pub fn freeze(flow: &Flow) -> Result<FlowSnapshot, ReplicationError> {
    let mut nodes = Vec::with_capacity(flow.len());
    for (_, node) in flow.nodes() {
        let ctx = node
            .behavior()
            .freeze()
            .map_err(|source| ReplicationError::InvalidContext {
                node_id: node.id().to_string(),
                source,
            })?;

        let mut outputs = Vec::with_capacity(node.outputs().len());
        for output in node.outputs() {
            // indices stored in a node always belong to its flow
            if let Ok(target) = flow.node(*output) {
                outputs.push(target.id().to_string());
            }
        }

        nodes.push(NodeSnapshot {
            id: node.id().to_string(),
            kind: node.kind(),
            outputs,
            status: node.status(),
            result: node.result().cloned(),
            ctx,
        });
    }

    Ok(FlowSnapshot {
        flow_type: Flow::TYPE.to_string(),
        idx: flow.idx(),
        props: flow.props().clone(),
        nodes,
    })
}

/// Rebuild a flow from a snapshot using the default configuration
pub fn unfreeze(snapshot: FlowSnapshot) -> Result<Flow, ReplicationError> {
    unfreeze_with_config(snapshot, FlowConfig::default())
}

/// Rebuild a flow from a snapshot
///
/// Status, result and ctx are restored as recorded, so no propagation runs
/// while rebuilding. Edges are added only after every node exists.
pub fn unfreeze_with_config(
    snapshot: FlowSnapshot,
    config: FlowConfig,
) -> Result<Flow, ReplicationError> {
    if snapshot.flow_type != Flow::TYPE {
        return Err(ReplicationError::UnknownFlowType(snapshot.flow_type));
    }

    let mut flow = Flow::with_config(config).with_props(snapshot.props);
    flow.set_idx(snapshot.idx);

    let mut edges = Vec::with_capacity(snapshot.nodes.len());
    for node in snapshot.nodes {
        let behavior = NodeBehavior::thaw(node.kind, node.ctx).map_err(|source| {
            ReplicationError::InvalidContext {
                node_id: node.id.clone(),
                source,
            }
        })?;

        let idx = flow
            .restore(node.id.clone(), behavior, node.status, node.result)
            .map_err(|_| ReplicationError::DuplicateNode(node.id.clone()))?;
        edges.push((idx, node.id, node.outputs));
    }

    for (from, from_id, outputs) in edges {
        for to_id in outputs {
            let to = flow
                .index_of(&to_id)
                .ok_or_else(|| ReplicationError::UnknownEdgeTarget {
                    from: from_id.clone(),
                    to: to_id.clone(),
                })?;
            flow.connect(from, to)
                .map_err(|_| ReplicationError::UnknownEdgeTarget {
                    from: from_id.clone(),
                    to: to_id,
                })?;
        }
    }

    debug!(nodes = flow.len(), idx = flow.idx(), "flow unfrozen");
    Ok(flow)
}

impl Flow {
    /// Capture this flow as a snapshot
    pub fn freeze(&self) -> Result<FlowSnapshot, ReplicationError> {
        freeze(self)
    }

    /// Rebuild a flow from a snapshot using the default configuration
    pub fn unfreeze(snapshot: FlowSnapshot) -> Result<Flow, ReplicationError> {
        unfreeze(snapshot)
    }

    /// Independent deep copy, made by a JSON round trip of the snapshot
    ///
    /// The copy keeps this flow's configuration.
    pub fn copy(&self) -> Result<Flow, ReplicationError> {
        let value = serde_json::to_value(self.freeze()?)?;
        let snapshot: FlowSnapshot = serde_json::from_value(value)?;
        unfreeze_with_config(snapshot, self.config().clone())
    }
}
