//! Decision flow: the graph of nodes for one workflow execution

use std::collections::{HashMap, HashSet, VecDeque};

use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

use super::{Node, NodeIndex, NodeStatus};
use crate::config::FlowConfig;
use crate::nodes::{NodeBehavior, NodeContext, NodeDecider, TimerTracker, Transition};
use crate::task::DecisionTask;

/// Errors from building or driving a flow
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    /// A node with this id is already registered
    #[error("duplicate node id: {0}")]
    DuplicateNode(String),

    /// No node with this id
    #[error("node not found: {0}")]
    NodeNotFound(String),

    /// Index was not produced by this flow
    #[error("node index {0} out of range")]
    IndexOutOfRange(usize),
}

/// Dependency graph of nodes driven by decision tasks
///
/// A node becomes `Active` once all of its inputs succeeded (immediately if
/// it has none) and fails as soon as any input fails. [`decide`](Self::decide)
/// asks every active node to decide, including nodes activated during the
/// same pass, so one task can advance several layers of the graph.
///
/// # Example
///
/// ```
/// use flowser_flow::prelude::*;
///
/// let mut flow = Flow::new();
/// let wait = flow.add_timer().unwrap();
/// let sum = flow
///     .add_with_id("sum", ActivityTracker::new(ActivityType::new("Sum", "1.0")))
///     .unwrap();
/// flow.connect(wait, sum).unwrap();
///
/// let mut task = DecisionTask::new(vec![], 0);
/// flow.decide(&mut task);
///
/// assert_eq!(task.decisions().len(), 1);
/// assert_eq!(flow.node(sum).unwrap().status(), NodeStatus::Inactive);
/// ```
#[derive(Debug, Clone)]
pub struct Flow {
    idx: u64,
    props: Map<String, Value>,
    nodes: Vec<Node>,
    index: HashMap<String, NodeIndex>,
    activated: Vec<NodeIndex>,
    config: FlowConfig,
}

impl Default for Flow {
    fn default() -> Self {
        Self::new()
    }
}

impl Flow {
    /// Identity recorded in snapshots
    pub const TYPE: &'static str = "flowser.flow";

    pub fn new() -> Self {
        Self::with_config(FlowConfig::default())
    }

    pub fn with_config(config: FlowConfig) -> Self {
        Self {
            idx: 0,
            props: Map::new(),
            nodes: Vec::new(),
            index: HashMap::new(),
            activated: Vec::new(),
            config,
        }
    }

    /// Set workflow-scoped properties
    pub fn with_props(mut self, props: Map<String, Value>) -> Self {
        self.props = props;
        self
    }

    pub fn config(&self) -> &FlowConfig {
        &self.config
    }

    pub fn props(&self) -> &Map<String, Value> {
        &self.props
    }

    pub fn props_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.props
    }

    /// Counter used for generated node ids
    pub fn idx(&self) -> u64 {
        self.idx
    }

    pub(crate) fn set_idx(&mut self, idx: u64) {
        self.idx = idx;
    }

    // =========================================================================
    // Building
    // =========================================================================

    /// Add a node with a generated id (`<kind>-<n>`)
    pub fn add(&mut self, behavior: impl Into<NodeBehavior>) -> Result<NodeIndex, FlowError> {
        let behavior = behavior.into();
        self.idx += 1;
        let id = format!("{}-{}", behavior.kind(), self.idx);
        self.insert(Node::new(id, behavior))
    }

    /// Add a node with an explicit id
    pub fn add_with_id(
        &mut self,
        id: impl Into<String>,
        behavior: impl Into<NodeBehavior>,
    ) -> Result<NodeIndex, FlowError> {
        self.insert(Node::new(id.into(), behavior.into()))
    }

    /// Add a timer node using the configured default timeout
    pub fn add_timer(&mut self) -> Result<NodeIndex, FlowError> {
        let timer = TimerTracker::new(self.config.default_timer_timeout);
        self.add(timer)
    }

    /// Re-register a node exactly as it was frozen, without side effects
    pub(crate) fn restore(
        &mut self,
        id: String,
        behavior: NodeBehavior,
        status: NodeStatus,
        result: Option<Value>,
    ) -> Result<NodeIndex, FlowError> {
        let mut node = Node::new(id, behavior);
        node.status = status;
        node.result = result;
        self.insert(node)
    }

    fn insert(&mut self, node: Node) -> Result<NodeIndex, FlowError> {
        if self.index.contains_key(&node.id) {
            return Err(FlowError::DuplicateNode(node.id));
        }
        let idx = NodeIndex(self.nodes.len());
        self.index.insert(node.id.clone(), idx);
        self.nodes.push(node);
        Ok(idx)
    }

    /// Add an edge `from → to`, recorded on both ends
    ///
    /// Inputs are kept in registration order whatever order the edges are
    /// added in, so a rehydrated flow sees the same input order.
    ///
    /// Returns `to`, the node a chain continues from.
    pub fn connect(&mut self, from: NodeIndex, to: NodeIndex) -> Result<NodeIndex, FlowError> {
        self.check(from)?;
        self.check(to)?;
        if !self.nodes[from.0].outputs.contains(&to) {
            self.nodes[from.0].outputs.push(to);
        }
        let inputs = &mut self.nodes[to.0].inputs;
        if let Err(pos) = inputs.binary_search(&from) {
            inputs.insert(pos, from);
        }
        Ok(to)
    }

    /// Add an edge between two nodes given by id
    pub fn connect_ids(&mut self, from: &str, to: &str) -> Result<NodeIndex, FlowError> {
        let from = self.require(from)?;
        let to = self.require(to)?;
        self.connect(from, to)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, idx: NodeIndex) -> Result<&Node, FlowError> {
        self.nodes
            .get(idx.0)
            .ok_or(FlowError::IndexOutOfRange(idx.0))
    }

    pub fn node_by_id(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|idx| &self.nodes[idx.0])
    }

    pub fn index_of(&self, id: &str) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }

    /// Nodes in registration order
    pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeIndex(i), n))
    }

    /// Nodes currently `Active`, in registration order
    pub fn active(&self) -> Vec<NodeIndex> {
        self.nodes()
            .filter(|(_, n)| n.status == NodeStatus::Active)
            .map(|(idx, _)| idx)
            .collect()
    }

    /// Whether every node reached a terminal status
    pub fn is_done(&self) -> bool {
        self.nodes.iter().all(|n| n.status.is_done())
    }

    fn check(&self, idx: NodeIndex) -> Result<(), FlowError> {
        self.node(idx).map(|_| ())
    }

    fn require(&self, id: &str) -> Result<NodeIndex, FlowError> {
        self.index_of(id)
            .ok_or_else(|| FlowError::NodeNotFound(id.to_string()))
    }

    // =========================================================================
    // Status propagation
    // =========================================================================

    /// Set a node's status and propagate the change through the graph
    ///
    /// This is also the entry point for external triggers such as
    /// cancellation.
    pub fn set_status(&mut self, idx: NodeIndex, status: NodeStatus) -> Result<(), FlowError> {
        self.check(idx)?;
        self.apply_status(idx, status);
        Ok(())
    }

    /// Set a node's result without touching its status
    pub fn set_result(&mut self, idx: NodeIndex, result: Option<Value>) -> Result<(), FlowError> {
        self.check(idx)?;
        self.nodes[idx.0].result = result;
        Ok(())
    }

    fn apply_status(&mut self, idx: NodeIndex, status: NodeStatus) {
        let mut pending = VecDeque::new();
        self.write_status(idx, status, &mut pending);

        while let Some((target, source)) = pending.pop_front() {
            if let Some(next) = self.input_status_changed(target, source) {
                self.write_status(target, next, &mut pending);
            }
        }
    }

    /// Record a status change and queue input-side notifications for outputs
    fn write_status(
        &mut self,
        idx: NodeIndex,
        status: NodeStatus,
        pending: &mut VecDeque<(NodeIndex, NodeIndex)>,
    ) {
        let node = &mut self.nodes[idx.0];
        if node.status == status {
            return;
        }
        let previous = std::mem::replace(&mut node.status, status);
        debug!(node_id = %node.id, from = %previous, to = %status, "node status changed");

        if status == NodeStatus::Active {
            self.activated.push(idx);
        }
        pending.extend(node.outputs.iter().map(|output| (*output, idx)));

        let inputs = node.inputs.clone();
        for input in inputs {
            self.nodes[input.0]
                .behavior
                .on_output_status_change(idx, status);
        }
    }

    /// Status `target` should move to after its input `source` changed
    fn input_status_changed(&self, target: NodeIndex, source: NodeIndex) -> Option<NodeStatus> {
        let node = &self.nodes[target.0];
        if node.status.is_done() {
            None
        } else if self.nodes[source.0].status == NodeStatus::Failed {
            Some(NodeStatus::Failed)
        } else if node
            .inputs
            .iter()
            .all(|input| self.nodes[input.0].status == NodeStatus::Succeeded)
        {
            Some(NodeStatus::Active)
        } else {
            None
        }
    }

    // =========================================================================
    // Decision pass
    // =========================================================================

    /// Run one decision pass against a task
    ///
    /// Decisions are queued on the task; submitting them is up to the caller.
    /// If the pass leaves no active node and the task holds no decisions, the
    /// execution is completed with [`FlowConfig::quiescent_result`].
    #[instrument(skip(self, task), fields(nodes = self.nodes.len()))]
    pub fn decide(&mut self, task: &mut DecisionTask) {
        self.activated.clear();
        for i in 0..self.nodes.len() {
            let node = &self.nodes[i];
            if node.inputs.is_empty() && node.status == NodeStatus::Inactive {
                self.apply_status(NodeIndex(i), NodeStatus::Active);
            }
        }
        self.activated.clear();

        let mut queue: VecDeque<NodeIndex> = self.active().into();
        let mut visited = HashSet::new();

        while let Some(idx) = queue.pop_front() {
            if !visited.insert(idx) || self.nodes[idx.0].status != NodeStatus::Active {
                continue;
            }
            self.decide_node(idx, task);
            queue.extend(self.activated.drain(..));
        }

        if self.active().is_empty() && task.decisions().is_empty() {
            info!(
                result = %self.config.quiescent_result,
                "no active nodes and no decisions, completing execution"
            );
            task.workflow_execution()
                .complete(self.config.quiescent_result.clone());
        }
    }

    fn decide_node(&mut self, idx: NodeIndex, task: &mut DecisionTask) {
        let input_results: Vec<Value> = self.nodes[idx.0]
            .inputs
            .iter()
            .filter_map(|input| self.nodes[input.0].result.as_ref())
            .filter(|result| !result.is_null())
            .cloned()
            .collect();

        let node = &mut self.nodes[idx.0];
        let ctx = NodeContext {
            id: &node.id,
            input_results: &input_results,
        };
        let transition = node.behavior.decide(&ctx, task);

        match transition {
            Transition::Pending => {}
            Transition::Complete(status) => self.apply_status(idx, status),
            Transition::Resolved { status, result } => {
                self.nodes[idx.0].result = Some(result);
                self.apply_status(idx, status);
            }
        }
    }
}
