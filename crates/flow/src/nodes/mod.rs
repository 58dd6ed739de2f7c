//! Node behaviours
//!
//! Every node of a [`Flow`](crate::Flow) carries one [`NodeBehavior`]. The set
//! of behaviours is closed: [`NodeKind`] is the tag stored in snapshots and
//! [`NodeBehavior::thaw`] is the constructor table used to rebuild them.

mod activity;
mod timer;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::graph::{NodeIndex, NodeStatus};
use crate::task::DecisionTask;

pub use activity::{ActivityFailure, ActivityOutcome, ActivityTracker, InputBatching};
pub use timer::{TimerTracker, DEFAULT_START_TO_FIRE_TIMEOUT};

/// What a node sees of itself and its inputs while deciding
#[derive(Debug, Clone, Copy)]
pub struct NodeContext<'a> {
    /// Id of the node being decided
    pub id: &'a str,

    /// Non-null results of the node's inputs, in input order
    pub input_results: &'a [Value],
}

/// Outcome of one `decide` call
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Still waiting on history
    Pending,

    /// Move to the given status, leaving the result untouched
    Complete(NodeStatus),

    /// Move to the given status and publish a result
    Resolved { status: NodeStatus, result: Value },
}

/// Per-node decision logic
///
/// Called by the flow only while the node is `Active`. Implementations may
/// queue decisions on the task and update their own working state, and
/// report status changes through the returned [`Transition`].
pub trait NodeDecider {
    fn decide(&mut self, node: &NodeContext<'_>, task: &mut DecisionTask) -> Transition;

    /// Called when one of this node's outputs changed status
    fn on_output_status_change(&mut self, output: NodeIndex, status: NodeStatus) {
        let _ = (output, status);
    }
}

/// Node that succeeds as soon as it is decided
///
/// Useful as a join point or as a placeholder for an input that is resolved
/// outside the graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PassThrough {
    /// Free-form configuration, carried through snapshots
    pub ctx: Map<String, Value>,
}

impl PassThrough {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ctx(ctx: Map<String, Value>) -> Self {
        Self { ctx }
    }
}

impl NodeDecider for PassThrough {
    fn decide(&mut self, _node: &NodeContext<'_>, _task: &mut DecisionTask) -> Transition {
        Transition::Complete(NodeStatus::Succeeded)
    }
}

/// Snapshot tag identifying a node behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    #[serde(rename = "node")]
    Pass,
    Activity,
    Timer,
}

impl NodeKind {
    /// Prefix used for generated node ids
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "node",
            Self::Activity => "activity",
            Self::Timer => "timer",
        }
    }
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The behaviour attached to a node
#[derive(Debug, Clone, PartialEq)]
pub enum NodeBehavior {
    Pass(PassThrough),
    Activity(ActivityTracker),
    Timer(TimerTracker),
    #[cfg(test)]
    Recording(testing::Recorder),
}

impl NodeBehavior {
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Pass(_) => NodeKind::Pass,
            Self::Activity(_) => NodeKind::Activity,
            Self::Timer(_) => NodeKind::Timer,
            #[cfg(test)]
            Self::Recording(_) => NodeKind::Pass,
        }
    }

    /// Serialize configuration and working state
    pub fn freeze(&self) -> Result<Value, serde_json::Error> {
        match self {
            Self::Pass(node) => serde_json::to_value(node),
            Self::Activity(node) => serde_json::to_value(node),
            Self::Timer(node) => serde_json::to_value(node),
            #[cfg(test)]
            Self::Recording(_) => Ok(Value::Null),
        }
    }

    /// Rebuild a behaviour from its snapshot tag and serialized state
    pub fn thaw(kind: NodeKind, ctx: Value) -> Result<Self, serde_json::Error> {
        Ok(match kind {
            NodeKind::Pass if ctx.is_null() => Self::Pass(PassThrough::default()),
            NodeKind::Pass => Self::Pass(serde_json::from_value(ctx)?),
            NodeKind::Activity => Self::Activity(serde_json::from_value(ctx)?),
            NodeKind::Timer => Self::Timer(serde_json::from_value(ctx)?),
        })
    }

    pub fn as_activity(&self) -> Option<&ActivityTracker> {
        match self {
            Self::Activity(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_timer(&self) -> Option<&TimerTracker> {
        match self {
            Self::Timer(node) => Some(node),
            _ => None,
        }
    }

    #[cfg(test)]
    pub(crate) fn as_recorder(&self) -> Option<&testing::Recorder> {
        match self {
            Self::Recording(node) => Some(node),
            _ => None,
        }
    }

    fn decider_mut(&mut self) -> &mut dyn NodeDecider {
        match self {
            Self::Pass(node) => node,
            Self::Activity(node) => node,
            Self::Timer(node) => node,
            #[cfg(test)]
            Self::Recording(node) => node,
        }
    }
}

impl NodeDecider for NodeBehavior {
    fn decide(&mut self, node: &NodeContext<'_>, task: &mut DecisionTask) -> Transition {
        self.decider_mut().decide(node, task)
    }

    fn on_output_status_change(&mut self, output: NodeIndex, status: NodeStatus) {
        self.decider_mut().on_output_status_change(output, status)
    }
}

impl From<PassThrough> for NodeBehavior {
    fn from(node: PassThrough) -> Self {
        Self::Pass(node)
    }
}

impl From<ActivityTracker> for NodeBehavior {
    fn from(node: ActivityTracker) -> Self {
        Self::Activity(node)
    }
}

impl From<TimerTracker> for NodeBehavior {
    fn from(node: TimerTracker) -> Self {
        Self::Timer(node)
    }
}
