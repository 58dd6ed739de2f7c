//! # Flowser Flow
//!
//! A replay-driven decision engine for workflow executions.
//!
//! Every decision task carries the full event history of one execution. A
//! [`Flow`] is a dependency graph of nodes that re-reads that history on each
//! task and queues the next decisions: schedule activities, start timers or
//! close the execution.
//!
//! ## Features
//!
//! - **Status propagation**: a node activates once all of its inputs
//!   succeeded and fails as soon as any input fails
//! - **History correlation**: activity and timer nodes match outcome events
//!   back to the decisions that caused them
//! - **Snapshots**: flows freeze to JSON and thaw back, so a template graph
//!   can be copied per execution and resumed on any worker
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       DecisionTask                           │
//! │  (history events, queued decisions, DecisionResponder seam)  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                           Flow                               │
//! │  (node arena, status propagation, worklist decide pass)      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │          ActivityTracker / TimerTracker / PassThrough        │
//! │  (per-node decisions and history correlation)                │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use flowser_flow::prelude::*;
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut template = Flow::new();
//! let timer = template.add_timer()?;
//! let report = template.add_with_id(
//!     "report",
//!     ActivityTracker::new(ActivityType::new("Report", "1.0")),
//! )?;
//! template.connect(timer, report)?;
//!
//! let mut flow = template.copy()?;
//! let mut task = DecisionTask::new(vec![], 0).with_task_token("token-1");
//! flow.decide(&mut task);
//!
//! let responder = InMemoryDecisionResponder::new();
//! task.complete(&responder, Some(json!(flow.freeze()?))).await?;
//! assert_eq!(responder.completed()[0].decisions.len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod graph;
pub mod history;
pub mod nodes;
pub mod replicate;
pub mod task;

pub use config::FlowConfig;
pub use graph::{Flow, FlowError, Node, NodeIndex, NodeStatus};
pub use history::{EventAttributes, EventType, HistoryEvent};
pub use nodes::{ActivityTracker, NodeBehavior, NodeKind, PassThrough, TimerTracker};
pub use replicate::{FlowSnapshot, NodeSnapshot, ReplicationError};
pub use task::{
    ActivityOptions, ActivityType, ChildWorkflowOptions, Decision, DecisionResponder,
    DecisionTask, InMemoryDecisionResponder, TaskError, WorkflowType,
};

/// Prelude for common imports
pub mod prelude {
    pub use crate::config::FlowConfig;
    pub use crate::graph::{Flow, FlowError, NodeIndex, NodeStatus};
    pub use crate::history::{EventAttributes, EventType, HistoryEvent};
    pub use crate::nodes::{ActivityTracker, InputBatching, PassThrough, TimerTracker};
    pub use crate::replicate::{FlowSnapshot, ReplicationError};
    pub use crate::task::{
        ActivityOptions, ActivityType, ChildWorkflowOptions, Decision, DecisionResponder,
        DecisionTask, InMemoryDecisionResponder, TaskError, WorkflowType,
    };
}
