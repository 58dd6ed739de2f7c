//! The decision task collaborator
//!
//! This module contains what a decision pass reads from and writes to:
//! - [`DecisionTask`] history of one delivery plus the queued decisions
//! - [`Decision`] enum of requests sent back to the coordination service
//! - [`DecisionResponder`] trait the transport implements to submit them

mod decision;
mod decision_task;
mod responder;

pub(crate) use decision::duration_millis;
pub use decision::{ActivityOptions, ActivityType, ChildPolicy, ChildWorkflowOptions, Decision};
pub use decision_task::{
    DecisionTask, TaskError, WorkflowExecution, WorkflowExecutionHandle, WorkflowType,
};
pub use responder::{
    CompletedResponse, DecisionResponder, FailedResponse, InMemoryDecisionResponder,
};
