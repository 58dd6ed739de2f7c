//! Seam to the transport that returns decisions to the coordination service

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{Decision, TaskError};

/// Delivers the response for a decision task
///
/// Implemented by the polling/transport layer. The decision engine only
/// ever hands over complete batches.
#[async_trait]
pub trait DecisionResponder: Send + Sync {
    /// Submit the decisions made for a task
    async fn respond_completed(
        &self,
        task_token: &str,
        decisions: Vec<Decision>,
        execution_context: Option<String>,
    ) -> Result<(), TaskError>;

    /// Report that a task could not be decided
    async fn respond_failed(
        &self,
        task_token: &str,
        reason: Option<String>,
        details: Option<String>,
    ) -> Result<(), TaskError>;
}

/// A recorded `respond_completed` call
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedResponse {
    pub task_token: String,
    pub decisions: Vec<Decision>,
    pub execution_context: Option<String>,
}

/// A recorded `respond_failed` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedResponse {
    pub task_token: String,
    pub reason: Option<String>,
    pub details: Option<String>,
}

/// In-memory implementation of DecisionResponder
///
/// Records every response instead of sending it anywhere. Used by tests and
/// by the replay binary.
///
/// # Example
///
/// ```
/// use flowser_flow::InMemoryDecisionResponder;
///
/// let responder = InMemoryDecisionResponder::new();
/// assert!(responder.completed().is_empty());
/// ```
#[derive(Debug, Default)]
pub struct InMemoryDecisionResponder {
    completed: RwLock<Vec<CompletedResponse>>,
    failed: RwLock<Vec<FailedResponse>>,
}

impl InMemoryDecisionResponder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Completed responses in submission order
    pub fn completed(&self) -> Vec<CompletedResponse> {
        self.completed.read().clone()
    }

    /// Failed responses in submission order
    pub fn failed(&self) -> Vec<FailedResponse> {
        self.failed.read().clone()
    }

    /// Clear all data (for testing)
    pub fn clear(&self) {
        self.completed.write().clear();
        self.failed.write().clear();
    }
}

#[async_trait]
impl DecisionResponder for InMemoryDecisionResponder {
    async fn respond_completed(
        &self,
        task_token: &str,
        decisions: Vec<Decision>,
        execution_context: Option<String>,
    ) -> Result<(), TaskError> {
        self.completed.write().push(CompletedResponse {
            task_token: task_token.to_string(),
            decisions,
            execution_context,
        });
        Ok(())
    }

    async fn respond_failed(
        &self,
        task_token: &str,
        reason: Option<String>,
        details: Option<String>,
    ) -> Result<(), TaskError> {
        self.failed.write().push(FailedResponse {
            task_token: task_token.to_string(),
            reason,
            details,
        });
        Ok(())
    }
}
