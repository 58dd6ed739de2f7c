//! A single delivery of a decision task

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, instrument};

use super::{ActivityOptions, ActivityType, ChildWorkflowOptions, Decision, DecisionResponder};
use crate::history::{EventAttributes, EventType, HistoryEvent};

/// Errors from decision task operations
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// No event of the requested type in the history
    #[error("{0:?} event not found")]
    EventNotFound(EventType),

    /// Failed to serialize the execution context
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The responder could not deliver the response
    #[error("transport error: {0}")]
    Transport(String),
}

/// Identity of one workflow execution
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkflowExecution {
    pub workflow_id: String,
    pub run_id: String,
}

impl std::fmt::Display for WorkflowExecution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "run_id({}) workflow_id({})", self.run_id, self.workflow_id)
    }
}

/// Name and version of the workflow type being decided
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkflowType {
    pub name: String,
    pub version: String,
}

/// Decision task as polled from the coordination service
#[derive(Debug, Clone, Default, Deserialize)]
struct PolledDecisionTask {
    #[serde(default)]
    task_token: String,
    #[serde(default)]
    workflow_execution: WorkflowExecution,
    #[serde(default)]
    workflow_type: WorkflowType,
    #[serde(default)]
    events: Vec<HistoryEvent>,
    #[serde(default)]
    previous_started_event_id: u64,
    started_event_id: Option<u64>,
}

impl From<PolledDecisionTask> for DecisionTask {
    fn from(polled: PolledDecisionTask) -> Self {
        let mut task = DecisionTask::new(polled.events, polled.previous_started_event_id)
            .with_task_token(polled.task_token)
            .with_execution(polled.workflow_execution)
            .with_workflow_type(polled.workflow_type);
        if let Some(started) = polled.started_event_id {
            task = task.with_started_event_id(started);
        }
        task
    }
}

/// One delivery of accumulated history, plus the decisions made for it
///
/// Events are kept oldest first regardless of the order they were delivered
/// in. Decisions queued through [`schedule`](Self::schedule),
/// [`start_timer`](Self::start_timer) and friends are only sent when the task
/// is [`complete`](Self::complete)d.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "PolledDecisionTask")]
pub struct DecisionTask {
    task_token: String,
    workflow_execution: WorkflowExecution,
    workflow_type: WorkflowType,
    events: Vec<HistoryEvent>,
    previous_started_event_id: u64,
    started_event_id: u64,
    decisions: Vec<Decision>,
}

impl DecisionTask {
    /// Create a task from history and the previously processed marker
    pub fn new(mut events: Vec<HistoryEvent>, previous_started_event_id: u64) -> Self {
        events.sort_by_key(|e| e.event_id);
        let started_event_id = events.last().map(|e| e.event_id).unwrap_or(0);
        Self {
            task_token: String::new(),
            workflow_execution: WorkflowExecution::default(),
            workflow_type: WorkflowType::default(),
            events,
            previous_started_event_id,
            started_event_id,
            decisions: Vec::new(),
        }
    }

    /// Set the token used to respond to this task
    pub fn with_task_token(mut self, task_token: impl Into<String>) -> Self {
        self.task_token = task_token.into();
        self
    }

    /// Set the execution this task belongs to
    pub fn with_execution(mut self, execution: WorkflowExecution) -> Self {
        self.workflow_execution = execution;
        self
    }

    /// Set the workflow type
    pub fn with_workflow_type(mut self, workflow_type: WorkflowType) -> Self {
        self.workflow_type = workflow_type;
        self
    }

    /// Set the id of the DecisionTaskStarted event of this delivery
    pub fn with_started_event_id(mut self, started_event_id: u64) -> Self {
        self.started_event_id = started_event_id;
        self
    }

    pub fn task_token(&self) -> &str {
        &self.task_token
    }

    pub fn workflow_type(&self) -> &WorkflowType {
        &self.workflow_type
    }

    pub fn previous_started_event_id(&self) -> u64 {
        self.previous_started_event_id
    }

    pub fn started_event_id(&self) -> u64 {
        self.started_event_id
    }

    /// All events since execution start, oldest first
    pub fn events(&self) -> &[HistoryEvent] {
        &self.events
    }

    /// Events newer than the previously processed marker, oldest first
    pub fn recent_events(&self) -> impl Iterator<Item = &HistoryEvent> {
        let previous = self.previous_started_event_id;
        self.events.iter().filter(move |e| e.event_id > previous)
    }

    /// All events of the given type, oldest first
    pub fn filter(&self, event_type: EventType) -> impl Iterator<Item = &HistoryEvent> {
        self.events
            .iter()
            .filter(move |e| e.event_type() == event_type)
    }

    /// The newest event of the given type
    pub fn most_recent(&self, event_type: EventType) -> Option<&HistoryEvent> {
        self.events
            .iter()
            .rev()
            .find(|e| e.event_type() == event_type)
    }

    /// The input the execution was started with
    pub fn start_input(&self) -> Result<Option<&Value>, TaskError> {
        match self.most_recent(EventType::WorkflowExecutionStarted) {
            Some(HistoryEvent {
                attributes: EventAttributes::WorkflowExecutionStarted { input, .. },
                ..
            }) => Ok(input.as_ref()),
            _ => Err(TaskError::EventNotFound(EventType::WorkflowExecutionStarted)),
        }
    }

    /// Decisions queued so far
    pub fn decisions(&self) -> &[Decision] {
        &self.decisions
    }

    /// Queue an activity invocation with default options
    pub fn schedule(
        &mut self,
        activity_type: &ActivityType,
        activity_id: impl Into<String>,
        input: Value,
        control: Option<String>,
    ) -> &mut Self {
        self.schedule_with_options(
            activity_type,
            activity_id,
            input,
            control,
            ActivityOptions::default(),
        )
    }

    /// Queue an activity invocation
    pub fn schedule_with_options(
        &mut self,
        activity_type: &ActivityType,
        activity_id: impl Into<String>,
        input: Value,
        control: Option<String>,
        options: ActivityOptions,
    ) -> &mut Self {
        let activity_id = activity_id.into();
        debug!(%activity_id, %activity_type, "scheduling activity");
        self.decisions.push(Decision::ScheduleActivityTask {
            activity_id,
            activity_type: activity_type.clone(),
            input,
            control,
            options,
        });
        self
    }

    /// Queue a timer start
    pub fn start_timer(
        &mut self,
        timer_id: impl Into<String>,
        start_to_fire_timeout: Duration,
        control: Option<String>,
    ) -> &mut Self {
        let timer_id = timer_id.into();
        debug!(%timer_id, ?start_to_fire_timeout, "starting timer");
        self.decisions.push(Decision::StartTimer {
            timer_id,
            start_to_fire_timeout,
            control,
        });
        self
    }

    /// Queue a marker
    pub fn record_marker(
        &mut self,
        marker_name: impl Into<String>,
        details: Option<String>,
    ) -> &mut Self {
        self.decisions.push(Decision::RecordMarker {
            marker_name: marker_name.into(),
            details,
        });
        self
    }

    /// Queue the start of a child workflow execution with default options
    pub fn start_child(
        &mut self,
        workflow_type: &WorkflowType,
        workflow_id: impl Into<String>,
        input: Value,
        control: Option<String>,
    ) -> &mut Self {
        self.start_child_with_options(
            workflow_type,
            workflow_id,
            input,
            control,
            ChildWorkflowOptions::default(),
        )
    }

    /// Queue the start of a child workflow execution
    pub fn start_child_with_options(
        &mut self,
        workflow_type: &WorkflowType,
        workflow_id: impl Into<String>,
        input: Value,
        control: Option<String>,
        options: ChildWorkflowOptions,
    ) -> &mut Self {
        let workflow_id = workflow_id.into();
        debug!(%workflow_id, workflow_type = %workflow_type.name, "starting child workflow");
        self.decisions.push(Decision::StartChildWorkflowExecution {
            workflow_id,
            workflow_type: workflow_type.clone(),
            input,
            control,
            options,
        });
        self
    }

    /// Handle for closing the execution this task belongs to
    pub fn workflow_execution(&mut self) -> WorkflowExecutionHandle<'_> {
        WorkflowExecutionHandle {
            execution: &self.workflow_execution,
            decisions: &mut self.decisions,
        }
    }

    /// Submit all queued decisions as one batch
    #[instrument(skip(self, responder, execution_context), fields(task_token = %self.task_token))]
    pub async fn complete<R>(
        self,
        responder: &R,
        execution_context: Option<Value>,
    ) -> Result<(), TaskError>
    where
        R: DecisionResponder + ?Sized,
    {
        let execution_context = execution_context
            .map(|c| serde_json::to_string(&c))
            .transpose()?;
        debug!(decisions = self.decisions.len(), "responding decision task completed");
        responder
            .respond_completed(&self.task_token, self.decisions, execution_context)
            .await
    }

    /// Report that this task could not be decided, discarding queued decisions
    pub async fn fail<R>(
        self,
        responder: &R,
        reason: Option<String>,
        details: Option<String>,
    ) -> Result<(), TaskError>
    where
        R: DecisionResponder + ?Sized,
    {
        responder
            .respond_failed(&self.task_token, reason, details)
            .await
    }
}

/// Closes a workflow execution by queuing the terminating decision
pub struct WorkflowExecutionHandle<'a> {
    execution: &'a WorkflowExecution,
    decisions: &'a mut Vec<Decision>,
}

impl WorkflowExecutionHandle<'_> {
    pub fn execution(&self) -> &WorkflowExecution {
        self.execution
    }

    /// Complete the execution with a result
    pub fn complete(self, result: Value) {
        debug!(execution = %self.execution, "completing workflow execution");
        self.decisions.push(Decision::complete(result));
    }

    /// Fail the execution
    pub fn fail(self, reason: Option<String>, details: Option<String>) {
        debug!(execution = %self.execution, ?reason, "failing workflow execution");
        self.decisions
            .push(Decision::FailWorkflowExecution { reason, details });
    }
}
