//! History events delivered with a decision task

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::task::ActivityType;

/// Types of timeouts reported for an activity invocation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutType {
    /// Activity was not picked up within schedule_to_start_timeout
    ScheduleToStart,

    /// Activity did not finish within schedule_to_close_timeout
    ScheduleToClose,

    /// Activity did not complete within start_to_close_timeout
    StartToClose,

    /// Worker did not heartbeat within heartbeat_timeout
    Heartbeat,
}

/// Type tag of a history event
///
/// Used to query a task's history by kind (see
/// [`DecisionTask::filter`](crate::task::DecisionTask::filter)).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    WorkflowExecutionStarted,
    WorkflowExecutionSignaled,
    WorkflowExecutionCancelRequested,
    WorkflowExecutionCompleted,
    WorkflowExecutionFailed,
    DecisionTaskScheduled,
    DecisionTaskStarted,
    DecisionTaskCompleted,
    DecisionTaskTimedOut,
    ActivityTaskScheduled,
    ScheduleActivityTaskFailed,
    ActivityTaskStarted,
    ActivityTaskCompleted,
    ActivityTaskFailed,
    ActivityTaskTimedOut,
    ActivityTaskCanceled,
    ActivityTaskCancelRequested,
    MarkerRecorded,
    TimerStarted,
    StartTimerFailed,
    TimerFired,
    TimerCanceled,
}

/// Type-specific attributes of a history event
///
/// The variant doubles as the event's type tag. Events are facts recorded by
/// the coordination service; they are never produced by this crate except in
/// tests.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum EventAttributes {
    // =========================================================================
    // Workflow Execution Events
    // =========================================================================
    /// Execution was started with the given input
    WorkflowExecutionStarted {
        input: Option<Value>,
        task_list: Option<String>,
    },

    /// External signal was delivered to the execution
    WorkflowExecutionSignaled {
        signal_name: String,
        input: Option<Value>,
    },

    /// Cancellation of the execution was requested
    WorkflowExecutionCancelRequested { cause: Option<String> },

    /// Execution completed
    WorkflowExecutionCompleted { result: Option<Value> },

    /// Execution failed
    WorkflowExecutionFailed {
        reason: Option<String>,
        details: Option<String>,
    },

    // =========================================================================
    // Decision Task Events
    // =========================================================================
    DecisionTaskScheduled { task_list: Option<String> },

    DecisionTaskStarted {
        scheduled_event_id: u64,
        identity: Option<String>,
    },

    DecisionTaskCompleted {
        scheduled_event_id: u64,
        started_event_id: u64,
        execution_context: Option<String>,
    },

    DecisionTaskTimedOut {
        scheduled_event_id: u64,
        started_event_id: u64,
    },

    // =========================================================================
    // Activity Events
    // =========================================================================
    /// The service accepted a schedule request; its event id is referenced
    /// by every later outcome event of the same invocation
    ActivityTaskScheduled {
        activity_id: String,
        activity_type: ActivityType,
        input: Option<Value>,
        control: Option<String>,
        decision_task_completed_event_id: Option<u64>,
    },

    /// The service rejected a schedule request
    ScheduleActivityTaskFailed {
        activity_id: String,
        activity_type: ActivityType,
        cause: String,
    },

    ActivityTaskStarted {
        scheduled_event_id: u64,
        identity: Option<String>,
    },

    ActivityTaskCompleted {
        scheduled_event_id: u64,
        started_event_id: Option<u64>,
        result: Option<Value>,
    },

    ActivityTaskFailed {
        scheduled_event_id: u64,
        started_event_id: Option<u64>,
        reason: Option<String>,
        details: Option<String>,
    },

    ActivityTaskTimedOut {
        scheduled_event_id: u64,
        started_event_id: Option<u64>,
        timeout_type: TimeoutType,
        details: Option<String>,
    },

    ActivityTaskCanceled {
        scheduled_event_id: u64,
        started_event_id: Option<u64>,
        details: Option<String>,
    },

    ActivityTaskCancelRequested { activity_id: String },

    // =========================================================================
    // Marker Events
    // =========================================================================
    MarkerRecorded {
        marker_name: String,
        details: Option<String>,
    },

    // =========================================================================
    // Timer Events
    // =========================================================================
    TimerStarted {
        timer_id: String,
        /// Duration in milliseconds
        start_to_fire_timeout_ms: u64,
        control: Option<String>,
    },

    StartTimerFailed { timer_id: String, cause: String },

    TimerFired {
        timer_id: String,
        started_event_id: u64,
    },

    TimerCanceled {
        timer_id: String,
        started_event_id: u64,
    },
}

impl EventAttributes {
    /// Get the type tag of these attributes
    pub fn event_type(&self) -> EventType {
        match self {
            Self::WorkflowExecutionStarted { .. } => EventType::WorkflowExecutionStarted,
            Self::WorkflowExecutionSignaled { .. } => EventType::WorkflowExecutionSignaled,
            Self::WorkflowExecutionCancelRequested { .. } => {
                EventType::WorkflowExecutionCancelRequested
            }
            Self::WorkflowExecutionCompleted { .. } => EventType::WorkflowExecutionCompleted,
            Self::WorkflowExecutionFailed { .. } => EventType::WorkflowExecutionFailed,
            Self::DecisionTaskScheduled { .. } => EventType::DecisionTaskScheduled,
            Self::DecisionTaskStarted { .. } => EventType::DecisionTaskStarted,
            Self::DecisionTaskCompleted { .. } => EventType::DecisionTaskCompleted,
            Self::DecisionTaskTimedOut { .. } => EventType::DecisionTaskTimedOut,
            Self::ActivityTaskScheduled { .. } => EventType::ActivityTaskScheduled,
            Self::ScheduleActivityTaskFailed { .. } => EventType::ScheduleActivityTaskFailed,
            Self::ActivityTaskStarted { .. } => EventType::ActivityTaskStarted,
            Self::ActivityTaskCompleted { .. } => EventType::ActivityTaskCompleted,
            Self::ActivityTaskFailed { .. } => EventType::ActivityTaskFailed,
            Self::ActivityTaskTimedOut { .. } => EventType::ActivityTaskTimedOut,
            Self::ActivityTaskCanceled { .. } => EventType::ActivityTaskCanceled,
            Self::ActivityTaskCancelRequested { .. } => EventType::ActivityTaskCancelRequested,
            Self::MarkerRecorded { .. } => EventType::MarkerRecorded,
            Self::TimerStarted { .. } => EventType::TimerStarted,
            Self::StartTimerFailed { .. } => EventType::StartTimerFailed,
            Self::TimerFired { .. } => EventType::TimerFired,
            Self::TimerCanceled { .. } => EventType::TimerCanceled,
        }
    }

    /// Get the referenced scheduling event id if this is an activity outcome
    ///
    /// Outcomes are completion, failure, timeout and cancellation.
    pub fn outcome_scheduled_event_id(&self) -> Option<u64> {
        match self {
            Self::ActivityTaskCompleted {
                scheduled_event_id, ..
            }
            | Self::ActivityTaskFailed {
                scheduled_event_id, ..
            }
            | Self::ActivityTaskTimedOut {
                scheduled_event_id, ..
            }
            | Self::ActivityTaskCanceled {
                scheduled_event_id, ..
            } => Some(*scheduled_event_id),
            _ => None,
        }
    }

    /// Get the timer_id if this is a timer-related event
    pub fn timer_id(&self) -> Option<&str> {
        match self {
            Self::TimerStarted { timer_id, .. }
            | Self::StartTimerFailed { timer_id, .. }
            | Self::TimerFired { timer_id, .. }
            | Self::TimerCanceled { timer_id, .. } => Some(timer_id),
            _ => None,
        }
    }
}

/// One immutable entry of an execution's history
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEvent {
    /// Monotonically increasing id, unique within the execution
    pub event_id: u64,

    /// When the service recorded the event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_timestamp: Option<DateTime<Utc>>,

    #[serde(flatten)]
    pub attributes: EventAttributes,
}

impl HistoryEvent {
    /// Create an event without a timestamp
    pub fn new(event_id: u64, attributes: EventAttributes) -> Self {
        Self {
            event_id,
            event_timestamp: None,
            attributes,
        }
    }

    /// Set the recording timestamp
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.event_timestamp = Some(timestamp);
        self
    }

    /// Get the type tag of this event
    pub fn event_type(&self) -> EventType {
        self.attributes.event_type()
    }
}
