//! Decisions and activity options

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::WorkflowType;

/// Name and version of a registered activity type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ActivityType {
    pub name: String,
    pub version: String,
}

impl ActivityType {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl std::fmt::Display for ActivityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.version)
    }
}

/// Decisions queued on a decision task
///
/// All decisions of one decision pass are submitted together when the task
/// is completed, never one at a time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "decision_type", rename_all = "snake_case")]
pub enum Decision {
    /// Request an activity invocation
    ScheduleActivityTask {
        /// Identifier of the invocation within the execution
        activity_id: String,

        /// Registered type to invoke
        activity_type: ActivityType,

        /// Input data for the activity (JSON)
        input: Value,

        /// Opaque data echoed back in the scheduling event
        control: Option<String>,

        /// Task list and timeouts
        options: ActivityOptions,
    },

    /// Start a timer that fires after the specified duration
    StartTimer {
        timer_id: String,

        #[serde(with = "duration_millis")]
        start_to_fire_timeout: Duration,

        control: Option<String>,
    },

    /// Close the execution successfully with a result
    CompleteWorkflowExecution { result: Value },

    /// Close the execution as failed
    FailWorkflowExecution {
        reason: Option<String>,
        details: Option<String>,
    },

    /// Record a marker in the history
    RecordMarker {
        marker_name: String,
        details: Option<String>,
    },

    /// Start a child workflow execution
    StartChildWorkflowExecution {
        workflow_id: String,

        workflow_type: WorkflowType,

        input: Value,

        /// Opaque data echoed back in the child's initiation event
        control: Option<String>,

        options: ChildWorkflowOptions,
    },
}

impl Decision {
    /// Create a schedule decision with default options
    pub fn schedule_activity(
        activity_type: ActivityType,
        activity_id: impl Into<String>,
        input: Value,
    ) -> Self {
        Self::ScheduleActivityTask {
            activity_id: activity_id.into(),
            activity_type,
            input,
            control: None,
            options: ActivityOptions::default(),
        }
    }

    /// Create a timer decision
    pub fn timer(timer_id: impl Into<String>, start_to_fire_timeout: Duration) -> Self {
        Self::StartTimer {
            timer_id: timer_id.into(),
            start_to_fire_timeout,
            control: None,
        }
    }

    /// Create a complete execution decision
    pub fn complete(result: Value) -> Self {
        Self::CompleteWorkflowExecution { result }
    }

    /// Whether this decision closes the execution
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::CompleteWorkflowExecution { .. } | Self::FailWorkflowExecution { .. }
        )
    }
}

/// What happens to a child when its parent closes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChildPolicy {
    #[default]
    Terminate,
    RequestCancel,
    Abandon,
}

/// Options for starting a child workflow execution
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChildWorkflowOptions {
    /// Task list for the child's decision tasks (None uses the type default)
    pub task_list: Option<String>,

    pub child_policy: ChildPolicy,

    /// Maximum duration of the whole child execution
    #[serde(with = "duration_millis")]
    pub execution_start_to_close_timeout: Duration,

    /// Maximum duration of one of the child's decision tasks
    #[serde(with = "duration_millis")]
    pub task_start_to_close_timeout: Duration,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tag_list: Vec<String>,
}

impl Default for ChildWorkflowOptions {
    fn default() -> Self {
        Self {
            task_list: None,
            child_policy: ChildPolicy::default(),
            execution_start_to_close_timeout: Duration::from_secs(600),
            task_start_to_close_timeout: Duration::from_secs(120),
            tag_list: Vec::new(),
        }
    }
}

impl ChildWorkflowOptions {
    pub fn with_task_list(mut self, task_list: impl Into<String>) -> Self {
        self.task_list = Some(task_list.into());
        self
    }

    pub fn with_child_policy(mut self, child_policy: ChildPolicy) -> Self {
        self.child_policy = child_policy;
        self
    }

    pub fn with_execution_start_to_close_timeout(mut self, timeout: Duration) -> Self {
        self.execution_start_to_close_timeout = timeout;
        self
    }

    pub fn with_task_start_to_close_timeout(mut self, timeout: Duration) -> Self {
        self.task_start_to_close_timeout = timeout;
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag_list.push(tag.into());
        self
    }
}

/// Options for scheduling an activity invocation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityOptions {
    /// Task list to schedule on (None uses the type's registered default)
    pub task_list: Option<String>,

    /// Heartbeat interval for long-running activities
    #[serde(with = "duration_millis")]
    pub heartbeat_timeout: Duration,

    /// Maximum time from scheduling to completion
    #[serde(with = "duration_millis")]
    pub schedule_to_close_timeout: Duration,

    /// Maximum time to wait for activity to be picked up by a worker
    #[serde(with = "duration_millis")]
    pub schedule_to_start_timeout: Duration,

    /// Maximum time for activity execution (from start to completion)
    #[serde(with = "duration_millis")]
    pub start_to_close_timeout: Duration,
}

const ONE_HOUR: Duration = Duration::from_secs(60 * 60);

impl Default for ActivityOptions {
    fn default() -> Self {
        Self {
            task_list: None,
            heartbeat_timeout: ONE_HOUR,
            schedule_to_close_timeout: ONE_HOUR,
            schedule_to_start_timeout: ONE_HOUR,
            start_to_close_timeout: ONE_HOUR,
        }
    }
}

impl ActivityOptions {
    /// Schedule on a specific task list
    pub fn with_task_list(mut self, task_list: impl Into<String>) -> Self {
        self.task_list = Some(task_list.into());
        self
    }

    /// Set the heartbeat timeout
    pub fn with_heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.heartbeat_timeout = timeout;
        self
    }

    /// Set the schedule-to-close timeout
    pub fn with_schedule_to_close_timeout(mut self, timeout: Duration) -> Self {
        self.schedule_to_close_timeout = timeout;
        self
    }

    /// Set the schedule-to-start timeout
    pub fn with_schedule_to_start_timeout(mut self, timeout: Duration) -> Self {
        self.schedule_to_start_timeout = timeout;
        self
    }

    /// Set the start-to-close timeout
    pub fn with_start_to_close_timeout(mut self, timeout: Duration) -> Self {
        self.start_to_close_timeout = timeout;
        self
    }
}

/// Serde support for Duration (as milliseconds)
pub(crate) mod duration_millis {
    use serde::ser::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = u64::try_from(duration.as_millis())
            .map_err(|_| S::Error::custom(format!("duration {duration:?} exceeds u64 milliseconds")))?;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
