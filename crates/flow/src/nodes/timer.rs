//! Timer tracking

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{NodeContext, NodeDecider, Transition};
use crate::graph::NodeStatus;
use crate::history::{EventType, HistoryEvent};
use crate::task::{duration_millis, DecisionTask};

/// Default delay before a timer fires
pub const DEFAULT_START_TO_FIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Node that starts one timer and waits for it
///
/// The timer id defaults to the node id and is fixed on the first decide, so
/// no correlation table is needed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerTracker {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer_id: Option<String>,

    #[serde(with = "duration_millis")]
    pub start_to_fire_timeout: Duration,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control: Option<String>,

    #[serde(default)]
    fired: bool,
}

impl Default for TimerTracker {
    fn default() -> Self {
        Self::new(DEFAULT_START_TO_FIRE_TIMEOUT)
    }
}

impl TimerTracker {
    pub fn new(start_to_fire_timeout: Duration) -> Self {
        Self {
            timer_id: None,
            start_to_fire_timeout,
            control: None,
            fired: false,
        }
    }

    pub fn with_timer_id(mut self, timer_id: impl Into<String>) -> Self {
        self.timer_id = Some(timer_id.into());
        self
    }

    pub fn with_control(mut self, control: impl Into<String>) -> Self {
        self.control = Some(control.into());
        self
    }

    /// Whether the start-timer decision was already emitted
    pub fn fired(&self) -> bool {
        self.fired
    }

    fn matches(event: &HistoryEvent, timer_id: &str) -> bool {
        event.attributes.timer_id() == Some(timer_id)
    }
}

impl NodeDecider for TimerTracker {
    fn decide(&mut self, node: &NodeContext<'_>, task: &mut DecisionTask) -> Transition {
        if !self.fired {
            self.fired = true;
            let timer_id = self
                .timer_id
                .get_or_insert_with(|| node.id.to_string())
                .clone();
            task.start_timer(timer_id, self.start_to_fire_timeout, self.control.clone());
            return Transition::Pending;
        }

        let timer_id = self.timer_id.as_deref().unwrap_or(node.id);
        if task
            .filter(EventType::TimerFired)
            .any(|e| Self::matches(e, timer_id))
        {
            debug!(node_id = node.id, %timer_id, "timer fired");
            Transition::Complete(NodeStatus::Succeeded)
        } else if task
            .filter(EventType::StartTimerFailed)
            .any(|e| Self::matches(e, timer_id))
        {
            debug!(node_id = node.id, %timer_id, "timer could not be started");
            Transition::Complete(NodeStatus::Failed)
        } else {
            Transition::Pending
        }
    }
}
