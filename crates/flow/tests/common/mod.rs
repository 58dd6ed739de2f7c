//! Shared fixtures for integration tests

#![allow(dead_code)]

use flowser_flow::history::TimeoutType;
use flowser_flow::prelude::*;
use serde_json::Value;

pub fn sum_type() -> ActivityType {
    ActivityType::new("Sum", "1.0")
}

/// Builds an execution history the way the service would record it
///
/// Event ids increase by one per event. Each call to
/// [`decision_task`](Self::decision_task) records a scheduled/started pair
/// and returns a task whose previous-started marker points at the prior task.
pub struct History {
    events: Vec<HistoryEvent>,
    previous_started: u64,
    tasks: u64,
}

impl History {
    pub fn new() -> Self {
        Self::started_with(None)
    }

    pub fn started_with(input: Option<Value>) -> Self {
        let mut history = Self {
            events: Vec::new(),
            previous_started: 0,
            tasks: 0,
        };
        history.push(EventAttributes::WorkflowExecutionStarted {
            input,
            task_list: Some("default".to_string()),
        });
        history
    }

    pub fn events(&self) -> &[HistoryEvent] {
        &self.events
    }

    pub fn push(&mut self, attributes: EventAttributes) -> u64 {
        let event_id = self.events.len() as u64 + 1;
        self.events.push(HistoryEvent::new(event_id, attributes));
        event_id
    }

    /// Next decision task over everything recorded so far
    pub fn decision_task(&mut self) -> DecisionTask {
        let scheduled = self.push(EventAttributes::DecisionTaskScheduled {
            task_list: Some("default".to_string()),
        });
        let started = self.push(EventAttributes::DecisionTaskStarted {
            scheduled_event_id: scheduled,
            identity: Some("decider-1".to_string()),
        });

        self.tasks += 1;
        let task = DecisionTask::new(self.events.clone(), self.previous_started)
            .with_task_token(format!("token-{}", self.tasks));

        self.push(EventAttributes::DecisionTaskCompleted {
            scheduled_event_id: scheduled,
            started_event_id: started,
            execution_context: None,
        });
        self.previous_started = started;
        task
    }

    pub fn activity_scheduled(&mut self, activity_id: &str) -> u64 {
        self.push(EventAttributes::ActivityTaskScheduled {
            activity_id: activity_id.to_string(),
            activity_type: sum_type(),
            input: None,
            control: None,
            decision_task_completed_event_id: None,
        })
    }

    pub fn activity_completed(&mut self, scheduled_event_id: u64, result: Value) -> u64 {
        self.push(EventAttributes::ActivityTaskCompleted {
            scheduled_event_id,
            started_event_id: None,
            result: Some(result),
        })
    }

    pub fn activity_failed(&mut self, scheduled_event_id: u64, reason: &str) -> u64 {
        self.push(EventAttributes::ActivityTaskFailed {
            scheduled_event_id,
            started_event_id: None,
            reason: Some(reason.to_string()),
            details: None,
        })
    }

    pub fn activity_timed_out(&mut self, scheduled_event_id: u64) -> u64 {
        self.push(EventAttributes::ActivityTaskTimedOut {
            scheduled_event_id,
            started_event_id: None,
            timeout_type: TimeoutType::StartToClose,
            details: None,
        })
    }

    pub fn timer_started(&mut self, timer_id: &str) -> u64 {
        self.push(EventAttributes::TimerStarted {
            timer_id: timer_id.to_string(),
            start_to_fire_timeout_ms: 5_000,
            control: None,
        })
    }

    pub fn timer_fired(&mut self, timer_id: &str, started_event_id: u64) -> u64 {
        self.push(EventAttributes::TimerFired {
            timer_id: timer_id.to_string(),
            started_event_id,
        })
    }

    pub fn start_timer_failed(&mut self, timer_id: &str) -> u64 {
        self.push(EventAttributes::StartTimerFailed {
            timer_id: timer_id.to_string(),
            cause: "TIMER_ID_ALREADY_IN_USE".to_string(),
        })
    }
}

/// Activity ids scheduled by a task, in decision order
pub fn scheduled_ids(task: &DecisionTask) -> Vec<String> {
    task.decisions()
        .iter()
        .filter_map(|d| match d {
            Decision::ScheduleActivityTask { activity_id, .. } => Some(activity_id.clone()),
            _ => None,
        })
        .collect()
}

/// Status of a node by id
pub fn status(flow: &Flow, id: &str) -> NodeStatus {
    flow.node_by_id(id)
        .map(|n| n.status())
        .unwrap_or_else(|| panic!("no node {id}"))
}
