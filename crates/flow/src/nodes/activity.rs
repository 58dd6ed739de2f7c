//! Activity invocation tracking

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::{NodeContext, NodeDecider, Transition};
use crate::graph::NodeStatus;
use crate::history::{EventAttributes, EventType, HistoryEvent};
use crate::task::{ActivityOptions, ActivityType, DecisionTask};

/// How predecessor results are split into invocations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputBatching {
    /// One invocation whose input is the list of all predecessor results
    #[default]
    Combined,

    /// One invocation per predecessor result, each with a one-element list
    PerInput,
}

/// A successfully resolved invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityOutcome {
    pub result: Option<Value>,
    pub input: Value,
}

/// An invocation that failed, timed out or was canceled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityFailure {
    /// Type of the event that resolved the invocation
    pub kind: EventType,
    pub attributes: EventAttributes,
    pub input: Value,
}

/// Node that fans out to activity invocations and waits for all of them
///
/// The first decide schedules one invocation per input batch. Later decides
/// correlate new history back to those invocations in two steps: the
/// `ActivityTaskScheduled` event of a pending invocation is remembered by its
/// event id, and outcome events are attributed through the scheduling event
/// id they reference. Once nothing is pending the node resolves with the
/// list of non-null results, failing if any invocation failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityTracker {
    pub activity_type: ActivityType,

    #[serde(default)]
    pub options: ActivityOptions,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control: Option<String>,

    #[serde(default)]
    pub batching: InputBatching,

    /// Pending invocations: activity id → input
    #[serde(default)]
    active: BTreeMap<String, Value>,

    #[serde(default)]
    done: BTreeMap<String, ActivityOutcome>,

    #[serde(default)]
    failed: BTreeMap<String, ActivityFailure>,

    /// Scheduling event id → activity id
    #[serde(default)]
    schidmap: BTreeMap<u64, String>,
}

impl ActivityTracker {
    pub fn new(activity_type: ActivityType) -> Self {
        Self {
            activity_type,
            options: ActivityOptions::default(),
            control: None,
            batching: InputBatching::default(),
            active: BTreeMap::new(),
            done: BTreeMap::new(),
            failed: BTreeMap::new(),
            schidmap: BTreeMap::new(),
        }
    }

    pub fn with_options(mut self, options: ActivityOptions) -> Self {
        self.options = options;
        self
    }

    /// Opaque data passed with every schedule decision
    pub fn with_control(mut self, control: impl Into<String>) -> Self {
        self.control = Some(control.into());
        self
    }

    pub fn with_batching(mut self, batching: InputBatching) -> Self {
        self.batching = batching;
        self
    }

    pub fn active(&self) -> &BTreeMap<String, Value> {
        &self.active
    }

    pub fn done(&self) -> &BTreeMap<String, ActivityOutcome> {
        &self.done
    }

    pub fn failed(&self) -> &BTreeMap<String, ActivityFailure> {
        &self.failed
    }

    pub fn schidmap(&self) -> &BTreeMap<u64, String> {
        &self.schidmap
    }

    fn is_unscheduled(&self) -> bool {
        self.active.is_empty() && self.done.is_empty() && self.failed.is_empty()
    }

    fn batch_input(&self, input_results: &[Value]) -> Vec<Value> {
        match self.batching {
            InputBatching::Combined => vec![Value::Array(input_results.to_vec())],
            InputBatching::PerInput => input_results
                .iter()
                .map(|r| Value::Array(vec![r.clone()]))
                .collect(),
        }
    }

    fn schedule(&mut self, node: &NodeContext<'_>, task: &mut DecisionTask) {
        for (idx, input) in self.batch_input(node.input_results).into_iter().enumerate() {
            let activity_id = format!("{}-{}", node.id, idx);
            self.active.insert(activity_id.clone(), input.clone());
            task.schedule_with_options(
                &self.activity_type,
                activity_id,
                input,
                self.control.clone(),
                self.options.clone(),
            );
        }
    }

    /// Last outcome per activity id among the task's new events
    fn collect_outcomes<'t>(
        &mut self,
        task: &'t DecisionTask,
    ) -> BTreeMap<String, &'t HistoryEvent> {
        let mut latest = BTreeMap::new();
        for event in task.recent_events() {
            match &event.attributes {
                EventAttributes::ActivityTaskScheduled { activity_id, .. } => {
                    if self.active.contains_key(activity_id) {
                        self.schidmap.insert(event.event_id, activity_id.clone());
                    }
                }
                EventAttributes::ScheduleActivityTaskFailed {
                    activity_id, cause, ..
                } => {
                    if self.active.contains_key(activity_id) {
                        warn!(%activity_id, %cause, "activity could not be scheduled");
                        latest.insert(activity_id.clone(), event);
                    }
                }
                attributes => {
                    let activity_id = attributes
                        .outcome_scheduled_event_id()
                        .and_then(|id| self.schidmap.get(&id));
                    if let Some(activity_id) = activity_id {
                        latest.insert(activity_id.clone(), event);
                    }
                }
            }
        }
        latest
    }

    fn reconcile(&mut self, node: &NodeContext<'_>, task: &DecisionTask) {
        for (activity_id, event) in self.collect_outcomes(task) {
            let Some(input) = self.active.remove(&activity_id) else {
                debug!(node_id = node.id, %activity_id, "outcome for resolved activity ignored");
                continue;
            };
            match &event.attributes {
                EventAttributes::ActivityTaskCompleted { result, .. } => {
                    debug!(node_id = node.id, %activity_id, "activity completed");
                    self.done.insert(
                        activity_id,
                        ActivityOutcome {
                            result: result.clone(),
                            input,
                        },
                    );
                }
                attributes => {
                    debug!(
                        node_id = node.id,
                        %activity_id,
                        kind = ?attributes.event_type(),
                        "activity failed"
                    );
                    self.failed.insert(
                        activity_id,
                        ActivityFailure {
                            kind: attributes.event_type(),
                            attributes: attributes.clone(),
                            input,
                        },
                    );
                }
            }
        }
    }
}

/// Batch position encoded in an activity id of the form `<node>-<idx>`
fn batch_index(activity_id: &str) -> usize {
    activity_id
        .rsplit_once('-')
        .and_then(|(_, idx)| idx.parse().ok())
        .unwrap_or(usize::MAX)
}

impl NodeDecider for ActivityTracker {
    fn decide(&mut self, node: &NodeContext<'_>, task: &mut DecisionTask) -> Transition {
        if self.is_unscheduled() {
            self.schedule(node, task);
        } else {
            self.reconcile(node, task);
        }

        if !self.active.is_empty() {
            return Transition::Pending;
        }

        let mut outcomes: Vec<_> = self.done.iter().collect();
        outcomes.sort_by_key(|(activity_id, _)| batch_index(activity_id));
        let result = outcomes
            .into_iter()
            .filter_map(|(_, outcome)| outcome.result.clone())
            .filter(|value| !value.is_null())
            .collect();
        let status = if self.failed.is_empty() {
            NodeStatus::Succeeded
        } else {
            NodeStatus::Failed
        };

        Transition::Resolved {
            status,
            result: Value::Array(result),
        }
    }
}
