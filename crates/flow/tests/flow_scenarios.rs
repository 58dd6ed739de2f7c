//! End-to-end decision passes over recorded histories

mod common;

use common::{scheduled_ids, status, sum_type, History};
use flowser_flow::history::EventType;
use flowser_flow::prelude::*;
use serde_json::{json, Value};

/// `a` and `b` already succeeded with 3 and 4, both feeding `sum`
fn sum_flow() -> Flow {
    let mut flow = Flow::new();
    let a = flow.add_with_id("a", PassThrough::new()).unwrap();
    let b = flow.add_with_id("b", PassThrough::new()).unwrap();
    let sum = flow
        .add_with_id("sum", ActivityTracker::new(sum_type()))
        .unwrap();
    flow.connect(a, sum).unwrap();
    flow.connect(b, sum).unwrap();

    flow.set_result(a, Some(json!(3))).unwrap();
    flow.set_result(b, Some(json!(4))).unwrap();
    flow.set_status(a, NodeStatus::Succeeded).unwrap();
    flow.set_status(b, NodeStatus::Succeeded).unwrap();
    flow
}

fn tracker<'a>(flow: &'a Flow, id: &str) -> &'a ActivityTracker {
    flow.node_by_id(id)
        .and_then(|n| n.behavior().as_activity())
        .unwrap()
}

#[test_log::test]
fn test_activity_sums_predecessor_results() {
    let mut flow = sum_flow();
    let mut history = History::new();
    assert_eq!(status(&flow, "sum"), NodeStatus::Active);

    let mut task = history.decision_task();
    flow.decide(&mut task);

    assert_eq!(task.decisions().len(), 1);
    match &task.decisions()[0] {
        Decision::ScheduleActivityTask {
            activity_id,
            activity_type,
            input,
            ..
        } => {
            assert_eq!(activity_id, "sum-0");
            assert_eq!(activity_type, &sum_type());
            assert_eq!(input, &json!([3, 4]));
        }
        other => panic!("unexpected decision: {other:?}"),
    }

    let scheduled = history.activity_scheduled("sum-0");
    history.activity_completed(scheduled, json!(7));
    let mut task = history.decision_task();
    flow.decide(&mut task);

    let sum = flow.node_by_id("sum").unwrap();
    assert_eq!(sum.status(), NodeStatus::Succeeded);
    assert_eq!(sum.result(), Some(&json!([7])));
    // everything settled, the fallback closes the execution
    assert_eq!(task.decisions(), &[Decision::complete(json!("UNKNOWN"))]);
}

#[test]
fn test_activity_timeout_fails_node() {
    let mut flow = sum_flow();
    let mut history = History::new();
    flow.decide(&mut history.decision_task());

    let scheduled = history.activity_scheduled("sum-0");
    history.activity_timed_out(scheduled);
    flow.decide(&mut history.decision_task());

    assert_eq!(status(&flow, "sum"), NodeStatus::Failed);
    let sum = tracker(&flow, "sum");
    assert!(sum.done().is_empty());
    assert!(sum.active().is_empty());
    assert_eq!(sum.failed().len(), 1);
    assert_eq!(sum.failed()["sum-0"].kind, EventType::ActivityTaskTimedOut);
    assert_eq!(sum.failed()["sum-0"].input, json!([3, 4]));
}

#[test]
fn test_timer_fired() {
    let mut flow = Flow::new();
    let timer = flow.add_timer().unwrap();
    let timer_id = flow.node(timer).unwrap().id().to_string();
    let mut history = History::new();

    let mut task = history.decision_task();
    flow.decide(&mut task);
    assert!(matches!(
        &task.decisions()[..],
        [Decision::StartTimer { timer_id: id, .. }] if *id == timer_id
    ));

    let started = history.timer_started(&timer_id);
    history.timer_fired(&timer_id, started);
    flow.decide(&mut history.decision_task());

    assert_eq!(status(&flow, &timer_id), NodeStatus::Succeeded);
}

#[test]
fn test_timer_start_failed() {
    let mut flow = Flow::new();
    let timer = flow.add_with_id("wait", TimerTracker::default()).unwrap();
    let mut history = History::new();
    flow.decide(&mut history.decision_task());

    history.start_timer_failed("wait");
    flow.decide(&mut history.decision_task());

    assert_eq!(flow.node(timer).unwrap().status(), NodeStatus::Failed);
}

#[test]
fn test_timer_waits_for_its_own_id() {
    let mut flow = Flow::new();
    flow.add_with_id("wait", TimerTracker::default()).unwrap();
    let mut history = History::new();
    flow.decide(&mut history.decision_task());

    let started = history.timer_started("other");
    history.timer_fired("other", started);
    let mut task = history.decision_task();
    flow.decide(&mut task);

    assert_eq!(status(&flow, "wait"), NodeStatus::Active);
    assert!(task.decisions().is_empty());
}

#[test_log::test]
fn test_failed_chain_never_schedules() {
    let mut flow = Flow::new();
    let a = flow.add_with_id("a", PassThrough::new()).unwrap();
    let b = flow.add_with_id("b", PassThrough::new()).unwrap();
    let c = flow
        .add_with_id("c", ActivityTracker::new(sum_type()))
        .unwrap();
    flow.connect(a, b).unwrap();
    flow.connect(b, c).unwrap();
    flow.set_status(a, NodeStatus::Failed).unwrap();

    let mut task = History::new().decision_task();
    flow.decide(&mut task);

    assert_eq!(status(&flow, "b"), NodeStatus::Failed);
    assert_eq!(status(&flow, "c"), NodeStatus::Failed);
    assert!(scheduled_ids(&task).is_empty());
    assert!(tracker(&flow, "c").active().is_empty());
}

#[test]
fn test_roots_activate_on_first_pass() {
    let mut flow = Flow::new();
    flow.add_with_id("wait", TimerTracker::default()).unwrap();
    flow.add_with_id("job", ActivityTracker::new(sum_type()))
        .unwrap();

    let mut task = History::new().decision_task();
    flow.decide(&mut task);

    assert_eq!(status(&flow, "wait"), NodeStatus::Active);
    assert_eq!(status(&flow, "job"), NodeStatus::Active);
    assert_eq!(scheduled_ids(&task), vec!["job-0"]);
    assert_eq!(task.decisions().len(), 2);
}

#[test]
fn test_newly_activated_nodes_decided_in_same_pass() {
    let mut flow = Flow::new();
    let a = flow.add(PassThrough::new()).unwrap();
    let b = flow.add(PassThrough::new()).unwrap();
    let sum = flow
        .add_with_id("sum", ActivityTracker::new(sum_type()))
        .unwrap();
    flow.connect(a, b).unwrap();
    flow.connect(b, sum).unwrap();
    flow.set_result(a, Some(json!(1))).unwrap();
    flow.set_result(b, Some(json!(2))).unwrap();

    let mut task = History::new().decision_task();
    flow.decide(&mut task);

    assert_eq!(scheduled_ids(&task), vec!["sum-0"]);
    assert!(matches!(
        &task.decisions()[0],
        Decision::ScheduleActivityTask { input, .. } if *input == json!([2])
    ));
}

#[test]
fn test_activation_independent_of_arrival_order() {
    let orders: [[usize; 3]; 3] = [[0, 1, 2], [2, 1, 0], [1, 2, 0]];

    for order in orders {
        let mut flow = Flow::new();
        let inputs: Vec<_> = (0..3).map(|_| flow.add(PassThrough::new()).unwrap()).collect();
        let join = flow.add_with_id("join", PassThrough::new()).unwrap();
        for input in &inputs {
            flow.connect(*input, join).unwrap();
        }

        for (step, i) in order.iter().enumerate() {
            assert_eq!(flow.node(join).unwrap().status(), NodeStatus::Inactive);
            flow.set_status(inputs[*i], NodeStatus::Succeeded).unwrap();
            if step < 2 {
                assert_eq!(flow.node(join).unwrap().status(), NodeStatus::Inactive);
            }
        }
        assert_eq!(flow.node(join).unwrap().status(), NodeStatus::Active);
    }

    for failing in 0..3 {
        let mut flow = Flow::new();
        let inputs: Vec<_> = (0..3).map(|_| flow.add(PassThrough::new()).unwrap()).collect();
        let join = flow.add_with_id("join", PassThrough::new()).unwrap();
        for input in &inputs {
            flow.connect(*input, join).unwrap();
        }

        for (i, input) in inputs.iter().enumerate() {
            let next = if i == failing {
                NodeStatus::Failed
            } else {
                NodeStatus::Succeeded
            };
            flow.set_status(*input, next).unwrap();
        }
        assert_eq!(flow.node(join).unwrap().status(), NodeStatus::Failed);
    }
}

#[test]
fn test_repeated_decide_without_new_history_is_stable() {
    let mut flow = sum_flow();
    let mut history = History::new();
    flow.decide(&mut history.decision_task());
    let scheduled = history.activity_scheduled("sum-0");
    history.push(EventAttributes::ActivityTaskStarted {
        scheduled_event_id: scheduled,
        identity: None,
    });
    flow.decide(&mut history.decision_task());
    let before = flow.freeze().unwrap();

    for _ in 0..2 {
        let mut task = history.decision_task();
        flow.decide(&mut task);
        assert!(task.decisions().is_empty());
        assert_eq!(flow.freeze().unwrap(), before);
    }
}

#[test]
fn test_redelivered_task_does_not_duplicate_outcomes() {
    let mut flow = sum_flow();
    let mut history = History::new();
    flow.decide(&mut history.decision_task());

    let scheduled = history.activity_scheduled("sum-0");
    history.activity_completed(scheduled, json!(7));
    let task = history.decision_task();

    let mut first = task.clone();
    flow.decide(&mut first);
    let after_first = flow.freeze().unwrap();

    let mut redelivered = task;
    flow.decide(&mut redelivered);

    assert_eq!(flow.freeze().unwrap(), after_first);
    assert_eq!(
        flow.node_by_id("sum").unwrap().result(),
        Some(&json!([7]))
    );
}

#[test_log::test]
fn test_interleaved_invocations_correlate_by_scheduling_event() {
    let mut flow = Flow::new();
    let mut roots = Vec::new();
    for value in [1, 2, 3] {
        let root = flow.add(PassThrough::new()).unwrap();
        flow.set_result(root, Some(json!(value))).unwrap();
        roots.push(root);
    }
    let fan = flow
        .add_with_id(
            "fan",
            ActivityTracker::new(sum_type()).with_batching(InputBatching::PerInput),
        )
        .unwrap();
    for root in &roots {
        flow.connect(*root, fan).unwrap();
    }

    let mut history = History::new();
    let mut task = history.decision_task();
    flow.decide(&mut task);
    assert_eq!(scheduled_ids(&task), vec!["fan-0", "fan-1", "fan-2"]);

    let s2 = history.activity_scheduled("fan-2");
    let s0 = history.activity_scheduled("fan-0");
    history.activity_completed(s0, json!("zero"));
    let s1 = history.activity_scheduled("fan-1");
    flow.decide(&mut history.decision_task());

    // rehydrate between deliveries, correlation state travels in the snapshot
    let mut flow = Flow::unfreeze(flow.freeze().unwrap()).unwrap();
    {
        let fan = tracker(&flow, "fan");
        assert_eq!(fan.schidmap().len(), 3);
        assert_eq!(fan.schidmap()[&s2], "fan-2");
        assert_eq!(fan.active().len(), 2);
        assert_eq!(fan.done()["fan-0"].input, json!([1]));
    }

    history.activity_failed(s1, "boom");
    history.activity_completed(s2, json!("two"));
    flow.decide(&mut history.decision_task());

    let node = flow.node_by_id("fan").unwrap();
    assert_eq!(node.status(), NodeStatus::Failed);
    assert_eq!(node.result(), Some(&json!(["zero", "two"])));

    let fan = tracker(&flow, "fan");
    assert_eq!(fan.done()["fan-2"].result, Some(json!("two")));
    assert_eq!(fan.done()["fan-2"].input, json!([3]));
    assert_eq!(fan.failed()["fan-1"].kind, EventType::ActivityTaskFailed);
    assert_eq!(fan.failed()["fan-1"].input, json!([2]));
}

#[test]
fn test_wide_fan_out_keeps_batch_order() {
    let mut flow = Flow::new();
    let fan = flow
        .add_with_id(
            "fan",
            ActivityTracker::new(sum_type()).with_batching(InputBatching::PerInput),
        )
        .unwrap();
    for value in 0..12 {
        let root = flow.add(PassThrough::new()).unwrap();
        flow.set_result(root, Some(json!(value))).unwrap();
        flow.connect(root, fan).unwrap();
    }

    let mut history = History::new();
    let mut task = history.decision_task();
    flow.decide(&mut task);
    let ids = scheduled_ids(&task);
    assert_eq!(ids.len(), 12);
    assert_eq!(ids[10], "fan-10");

    let scheduled: Vec<_> = ids.iter().map(|id| history.activity_scheduled(id)).collect();
    for (n, event_id) in scheduled.iter().enumerate() {
        history.activity_completed(*event_id, json!(format!("r{n}")));
    }
    flow.decide(&mut history.decision_task());

    let expected: Vec<_> = (0..12).map(|n| json!(format!("r{n}"))).collect();
    let node = flow.node_by_id("fan").unwrap();
    assert_eq!(node.status(), NodeStatus::Succeeded);
    assert_eq!(node.result(), Some(&Value::Array(expected)));
}

#[test]
fn test_last_outcome_in_a_delivery_wins() {
    let mut flow = sum_flow();
    let mut history = History::new();
    flow.decide(&mut history.decision_task());

    let scheduled = history.activity_scheduled("sum-0");
    history.activity_timed_out(scheduled);
    history.activity_completed(scheduled, json!(7));
    flow.decide(&mut history.decision_task());

    assert_eq!(status(&flow, "sum"), NodeStatus::Succeeded);
    assert_eq!(tracker(&flow, "sum").done()["sum-0"].result, Some(json!(7)));
}

#[test]
fn test_rejected_schedule_fails_invocation() {
    let mut flow = sum_flow();
    let mut history = History::new();
    flow.decide(&mut history.decision_task());

    history.push(EventAttributes::ScheduleActivityTaskFailed {
        activity_id: "sum-0".to_string(),
        activity_type: sum_type(),
        cause: "ACTIVITY_TYPE_DOES_NOT_EXIST".to_string(),
    });
    flow.decide(&mut history.decision_task());

    assert_eq!(status(&flow, "sum"), NodeStatus::Failed);
    assert_eq!(
        tracker(&flow, "sum").failed()["sum-0"].kind,
        EventType::ScheduleActivityTaskFailed
    );
}

#[test]
fn test_failure_downstream_of_activity() {
    let mut flow = sum_flow();
    let sum = flow.index_of("sum").unwrap();
    let after = flow.add_with_id("after", TimerTracker::default()).unwrap();
    flow.connect(sum, after).unwrap();

    let mut history = History::new();
    flow.decide(&mut history.decision_task());
    let scheduled = history.activity_scheduled("sum-0");
    history.activity_failed(scheduled, "bad input");
    let mut task = history.decision_task();
    flow.decide(&mut task);

    assert_eq!(status(&flow, "after"), NodeStatus::Failed);
    assert!(!flow.node(after).unwrap().behavior().as_timer().unwrap().fired());
    assert_eq!(task.decisions(), &[Decision::complete(json!("UNKNOWN"))]);
}

#[test]
fn test_success_feeds_results_downstream() {
    let mut flow = sum_flow();
    let sum = flow.index_of("sum").unwrap();
    let report = flow
        .add_with_id("report", ActivityTracker::new(ActivityType::new("Report", "2")))
        .unwrap();
    flow.connect(sum, report).unwrap();

    let mut history = History::new();
    flow.decide(&mut history.decision_task());
    let scheduled = history.activity_scheduled("sum-0");
    history.activity_completed(scheduled, json!(7));
    let mut task = history.decision_task();
    flow.decide(&mut task);

    assert_eq!(scheduled_ids(&task), vec!["report-0"]);
    assert!(matches!(
        &task.decisions()[0],
        Decision::ScheduleActivityTask { input, .. } if *input == json!([[7]])
    ));
}

#[test]
fn test_start_input_seeds_root() {
    let mut history = History::started_with(Some(json!({"numbers": [3, 4]})));
    let mut task = history.decision_task();

    let mut flow = Flow::new();
    let seed = flow.add_with_id("seed", PassThrough::new()).unwrap();
    let sum = flow
        .add_with_id("sum", ActivityTracker::new(sum_type()))
        .unwrap();
    flow.connect(seed, sum).unwrap();

    let input = task.start_input().unwrap().cloned().unwrap_or(Value::Null);
    flow.set_result(seed, Some(input["numbers"].clone())).unwrap();
    flow.decide(&mut task);

    assert!(matches!(
        &task.decisions()[0],
        Decision::ScheduleActivityTask { input, .. } if *input == json!([[3, 4]])
    ));
}

#[test]
fn test_canceled_input_leaves_dependent_waiting() {
    let mut flow = Flow::new();
    let wait = flow.add_with_id("wait", TimerTracker::default()).unwrap();
    let sum = flow
        .add_with_id("sum", ActivityTracker::new(sum_type()))
        .unwrap();
    flow.connect(wait, sum).unwrap();

    let mut history = History::new();
    flow.decide(&mut history.decision_task());
    flow.set_status(wait, NodeStatus::Canceled).unwrap();

    let mut task = history.decision_task();
    flow.decide(&mut task);

    assert_eq!(flow.node(sum).unwrap().status(), NodeStatus::Inactive);
    assert_eq!(task.decisions(), &[Decision::complete(json!("UNKNOWN"))]);
}

#[tokio::test]
async fn test_rehydrate_decide_respond_cycle() {
    let mut template = Flow::new();
    let wait = template.add_with_id("wait", TimerTracker::default()).unwrap();
    let sum = template
        .add_with_id("sum", ActivityTracker::new(sum_type()))
        .unwrap();
    template.connect(wait, sum).unwrap();

    let responder = InMemoryDecisionResponder::new();
    let mut history = History::new();

    // first delivery: fresh copy of the template
    let mut flow = template.copy().unwrap();
    let mut task = history.decision_task();
    flow.decide(&mut task);
    let context = serde_json::to_value(flow.freeze().unwrap()).unwrap();
    task.complete(&responder, Some(context)).await.unwrap();

    let started = history.timer_started("wait");
    history.timer_fired("wait", started);

    // second delivery: rebuild from the execution context
    let stored = responder.completed()[0].execution_context.clone().unwrap();
    let mut flow = Flow::unfreeze(FlowSnapshot::from_json(&stored).unwrap()).unwrap();
    let mut task = history.decision_task();
    flow.decide(&mut task);
    task.complete(&responder, None).await.unwrap();

    let completed = responder.completed();
    assert_eq!(completed.len(), 2);
    assert_eq!(completed[0].task_token, "token-1");
    assert!(matches!(
        &completed[0].decisions[..],
        [Decision::StartTimer { .. }]
    ));
    assert!(matches!(
        &completed[1].decisions[..],
        [Decision::ScheduleActivityTask { activity_id, .. }] if activity_id == "sum-0"
    ));

    // template untouched by the copies
    assert_eq!(template.node(wait).unwrap().status(), NodeStatus::Inactive);
}
