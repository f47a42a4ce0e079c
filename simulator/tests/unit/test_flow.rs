//! Request flow animator tests

use std::time::Duration;

use chrono::{TimeZone, Utc};
use opslab::flow::{
    default_components, FlowInput, FlowNode, FlowTimings, Pass, RequestFlowAnimator,
};
use opslab::sched::Timeline;

fn timeline(nodes: Vec<FlowNode>) -> Timeline<RequestFlowAnimator> {
    let origin = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
    Timeline::new(
        RequestFlowAnimator::new(nodes, FlowTimings::default()).unwrap(),
        origin,
    )
}

/// Run a traversal to the end, recording the cursor after every transition
fn record(tl: &mut Timeline<RequestFlowAnimator>) -> Vec<i64> {
    let mut cursors = vec![tl.snapshot().cursor];
    while tl.step().is_some() {
        cursors.push(tl.snapshot().cursor);
    }
    cursors
}

#[test]
fn test_seven_nodes_visit_fourteen_steps() {
    let mut tl = timeline(default_components());
    assert_eq!(tl.snapshot().cursor, -1);
    assert!(tl.send(FlowInput::Run));

    let cursors = record(&mut tl);
    let expected: Vec<i64> = (0..14).chain(std::iter::once(-1)).collect();
    assert_eq!(cursors, expected);

    let snapshot = tl.snapshot();
    assert!(!snapshot.running);
    assert_eq!(snapshot.completed_runs, 1);
    assert_eq!(tl.delivered(), 14);

    // 7 forward dwells of 1.2s and 7 backward dwells of 0.8s
    assert_eq!(tl.elapsed(), Duration::from_millis(7 * 1200 + 7 * 800));
}

#[test]
fn test_backward_pass_highlights_in_reverse() {
    let nodes = default_components();
    let mut tl = timeline(nodes.clone());
    tl.send(FlowInput::Run);

    let mut response_order = Vec::new();
    while tl.step().is_some() {
        let snapshot = tl.snapshot();
        if let (Some(h), Some(node)) = (snapshot.highlight, snapshot.highlighted) {
            if h.pass == Pass::Response {
                response_order.push(node.id);
            }
        }
    }

    let expected: Vec<String> = nodes.into_iter().rev().map(|n| n.id).collect();
    assert_eq!(response_order, expected);
}

#[test]
fn test_single_node_runs_two_steps() {
    let mut tl = timeline(vec![FlowNode::new("only", "Only")]);
    tl.send(FlowInput::Run);

    let snapshot = tl.snapshot();
    assert_eq!(snapshot.highlight.map(|h| h.pass), Some(Pass::Request));

    tl.step();
    let snapshot = tl.snapshot();
    assert_eq!(snapshot.cursor, 1);
    assert_eq!(snapshot.highlight.map(|h| (h.pass, h.node)), Some((Pass::Response, 0)));

    tl.step();
    assert_eq!(tl.snapshot().cursor, -1);
    assert_eq!(tl.snapshot().completed_runs, 1);
}

#[test]
fn test_run_while_running_is_ignored() {
    let mut tl = timeline(default_components());
    tl.send(FlowInput::Run);
    tl.advance(Duration::from_millis(3000));
    let cursor = tl.snapshot().cursor;

    assert!(!tl.send(FlowInput::Run));
    assert_eq!(tl.snapshot().cursor, cursor);
    assert_eq!(tl.pending(), 1);
}

#[test]
fn test_cancel_discards_pending_step() {
    let mut tl = timeline(default_components());
    tl.send(FlowInput::Run);
    tl.advance(Duration::from_millis(2500));
    assert_eq!(tl.snapshot().cursor, 2);

    assert!(tl.send(FlowInput::Cancel));
    assert_eq!(tl.snapshot().cursor, -1);

    tl.advance(Duration::from_secs(30));
    assert_eq!(tl.snapshot().cursor, -1);
    assert_eq!(tl.snapshot().completed_runs, 0);

    // a fresh run starts from the top
    assert!(tl.send(FlowInput::Run));
    assert_eq!(record(&mut tl).len(), 15);
    assert_eq!(tl.snapshot().completed_runs, 1);
}
