//! Auto-scaling controller tests

use std::time::Duration;

use chrono::{TimeZone, Utc};
use opslab::scaling::{
    AutoScaleController, ScalingInput, ScalingPolicy, ScalingState, MAX_SERVERS, MIN_SERVERS,
};
use opslab::sched::Timeline;

fn timeline(initial: ScalingState, seed: u64) -> Timeline<AutoScaleController> {
    let origin = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
    let controller =
        AutoScaleController::with_seed(ScalingPolicy::default(), initial, seed).unwrap();
    Timeline::new(controller, origin)
}

#[test]
fn test_repeated_high_traffic_converges_to_max() {
    let mut tl = timeline(ScalingState::default(), 1);
    tl.send(ScalingInput::SetAutoMode(true));

    for _ in 0..20 {
        tl.send(ScalingInput::SetTrafficLevel(100));
        let count = tl.snapshot().state.server_count;
        assert!((MIN_SERVERS..=MAX_SERVERS).contains(&count));
    }
    assert_eq!(tl.snapshot().state.server_count, MAX_SERVERS);
}

#[test]
fn test_repeated_low_traffic_converges_to_min() {
    let initial = ScalingState {
        server_count: 8,
        ..Default::default()
    };
    let mut tl = timeline(initial, 1);
    tl.send(ScalingInput::SetAutoMode(true));

    for _ in 0..20 {
        tl.send(ScalingInput::SetTrafficLevel(10));
        let count = tl.snapshot().state.server_count;
        assert!((MIN_SERVERS..=MAX_SERVERS).contains(&count));
    }
    assert_eq!(tl.snapshot().state.server_count, MIN_SERVERS);
}

#[test]
fn test_dead_band_holds() {
    let mut tl = timeline(ScalingState::default(), 1);
    tl.send(ScalingInput::SetAutoMode(true));

    for traffic in 30..=80 {
        tl.send(ScalingInput::SetTrafficLevel(traffic));
        tl.advance(Duration::from_secs(5));
    }
    assert_eq!(tl.snapshot().state.server_count, 2);
}

#[test]
fn test_every_traffic_level_keeps_bounds() {
    let mut tl = timeline(ScalingState::default(), 8);
    tl.send(ScalingInput::SetAutoMode(true));

    for round in 0..5 {
        for traffic in (0..=120).step_by(7) {
            let level = if round % 2 == 0 { traffic } else { 120 - traffic };
            tl.send(ScalingInput::SetTrafficLevel(level));
            tl.advance(Duration::from_millis(700));
            let count = tl.snapshot().state.server_count;
            assert!((MIN_SERVERS..=MAX_SERVERS).contains(&count));
        }
    }
}

#[test]
fn test_recurring_evaluation_scales_over_time() {
    let mut tl = timeline(ScalingState::default(), 1);
    tl.send(ScalingInput::SetTrafficLevel(95));
    assert_eq!(tl.snapshot().state.server_count, 2);

    // enabling evaluates once right away
    tl.send(ScalingInput::SetAutoMode(true));
    assert_eq!(tl.snapshot().state.server_count, 3);

    tl.advance(Duration::from_secs(2));
    assert_eq!(tl.snapshot().state.server_count, 4);

    tl.advance(Duration::from_secs(60));
    assert_eq!(tl.snapshot().state.server_count, MAX_SERVERS);

    tl.send(ScalingInput::SetAutoMode(false));
    tl.send(ScalingInput::SetTrafficLevel(10));
    tl.advance(Duration::from_secs(60));
    assert_eq!(tl.snapshot().state.server_count, MAX_SERVERS);
    assert_eq!(tl.pending(), 0);
}

#[test]
fn test_load_per_server_view() {
    let mut tl = timeline(ScalingState::default(), 1);
    tl.send(ScalingInput::SetTrafficLevel(100));

    let snapshot = tl.snapshot();
    assert_eq!(snapshot.load_per_server, 50);
    assert_eq!(snapshot.servers.len(), 2);
    assert!(snapshot.servers.iter().all(|s| s.load_percent == 50 && !s.overloaded));

    tl.send(ScalingInput::ScaleDown);
    let snapshot = tl.snapshot();
    assert_eq!(snapshot.load_per_server, 100);
    assert!(snapshot.servers[0].overloaded);
}

#[test]
fn test_failure_clears_after_duration() {
    let initial = ScalingState {
        server_count: 5,
        ..Default::default()
    };
    for seed in 0..10 {
        let mut tl = timeline(initial, seed);
        tl.send(ScalingInput::SimulateFailure);

        let failed = tl.snapshot().state.failed_server.unwrap();
        assert!((1..=5).contains(&failed));
        assert_eq!(tl.snapshot().state.server_count, 5);

        tl.advance(Duration::from_millis(2999));
        assert_eq!(tl.snapshot().state.failed_server, Some(failed));

        tl.advance(Duration::from_millis(1));
        assert_eq!(tl.snapshot().state.failed_server, None);
        assert_eq!(tl.snapshot().state.server_count, 5);
    }
}

#[test]
fn test_new_failure_supersedes_old_timer() {
    let initial = ScalingState {
        server_count: 4,
        ..Default::default()
    };
    let mut tl = timeline(initial, 2);
    tl.send(ScalingInput::SimulateFailure);
    tl.advance(Duration::from_secs(2));
    tl.send(ScalingInput::SimulateFailure);

    tl.advance(Duration::from_secs(2));
    assert!(tl.snapshot().state.failed_server.is_some());

    tl.advance(Duration::from_secs(1));
    assert!(tl.snapshot().state.failed_server.is_none());
}

#[test]
fn test_decisions_are_narrated() {
    let mut tl = timeline(ScalingState::default(), 1);
    tl.send(ScalingInput::SetAutoMode(true));
    tl.send(ScalingInput::SetTrafficLevel(90));

    let log = tl.machine().log();
    assert_eq!(log.count_containing("Auto-scaled up to 3 servers"), 1);
}
