//! Pipeline sequencer tests

use std::time::Duration;

use chrono::{TimeZone, Utc};
use opslab::eventlog::EntryLevel;
use opslab::pipeline::{
    default_stages, PipelineInput, RunPhase, Stage, StageSequencer, StageStatus,
    DEFAULT_STAGE_DURATION,
};
use opslab::sched::Timeline;

fn timeline(stages: Vec<Stage>) -> Timeline<StageSequencer> {
    let origin = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
    Timeline::new(StageSequencer::new(stages).unwrap(), origin)
}

fn numbered_stages(n: usize) -> Vec<Stage> {
    (0..n)
        .map(|i| Stage::new(format!("s{i}"), format!("Stage {i}"), Duration::from_millis(100)))
        .collect()
}

fn start(fault: Option<&str>) -> PipelineInput {
    PipelineInput::Start {
        fault_stage_id: fault.map(str::to_string),
    }
}

#[test]
fn test_pipeline_runs_to_success() {
    for n in 1..=8 {
        let mut tl = timeline(numbered_stages(n));
        assert!(tl.send(start(None)));
        tl.run_until_idle(100);

        let snapshot = tl.snapshot();
        assert_eq!(snapshot.phase, RunPhase::Succeeded);
        assert!(snapshot.statuses().iter().all(|s| *s == StageStatus::Success));
        assert!(!snapshot.rollback_active);

        let log = tl.machine().log();
        assert_eq!(log.count_containing("- Success"), n);
        assert_eq!(log.count_containing("Pipeline completed successfully!"), 1);
        assert_eq!(tl.elapsed(), Duration::from_millis(100 * n as u64));
    }
}

#[test]
fn test_fault_stops_pipeline_and_skips_the_rest() {
    for n in 1..=6 {
        for k in 0..n {
            let mut tl = timeline(numbered_stages(n));
            let fault = format!("s{k}");
            tl.send(start(Some(&fault)));
            tl.run_until_idle(100);

            let snapshot = tl.snapshot();
            let statuses = snapshot.statuses();
            assert!(statuses[..k].iter().all(|s| *s == StageStatus::Success));
            assert_eq!(statuses[k], StageStatus::Error);
            assert!(statuses[k + 1..].iter().all(|s| *s == StageStatus::Skipped));
            assert!(snapshot.rollback_active);
            assert_eq!(snapshot.phase, RunPhase::Failed { index: k });

            // no later stage ever ran
            assert_eq!(tl.machine().log().count_containing("- Running..."), k + 1);
        }
    }
}

#[test]
fn test_six_stage_pipeline_fails_at_test() {
    let mut tl = timeline(default_stages(DEFAULT_STAGE_DURATION));
    tl.send(start(Some("test")));

    // commit and build finish, test is dwelling
    tl.advance(Duration::from_millis(3100));
    let mid = tl.snapshot();
    assert_eq!(mid.current_stage(), Some(2));
    assert_eq!(mid.stages[2].status, StageStatus::Running);

    tl.advance(Duration::from_millis(1500));
    let snapshot = tl.snapshot();
    assert_eq!(
        snapshot.statuses(),
        vec![
            StageStatus::Success,
            StageStatus::Success,
            StageStatus::Error,
            StageStatus::Skipped,
            StageStatus::Skipped,
            StageStatus::Skipped,
        ]
    );
    assert!(snapshot.rollback_active);
    assert_eq!(tl.pending(), 0);

    let log = tl.machine().log();
    assert_eq!(log.count_containing("FAILED"), 1);
    assert_eq!(log.count_containing("rollback"), 1);
    assert_eq!(log.count_containing("Pipeline stopped due to test failure."), 1);
    let failed = log
        .entries()
        .iter()
        .find(|e| e.message.contains("FAILED"))
        .unwrap();
    assert_eq!(failed.level, EntryLevel::Error);
}

#[test]
fn test_reset_after_any_run_returns_to_pending() {
    for fault in [None, Some("deploy")] {
        let mut tl = timeline(default_stages(DEFAULT_STAGE_DURATION));
        tl.send(start(fault));
        tl.run_until_idle(100);

        assert!(tl.send(PipelineInput::Reset));
        let snapshot = tl.snapshot();
        assert!(snapshot.statuses().iter().all(|s| *s == StageStatus::Pending));
        assert!(!snapshot.rollback_active);
        assert_eq!(snapshot.phase, RunPhase::Idle);
        assert!(snapshot.log.is_empty());
    }
}

#[test]
fn test_overlapping_start_and_reset_are_noops() {
    let mut tl = timeline(default_stages(DEFAULT_STAGE_DURATION));
    tl.send(start(None));
    tl.advance(Duration::from_millis(2000));

    assert!(!tl.send(start(Some("build"))));
    assert!(!tl.send(PipelineInput::Reset));
    assert_eq!(tl.pending(), 1);

    tl.run_until_idle(100);
    assert_eq!(tl.snapshot().phase, RunPhase::Succeeded);
}

#[test]
fn test_new_run_clears_previous_failure() {
    let mut tl = timeline(default_stages(DEFAULT_STAGE_DURATION));
    tl.send(start(Some("build")));
    tl.run_until_idle(100);
    assert!(tl.snapshot().rollback_active);

    tl.send(start(None));
    let snapshot = tl.snapshot();
    assert!(!snapshot.rollback_active);
    assert_eq!(snapshot.stages[0].status, StageStatus::Running);
    assert!(snapshot.stages[1..].iter().all(|s| s.status == StageStatus::Pending));
    assert_eq!(snapshot.log.len(), 2);

    tl.run_until_idle(100);
    assert_eq!(tl.snapshot().phase, RunPhase::Succeeded);
}

#[test]
fn test_unknown_fault_stage_completes() {
    let mut tl = timeline(default_stages(DEFAULT_STAGE_DURATION));
    tl.send(start(Some("nope")));
    tl.run_until_idle(100);

    assert_eq!(tl.snapshot().phase, RunPhase::Succeeded);
    assert!(!tl.snapshot().rollback_active);
}

#[test]
fn test_log_timestamps_follow_dwell_times() {
    let mut tl = timeline(default_stages(DEFAULT_STAGE_DURATION));
    tl.send(start(None));
    tl.run_until_idle(100);

    let entries = tl.machine().log().entries();
    assert!(entries.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    let first = entries.first().unwrap().timestamp;
    let last = entries.last().unwrap().timestamp;
    assert_eq!((last - first).num_milliseconds(), 9000);
}
