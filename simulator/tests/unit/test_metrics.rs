//! Metrics stream tests

use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use opslab::metrics::{MetricsInput, MetricsProfile, MetricsStream};
use opslab::sched::Timeline;

fn origin() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
}

fn timeline(profile: MetricsProfile, seed: u64) -> Timeline<MetricsStream> {
    Timeline::new(MetricsStream::with_seed(profile, seed, origin()).unwrap(), origin())
}

#[test]
fn test_metrics_stay_within_bounds() {
    let profile = MetricsProfile::default();
    for seed in 0..20 {
        let mut tl = timeline(profile.clone(), seed);
        tl.send(MetricsInput::Start);

        for _ in 0..200 {
            tl.advance(profile.tick_interval);
            let sample = tl.snapshot().sample;
            assert!(profile.cpu.contains(sample.cpu), "cpu {}", sample.cpu);
            assert!(profile.memory.contains(sample.memory), "memory {}", sample.memory);
            assert!(
                profile.requests_per_sec.contains(sample.requests_per_sec),
                "rps {}",
                sample.requests_per_sec
            );
            assert!(
                profile.error_rate.contains(sample.error_rate),
                "error rate {}",
                sample.error_rate
            );
        }
        assert_eq!(tl.snapshot().ticks, 200);
    }
}

#[test]
fn test_same_seed_same_stream() {
    let run = |seed| {
        let mut tl = timeline(MetricsProfile::default(), seed);
        tl.send(MetricsInput::Start);
        tl.advance(Duration::from_secs(30));
        tl.snapshot().sample
    };
    assert_eq!(run(5), run(5));
}

#[test]
fn test_alert_follows_rule_every_tick() {
    let profile = MetricsProfile {
        spike_probability: 0.0,
        ..Default::default()
    };
    let mut tl = timeline(profile.clone(), 9);
    tl.send(MetricsInput::Start);

    for _ in 0..100 {
        tl.advance(profile.tick_interval);
        let snapshot = tl.snapshot();
        assert_eq!(
            snapshot.alert_active,
            profile.thresholds.is_breached(&snapshot.sample)
        );
    }
}

#[test]
fn test_incident_asserts_alert_then_restores_baseline() {
    let profile = MetricsProfile::default();
    let mut tl = timeline(profile.clone(), 1);

    assert!(tl.send(MetricsInput::InjectIncident));
    let during = tl.snapshot();
    assert!(during.alert_active);
    assert!(during.incident_active);
    assert_eq!(during.sample.levels(), profile.incident);

    tl.advance(profile.incident_duration - Duration::from_millis(1));
    assert!(tl.snapshot().alert_active);

    tl.advance(Duration::from_millis(1));
    let after = tl.snapshot();
    assert!(!after.incident_active);
    assert!(!after.alert_active);
    assert_eq!(after.sample.levels(), profile.baseline);
    assert_eq!(after.log.iter().filter(|e| e.message.starts_with("ALERT")).count(), 1);
}

#[test]
fn test_incident_holds_alert_while_streaming() {
    let profile = MetricsProfile {
        spike_probability: 0.0,
        ..Default::default()
    };
    let mut tl = timeline(profile.clone(), 4);
    tl.send(MetricsInput::Start);
    tl.advance(Duration::from_millis(3500));
    tl.send(MetricsInput::InjectIncident);

    for _ in 0..4 {
        tl.advance(Duration::from_secs(1));
        assert!(tl.snapshot().alert_active);
        assert!(tl.snapshot().incident_active);
    }

    // the tick at 8s lands before the incident ends at 8.5s
    tl.advance(Duration::from_secs(1));
    let snapshot = tl.snapshot();
    assert!(!snapshot.incident_active);
    assert_eq!(snapshot.sample.levels(), profile.baseline);
}

#[test]
fn test_second_incident_extends_window() {
    let profile = MetricsProfile::default();
    let mut tl = timeline(profile.clone(), 2);

    tl.send(MetricsInput::InjectIncident);
    tl.advance(Duration::from_secs(3));
    tl.send(MetricsInput::InjectIncident);

    // the first incident's timer is stale now
    tl.advance(Duration::from_secs(3));
    assert!(tl.snapshot().incident_active);

    tl.advance(Duration::from_secs(2));
    assert!(!tl.snapshot().incident_active);
    assert_eq!(tl.snapshot().sample.levels(), profile.baseline);
}

#[test]
fn test_stop_cancels_pending_tick() {
    let profile = MetricsProfile::default();
    let mut tl = timeline(profile.clone(), 3);
    tl.send(MetricsInput::Start);
    tl.advance(Duration::from_millis(2500));
    assert_eq!(tl.snapshot().ticks, 2);

    assert!(tl.send(MetricsInput::Stop));
    tl.advance(Duration::from_secs(10));
    assert_eq!(tl.snapshot().ticks, 2);
    assert!(!tl.snapshot().streaming);

    // restarting does not revive the old tick chain
    tl.send(MetricsInput::Start);
    tl.advance(Duration::from_secs(3));
    assert_eq!(tl.snapshot().ticks, 5);
}

#[test]
fn test_spikes_raise_alerts_eventually() {
    let profile = MetricsProfile::default();
    let mut tl = timeline(profile, 21);
    tl.send(MetricsInput::Start);
    tl.advance(Duration::from_secs(300));

    let snapshot = tl.snapshot();
    assert!(snapshot.log.iter().any(|e| e.message.starts_with("ALERT")));
}
