//! Live synthetic metrics with threshold alerting

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::SimError;
use crate::eventlog::{LogEntry, SimulationLog};
use crate::metrics::health::{self, ServiceHealth};
use crate::metrics::profile::{MetricSample, MetricsProfile};
use crate::metrics::walk;
use crate::sched::{Machine, Outcome};

/// Metrics stream input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricsInput {
    /// Begin ticking on the profile's cadence
    Start,

    /// Stop ticking; pending ticks become stale
    Stop,

    /// Periodic tick belonging to streaming session `generation`
    Tick { generation: u64 },

    /// Force crisis levels for the incident duration
    InjectIncident,

    /// Incident `incident` has run its course
    IncidentElapsed { incident: u64 },
}

/// Read-only view of the stream
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub sample: MetricSample,
    pub alert_active: bool,
    pub incident_active: bool,
    pub streaming: bool,
    pub ticks: u64,
    pub services: Vec<ServiceHealth>,
    pub log: Vec<LogEntry>,
}

/// Random-walk metrics generator.
///
/// The alert is asserted while any threshold is breached, on the tick of an
/// error spike, and for the whole of an injected incident. It clears on its
/// own once none of those hold.
pub struct MetricsStream {
    profile: MetricsProfile,
    sample: MetricSample,
    alert_active: bool,
    streaming: bool,
    generation: u64,
    active_incident: Option<u64>,
    incidents: u64,
    ticks: u64,
    rng: StdRng,
    log: SimulationLog,
}

impl MetricsStream {
    /// Create a stream at the profile baseline, drawing noise from `rng`
    pub fn new(profile: MetricsProfile, rng: StdRng, now: DateTime<Utc>) -> Result<Self, SimError> {
        profile.validate()?;
        let sample = MetricSample::at(profile.baseline, now);

        Ok(Self {
            profile,
            sample,
            alert_active: false,
            streaming: false,
            generation: 0,
            active_incident: None,
            incidents: 0,
            ticks: 0,
            rng,
            log: SimulationLog::new(),
        })
    }

    /// Reproducible stream
    pub fn with_seed(profile: MetricsProfile, seed: u64, now: DateTime<Utc>) -> Result<Self, SimError> {
        Self::new(profile, StdRng::seed_from_u64(seed), now)
    }

    pub fn profile(&self) -> &MetricsProfile {
        &self.profile
    }

    pub fn sample(&self) -> &MetricSample {
        &self.sample
    }

    pub fn alert_active(&self) -> bool {
        self.alert_active
    }

    pub fn incident_active(&self) -> bool {
        self.active_incident.is_some()
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    pub fn log(&self) -> &SimulationLog {
        &self.log
    }

    /// Advance every metric by one walk step and recompute the alert
    pub fn tick(&mut self, now: DateTime<Utc>) {
        let profile = &self.profile;
        let rng = &mut self.rng;

        let cpu = walk::step(rng, self.sample.cpu, &profile.cpu);
        let memory = walk::step(rng, self.sample.memory, &profile.memory);
        let requests_per_sec =
            walk::step(rng, self.sample.requests_per_sec, &profile.requests_per_sec);
        let mut error_rate = walk::step(rng, self.sample.error_rate, &profile.error_rate);

        let spiked = rng.random_bool(profile.spike_probability);
        if spiked {
            error_rate = walk::bump(error_rate, profile.spike_amount, &profile.error_rate);
        } else {
            error_rate = walk::decay(error_rate, profile.decay_amount, &profile.error_rate);
        }

        self.sample = MetricSample {
            cpu,
            memory,
            requests_per_sec,
            error_rate,
            timestamp: now,
        };
        self.ticks += 1;

        if spiked {
            debug!("Error spike on tick {}: {:.1}%", self.ticks, error_rate);
        }
        self.refresh_alert(spiked, now);
    }

    fn inject_incident(&mut self, now: DateTime<Utc>) -> Outcome<MetricsInput> {
        self.incidents += 1;
        let incident = self.incidents;
        self.active_incident = Some(incident);
        self.sample = MetricSample::at(self.profile.incident, now);

        warn!("Incident {} injected for {:?}", incident, self.profile.incident_duration);
        self.log.error(now, "Incident injected: system under stress");
        self.refresh_alert(false, now);

        Outcome::after(
            self.profile.incident_duration,
            MetricsInput::IncidentElapsed { incident },
        )
    }

    fn resolve_incident(&mut self, now: DateTime<Utc>) -> Outcome<MetricsInput> {
        self.active_incident = None;
        self.sample = MetricSample::at(self.profile.baseline, now);

        info!("Incident resolved, metrics restored to baseline");
        self.log.info(now, "Incident resolved, metrics back to baseline");
        self.refresh_alert(false, now);
        Outcome::done()
    }

    fn refresh_alert(&mut self, spiked: bool, now: DateTime<Utc>) {
        let breaches = self.profile.thresholds.breaches(&self.sample);
        let active = !breaches.is_empty() || spiked || self.active_incident.is_some();

        match (self.alert_active, active) {
            (false, true) => {
                let reason = if breaches.is_empty() {
                    "error spike detected".to_string()
                } else {
                    breaches.join(", ")
                };
                warn!("Alert raised: {}", reason);
                self.log.error(now, format!("ALERT: {}", reason));
            }
            (true, false) => {
                info!("Alert cleared");
                self.log.info(now, "Alert cleared");
            }
            _ => {}
        }
        self.alert_active = active;
    }
}

impl Machine for MetricsStream {
    type Input = MetricsInput;
    type Snapshot = MetricsSnapshot;

    fn name(&self) -> &'static str {
        "metrics"
    }

    fn dispatch(&mut self, input: MetricsInput, now: DateTime<Utc>) -> Outcome<MetricsInput> {
        match input {
            MetricsInput::Start if self.streaming => Outcome::ignored("already streaming"),
            MetricsInput::Start => {
                self.streaming = true;
                self.generation += 1;
                info!("Metrics stream started");
                Outcome::after(
                    self.profile.tick_interval,
                    MetricsInput::Tick {
                        generation: self.generation,
                    },
                )
            }

            MetricsInput::Stop if !self.streaming => Outcome::ignored("not streaming"),
            MetricsInput::Stop => {
                self.streaming = false;
                info!("Metrics stream stopped after {} ticks", self.ticks);
                Outcome::done()
            }

            MetricsInput::Tick { generation } if self.streaming && generation == self.generation => {
                self.tick(now);
                Outcome::after(self.profile.tick_interval, MetricsInput::Tick { generation })
            }
            MetricsInput::Tick { .. } => Outcome::ignored("stale tick"),

            MetricsInput::InjectIncident => self.inject_incident(now),

            MetricsInput::IncidentElapsed { incident } if self.active_incident == Some(incident) => {
                self.resolve_incident(now)
            }
            MetricsInput::IncidentElapsed { .. } => Outcome::ignored("stale incident timer"),
        }
    }

    fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            sample: self.sample,
            alert_active: self.alert_active,
            incident_active: self.active_incident.is_some(),
            streaming: self.streaming,
            ticks: self.ticks,
            services: health::project(&self.sample, &self.profile.thresholds),
            log: self.log.entries().to_vec(),
        }
    }
}
