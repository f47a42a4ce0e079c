//! Auto-scaling control loop

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::SimError;
use crate::eventlog::{LogEntry, SimulationLog};
use crate::scaling::policy::{
    clamp_servers, clamp_traffic, load_per_server, ScalingDecision, ScalingPolicy, MAX_SERVERS,
    MIN_SERVERS,
};
use crate::sched::{Machine, Outcome};

/// Scaling input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalingInput {
    /// New traffic percent; clamped to [10, 100]
    SetTrafficLevel(u32),

    SetAutoMode(bool),

    /// Manual add, only outside auto mode
    ScaleUp,

    /// Manual remove, only outside auto mode
    ScaleDown,

    /// Mark a random live server as failed for a while
    SimulateFailure,

    /// Recurring auto-mode evaluation for session `generation`
    Evaluate { generation: u64 },

    /// Failure `failure` is over
    FailureElapsed { failure: u64 },
}

/// Fleet state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingState {
    /// Always within [1, 8]
    pub server_count: u8,
    pub auto_mode: bool,

    /// 1-based index of the server shown as failed
    pub failed_server: Option<u8>,

    /// Percent, within [10, 100]
    pub traffic_level: u8,
}

impl Default for ScalingState {
    fn default() -> Self {
        Self {
            server_count: 2,
            auto_mode: false,
            failed_server: None,
            traffic_level: 50,
        }
    }
}

/// One server slot as the dashboard draws it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerUnit {
    pub index: u8,
    pub failed: bool,
    pub load_percent: u32,
    pub overloaded: bool,
}

/// Read-only view of the fleet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalingSnapshot {
    pub state: ScalingState,
    pub load_per_server: u32,
    pub servers: Vec<ServerUnit>,
    pub log: Vec<LogEntry>,
}

/// Maps traffic to a server count with hysteresis. Failures never change the
/// count; they only flag one server for a bounded time.
pub struct AutoScaleController {
    policy: ScalingPolicy,
    state: ScalingState,
    generation: u64,
    failures: u64,
    active_failure: Option<u64>,
    rng: StdRng,
    log: SimulationLog,
}

impl AutoScaleController {
    pub fn new(policy: ScalingPolicy, initial: ScalingState, rng: StdRng) -> Result<Self, SimError> {
        policy.validate()?;
        let state = ScalingState {
            server_count: clamp_servers(u32::from(initial.server_count)),
            auto_mode: false,
            failed_server: None,
            traffic_level: clamp_traffic(u32::from(initial.traffic_level)),
        };

        Ok(Self {
            policy,
            state,
            generation: 0,
            failures: 0,
            active_failure: None,
            rng,
            log: SimulationLog::new(),
        })
    }

    pub fn with_seed(policy: ScalingPolicy, initial: ScalingState, seed: u64) -> Result<Self, SimError> {
        Self::new(policy, initial, StdRng::seed_from_u64(seed))
    }

    pub fn state(&self) -> &ScalingState {
        &self.state
    }

    pub fn log(&self) -> &SimulationLog {
        &self.log
    }

    pub fn load_per_server(&self) -> u32 {
        load_per_server(self.state.traffic_level, self.state.server_count)
    }

    pub fn servers(&self) -> Vec<ServerUnit> {
        let load = self.load_per_server();
        (1..=self.state.server_count)
            .map(|index| ServerUnit {
                index,
                failed: self.state.failed_server == Some(index),
                load_percent: load,
                overloaded: load > 80,
            })
            .collect()
    }

    fn evaluate(&mut self, now: DateTime<Utc>) {
        let decision = self
            .policy
            .decide(self.state.traffic_level, self.state.server_count);
        debug!(
            "Scaling evaluation: traffic {}%, {} servers -> {:?}",
            self.state.traffic_level, self.state.server_count, decision
        );

        match decision {
            ScalingDecision::ScaleUp => self.resize(self.state.server_count + 1, "Auto-scaled up", now),
            ScalingDecision::ScaleDown => {
                self.resize(self.state.server_count - 1, "Auto-scaled down", now)
            }
            ScalingDecision::Hold => {}
        }
    }

    fn resize(&mut self, count: u8, action: &str, now: DateTime<Utc>) {
        self.state.server_count = clamp_servers(u32::from(count));

        if let Some(failed) = self.state.failed_server {
            if failed > self.state.server_count {
                self.state.failed_server = None;
                self.active_failure = None;
            }
        }

        info!(
            "{} to {} servers at {}% traffic",
            action, self.state.server_count, self.state.traffic_level
        );
        self.log.info(
            now,
            format!(
                "{} to {} servers ({}% traffic, {}% per server)",
                action,
                self.state.server_count,
                self.state.traffic_level,
                self.load_per_server()
            ),
        );
    }

    fn simulate_failure(&mut self, now: DateTime<Utc>) -> Outcome<ScalingInput> {
        let server = self.rng.random_range(1..=self.state.server_count);
        self.failures += 1;
        let failure = self.failures;
        self.active_failure = Some(failure);
        self.state.failed_server = Some(server);

        warn!("Server {} failed, traffic rerouted", server);
        self.log.warn(
            now,
            format!("Server {} failed! Traffic rerouted to healthy servers.", server),
        );
        Outcome::after(
            self.policy.failure_duration,
            ScalingInput::FailureElapsed { failure },
        )
    }
}

impl Machine for AutoScaleController {
    type Input = ScalingInput;
    type Snapshot = ScalingSnapshot;

    fn name(&self) -> &'static str {
        "scaling"
    }

    fn dispatch(&mut self, input: ScalingInput, now: DateTime<Utc>) -> Outcome<ScalingInput> {
        match input {
            ScalingInput::SetTrafficLevel(percent) => {
                self.state.traffic_level = clamp_traffic(percent);
                if self.state.auto_mode {
                    self.evaluate(now);
                }
                Outcome::done()
            }

            ScalingInput::SetAutoMode(on) if on == self.state.auto_mode => {
                Outcome::ignored("auto mode unchanged")
            }
            ScalingInput::SetAutoMode(on) => {
                self.state.auto_mode = on;
                self.generation += 1;
                info!("Auto-scaling {}", if on { "enabled" } else { "disabled" });
                if !on {
                    return Outcome::done();
                }
                self.evaluate(now);
                Outcome::after(
                    self.policy.evaluate_interval,
                    ScalingInput::Evaluate {
                        generation: self.generation,
                    },
                )
            }

            ScalingInput::ScaleUp | ScalingInput::ScaleDown if self.state.auto_mode => {
                Outcome::ignored("manual scaling is disabled in auto mode")
            }
            ScalingInput::ScaleUp if self.state.server_count >= MAX_SERVERS => {
                Outcome::ignored("already at maximum servers")
            }
            ScalingInput::ScaleUp => {
                self.resize(self.state.server_count + 1, "Scaled up", now);
                Outcome::done()
            }
            ScalingInput::ScaleDown if self.state.server_count <= MIN_SERVERS => {
                Outcome::ignored("already at minimum servers")
            }
            ScalingInput::ScaleDown => {
                self.resize(self.state.server_count - 1, "Scaled down", now);
                Outcome::done()
            }

            ScalingInput::SimulateFailure => self.simulate_failure(now),

            ScalingInput::Evaluate { generation }
                if self.state.auto_mode && generation == self.generation =>
            {
                self.evaluate(now);
                Outcome::after(self.policy.evaluate_interval, ScalingInput::Evaluate { generation })
            }
            ScalingInput::Evaluate { .. } => Outcome::ignored("stale evaluation"),

            ScalingInput::FailureElapsed { failure } if self.active_failure == Some(failure) => {
                if let Some(server) = self.state.failed_server.take() {
                    info!("Server {} recovered", server);
                    self.log.info(now, format!("Server {} recovered", server));
                }
                self.active_failure = None;
                Outcome::done()
            }
            ScalingInput::FailureElapsed { .. } => Outcome::ignored("stale failure timer"),
        }
    }

    fn snapshot(&self) -> ScalingSnapshot {
        ScalingSnapshot {
            state: self.state,
            load_per_server: self.load_per_server(),
            servers: self.servers(),
            log: self.log.entries().to_vec(),
        }
    }
}
