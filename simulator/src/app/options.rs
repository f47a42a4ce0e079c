//! Application configuration options

use std::time::Duration;

use crate::flow::FlowTimings;
use crate::metrics::MetricsProfile;
use crate::scaling::{ScalingPolicy, ScalingState};
use crate::settings::Settings;

/// Main application options
#[derive(Debug, Clone)]
pub struct SimOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Fixed RNG seed; drawn from the OS when unset
    pub seed: Option<u64>,

    /// Dwell time of every pipeline stage
    pub stage_duration: Duration,

    /// Stage the scripted run fails at
    pub fault_stage: Option<String>,

    /// Metrics generator profile
    pub metrics: MetricsProfile,

    /// Scaling policy
    pub scaling: ScalingPolicy,

    /// Fleet at startup
    pub initial_fleet: ScalingState,

    /// Request flow step timings
    pub flow: FlowTimings,

    /// Print narration to the console
    pub narrate: bool,
}

impl Default for SimOptions {
    fn default() -> Self {
        Self {
            lifecycle: LifecycleOptions::default(),
            seed: None,
            stage_duration: Duration::from_millis(1500),
            fault_stage: None,
            metrics: MetricsProfile::default(),
            scaling: ScalingPolicy::default(),
            initial_fleet: ScalingState::default(),
            flow: FlowTimings::default(),
            narrate: true,
        }
    }
}

impl SimOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        let defaults = Self::default();

        Self {
            lifecycle: LifecycleOptions {
                max_runtime: Duration::from_secs(settings.demo.duration_secs),
                ..defaults.lifecycle
            },
            seed: settings.seed,
            stage_duration: Duration::from_millis(settings.pipeline.stage_duration_ms),
            fault_stage: settings.pipeline.fault_stage.clone(),
            metrics: MetricsProfile {
                tick_interval: Duration::from_millis(settings.metrics.tick_interval_ms),
                spike_probability: settings.metrics.spike_probability,
                incident_duration: Duration::from_millis(settings.metrics.incident_duration_ms),
                ..defaults.metrics
            },
            scaling: ScalingPolicy {
                evaluate_interval: Duration::from_millis(settings.scaling.evaluate_interval_ms),
                failure_duration: Duration::from_millis(settings.scaling.failure_duration_ms),
                ..defaults.scaling
            },
            initial_fleet: ScalingState {
                server_count: settings.scaling.initial_servers,
                traffic_level: settings.scaling.initial_traffic,
                ..defaults.initial_fleet
            },
            flow: FlowTimings {
                forward_delay: Duration::from_millis(settings.flow.forward_delay_ms),
                backward_delay: Duration::from_millis(settings.flow.backward_delay_ms),
            },
            narrate: defaults.narrate,
        }
    }
}

/// Lifecycle options for a demo session
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// The demo shuts itself down after this long
    pub max_runtime: Duration,

    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_runtime: Duration::from_secs(25),
            max_shutdown_delay: Duration::from_secs(5),
        }
    }
}
