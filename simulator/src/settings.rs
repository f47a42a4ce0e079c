//! Settings file management

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::errors::SimError;
use crate::logs::LogLevel;

/// Default settings file, looked up in the working directory
pub const DEFAULT_SETTINGS_FILE: &str = "opslab.json";

/// Simulator settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit tracing output as JSON
    #[serde(default)]
    pub json_logs: bool,

    /// Also write logs to rotated files in this directory
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Fixed RNG seed; random when unset
    #[serde(default)]
    pub seed: Option<u64>,

    #[serde(default)]
    pub pipeline: PipelineSettings,

    #[serde(default)]
    pub metrics: MetricsSettings,

    #[serde(default)]
    pub scaling: ScalingSettings,

    #[serde(default)]
    pub flow: FlowSettings,

    #[serde(default)]
    pub demo: DemoSettings,
}

impl Settings {
    /// Read settings from `path`. A missing file yields the defaults.
    pub async fn load(path: &Path) -> Result<Self, SimError> {
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("No settings file at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(SimError::IoError(e)),
        }
    }
}

/// Pipeline settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Dwell time of every stage
    #[serde(default = "default_stage_duration_ms")]
    pub stage_duration_ms: u64,

    /// Stage id that fails during the demo run
    #[serde(default)]
    pub fault_stage: Option<String>,
}

fn default_stage_duration_ms() -> u64 {
    1500
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            stage_duration_ms: default_stage_duration_ms(),
            fault_stage: None,
        }
    }
}

/// Metrics stream settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSettings {
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Chance of an error spike on each tick, in [0, 1]
    #[serde(default = "default_spike_probability")]
    pub spike_probability: f64,

    #[serde(default = "default_incident_duration_ms")]
    pub incident_duration_ms: u64,
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_spike_probability() -> f64 {
    0.1
}

fn default_incident_duration_ms() -> u64 {
    5000
}

impl Default for MetricsSettings {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            spike_probability: default_spike_probability(),
            incident_duration_ms: default_incident_duration_ms(),
        }
    }
}

/// Auto-scaling settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingSettings {
    #[serde(default = "default_evaluate_interval_ms")]
    pub evaluate_interval_ms: u64,

    #[serde(default = "default_failure_duration_ms")]
    pub failure_duration_ms: u64,

    #[serde(default = "default_initial_servers")]
    pub initial_servers: u8,

    /// Percent, clamped to [10, 100]
    #[serde(default = "default_initial_traffic")]
    pub initial_traffic: u8,
}

fn default_evaluate_interval_ms() -> u64 {
    2000
}

fn default_failure_duration_ms() -> u64 {
    3000
}

fn default_initial_servers() -> u8 {
    2
}

fn default_initial_traffic() -> u8 {
    50
}

impl Default for ScalingSettings {
    fn default() -> Self {
        Self {
            evaluate_interval_ms: default_evaluate_interval_ms(),
            failure_duration_ms: default_failure_duration_ms(),
            initial_servers: default_initial_servers(),
            initial_traffic: default_initial_traffic(),
        }
    }
}

/// Request flow settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowSettings {
    #[serde(default = "default_forward_delay_ms")]
    pub forward_delay_ms: u64,

    #[serde(default = "default_backward_delay_ms")]
    pub backward_delay_ms: u64,
}

fn default_forward_delay_ms() -> u64 {
    1200
}

fn default_backward_delay_ms() -> u64 {
    800
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            forward_delay_ms: default_forward_delay_ms(),
            backward_delay_ms: default_backward_delay_ms(),
        }
    }
}

/// Scripted demo settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemoSettings {
    /// How long the demo runs before shutting down on its own
    #[serde(default = "default_duration_secs")]
    pub duration_secs: u64,
}

fn default_duration_secs() -> u64 {
    25
}

impl Default for DemoSettings {
    fn default() -> Self {
        Self {
            duration_secs: default_duration_secs(),
        }
    }
}
