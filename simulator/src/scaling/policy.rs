//! Hysteresis scaling rule

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::SimError;

pub const MIN_SERVERS: u8 = 1;
pub const MAX_SERVERS: u8 = 8;
pub const MIN_TRAFFIC: u8 = 10;
pub const MAX_TRAFFIC: u8 = 100;

/// What the control loop wants to do with the fleet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalingDecision {
    ScaleUp,
    ScaleDown,
    Hold,
}

/// Thresholds and timings of the auto-scaler
#[derive(Debug, Clone, PartialEq)]
pub struct ScalingPolicy {
    /// Traffic percent strictly above which one server is added
    pub scale_up_above: u8,

    /// Traffic percent strictly below which one server is removed
    pub scale_down_below: u8,

    /// Re-evaluation cadence while auto mode is on
    pub evaluate_interval: Duration,

    /// How long a simulated failure stays visible
    pub failure_duration: Duration,
}

impl Default for ScalingPolicy {
    fn default() -> Self {
        Self {
            scale_up_above: 80,
            scale_down_below: 30,
            evaluate_interval: Duration::from_secs(2),
            failure_duration: Duration::from_secs(3),
        }
    }
}

impl ScalingPolicy {
    pub fn validate(&self) -> Result<(), SimError> {
        if self.scale_down_below > self.scale_up_above {
            return Err(SimError::ConfigError(format!(
                "scale-down threshold {} is above scale-up threshold {}",
                self.scale_down_below, self.scale_up_above
            )));
        }
        if self.evaluate_interval.is_zero() {
            return Err(SimError::ConfigError(
                "scaling evaluate interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// One step of the hysteresis rule. Traffic inside the dead band, or a
    /// fleet already at the bound, holds.
    pub fn decide(&self, traffic: u8, servers: u8) -> ScalingDecision {
        if traffic > self.scale_up_above && servers < MAX_SERVERS {
            ScalingDecision::ScaleUp
        } else if traffic < self.scale_down_below && servers > MIN_SERVERS {
            ScalingDecision::ScaleDown
        } else {
            ScalingDecision::Hold
        }
    }
}

pub fn clamp_traffic(percent: u32) -> u8 {
    percent.clamp(MIN_TRAFFIC as u32, MAX_TRAFFIC as u32) as u8
}

pub fn clamp_servers(count: u32) -> u8 {
    count.clamp(MIN_SERVERS as u32, MAX_SERVERS as u32) as u8
}

/// Traffic share per server, rounded to the nearest percent
pub fn load_per_server(traffic: u8, servers: u8) -> u32 {
    let servers = servers.max(MIN_SERVERS);
    (f64::from(traffic) / f64::from(servers)).round() as u32
}
