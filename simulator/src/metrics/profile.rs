//! Metric samples and the tunables of the synthetic stream

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::SimError;
use crate::metrics::walk::MetricRange;

/// Values of the four metrics without a timestamp
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricLevels {
    pub cpu: f64,
    pub memory: f64,
    pub requests_per_sec: f64,
    pub error_rate: f64,
}

/// One synthetic observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    /// Percent, 0-100
    pub cpu: f64,

    /// Percent, 0-100
    pub memory: f64,

    pub requests_per_sec: f64,

    /// Percent of failed requests
    pub error_rate: f64,

    pub timestamp: DateTime<Utc>,
}

impl MetricSample {
    pub fn at(levels: MetricLevels, timestamp: DateTime<Utc>) -> Self {
        Self {
            cpu: levels.cpu,
            memory: levels.memory,
            requests_per_sec: levels.requests_per_sec,
            error_rate: levels.error_rate,
            timestamp,
        }
    }

    pub fn levels(&self) -> MetricLevels {
        MetricLevels {
            cpu: self.cpu,
            memory: self.memory,
            requests_per_sec: self.requests_per_sec,
            error_rate: self.error_rate,
        }
    }
}

/// Alert thresholds; a metric strictly above its threshold breaches
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub error_rate: f64,
    pub cpu: f64,
    pub memory: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            error_rate: 5.0,
            cpu: 80.0,
            memory: 85.0,
        }
    }
}

impl Thresholds {
    /// Human-readable descriptions of every breached threshold
    pub fn breaches(&self, sample: &MetricSample) -> Vec<String> {
        let mut breaches = Vec::new();
        if sample.error_rate > self.error_rate {
            breaches.push(format!(
                "error rate {:.1}% > {}%",
                sample.error_rate, self.error_rate
            ));
        }
        if sample.cpu > self.cpu {
            breaches.push(format!("CPU {:.0}% > {}%", sample.cpu, self.cpu));
        }
        if sample.memory > self.memory {
            breaches.push(format!("memory {:.0}% > {}%", sample.memory, self.memory));
        }
        breaches
    }

    pub fn is_breached(&self, sample: &MetricSample) -> bool {
        sample.error_rate > self.error_rate || sample.cpu > self.cpu || sample.memory > self.memory
    }
}

/// Every tunable of the metrics stream
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsProfile {
    pub cpu: MetricRange,
    pub memory: MetricRange,
    pub requests_per_sec: MetricRange,
    pub error_rate: MetricRange,

    /// Chance per tick of an error spike
    pub spike_probability: f64,

    /// Error rate added by a spike
    pub spike_amount: f64,

    /// Error rate removed on a tick without a spike
    pub decay_amount: f64,

    pub thresholds: Thresholds,

    /// Levels at start and after every incident
    pub baseline: MetricLevels,

    /// Levels forced by an injected incident
    pub incident: MetricLevels,

    pub tick_interval: Duration,
    pub incident_duration: Duration,
}

impl Default for MetricsProfile {
    fn default() -> Self {
        Self {
            cpu: MetricRange::new(20.0, 99.0, 10.0),
            memory: MetricRange::new(30.0, 95.0, 5.0),
            requests_per_sec: MetricRange::new(100.0, f64::INFINITY, 250.0),
            error_rate: MetricRange::new(0.1, 15.0, 0.0),
            spike_probability: 0.1,
            spike_amount: 5.0,
            decay_amount: 0.5,
            thresholds: Thresholds::default(),
            baseline: MetricLevels {
                cpu: 45.0,
                memory: 62.0,
                requests_per_sec: 1250.0,
                error_rate: 0.2,
            },
            incident: MetricLevels {
                cpu: 95.0,
                memory: 88.0,
                requests_per_sec: 3800.0,
                error_rate: 12.5,
            },
            tick_interval: Duration::from_secs(1),
            incident_duration: Duration::from_secs(5),
        }
    }
}

impl MetricsProfile {
    /// Reject profiles the stream cannot run with
    pub fn validate(&self) -> Result<(), SimError> {
        if !(0.0..=1.0).contains(&self.spike_probability) {
            return Err(SimError::ConfigError(format!(
                "spike probability must be within [0, 1], got {}",
                self.spike_probability
            )));
        }
        if self.tick_interval.is_zero() {
            return Err(SimError::ConfigError(
                "metrics tick interval must be non-zero".to_string(),
            ));
        }

        let ranges = [
            ("cpu", &self.cpu),
            ("memory", &self.memory),
            ("requests_per_sec", &self.requests_per_sec),
            ("error_rate", &self.error_rate),
        ];
        for (name, range) in ranges {
            if range.min.is_nan() || range.max.is_nan() || range.min > range.max || range.noise < 0.0 {
                return Err(SimError::ConfigError(format!("invalid range for {}", name)));
            }
        }
        Ok(())
    }
}
