//! Per-service health derived from the current sample

use serde::{Deserialize, Serialize};

use crate::metrics::profile::{MetricSample, Thresholds};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub name: String,
    pub status: HealthStatus,
}

/// Project service health from `sample`. Nothing here is stored; the same
/// sample always yields the same list.
pub fn project(sample: &MetricSample, thresholds: &Thresholds) -> Vec<ServiceHealth> {
    let api = if sample.cpu < thresholds.cpu {
        HealthStatus::Healthy
    } else {
        HealthStatus::Degraded
    };
    let auth = if sample.error_rate > thresholds.error_rate {
        HealthStatus::Critical
    } else {
        HealthStatus::Healthy
    };

    [
        ("API Server", api),
        ("Database", HealthStatus::Healthy),
        ("Cache", HealthStatus::Healthy),
        ("Auth Service", auth),
        ("Payment Gateway", HealthStatus::Healthy),
        ("Email Service", HealthStatus::Healthy),
    ]
    .into_iter()
    .map(|(name, status)| ServiceHealth {
        name: name.to_string(),
        status,
    })
    .collect()
}
