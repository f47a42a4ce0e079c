//! Synthetic monitoring dashboard

pub mod health;
pub mod profile;
pub mod stream;
pub mod walk;

pub use health::{HealthStatus, ServiceHealth};
pub use profile::{MetricLevels, MetricSample, MetricsProfile, Thresholds};
pub use stream::{MetricsInput, MetricsSnapshot, MetricsStream};
pub use walk::MetricRange;
