//! Bounded random walk

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Bounds and step size of one walking metric
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricRange {
    pub min: f64,
    pub max: f64,

    /// Half-width of the symmetric noise added per step
    pub noise: f64,
}

impl MetricRange {
    pub const fn new(min: f64, max: f64, noise: f64) -> Self {
        Self { min, max, noise }
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// One walk step: `clamp(value + uniform(-noise, +noise), min, max)`
pub fn step<R: Rng + ?Sized>(rng: &mut R, value: f64, range: &MetricRange) -> f64 {
    if range.noise <= 0.0 {
        return range.clamp(value);
    }
    let delta = rng.random_range(-range.noise..=range.noise);
    range.clamp(value + delta)
}

/// Push `value` up by `amount`, saturating at the range maximum
pub fn bump(value: f64, amount: f64, range: &MetricRange) -> f64 {
    range.clamp(value + amount)
}

/// Pull `value` down by `amount`, saturating at the range minimum
pub fn decay(value: f64, amount: f64, range: &MetricRange) -> f64 {
    range.clamp(value - amount)
}
