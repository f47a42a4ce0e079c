//! Auto-scaling and high-availability demo

pub mod controller;
pub mod policy;

pub use controller::{AutoScaleController, ScalingInput, ScalingSnapshot, ScalingState, ServerUnit};
pub use policy::{ScalingDecision, ScalingPolicy, MAX_SERVERS, MAX_TRAFFIC, MIN_SERVERS, MIN_TRAFFIC};
