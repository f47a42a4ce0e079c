//! Opslab Library
//!
//! Scripted process simulations: a CI/CD pipeline, a live metrics panel,
//! an auto-scaling fleet and a request-flow walk, all driven as timed
//! state machines.

pub mod app;
pub mod errors;
pub mod eventlog;
pub mod flow;
pub mod logs;
pub mod metrics;
pub mod pipeline;
pub mod scaling;
pub mod sched;
pub mod settings;
pub mod utils;
pub mod workers;
