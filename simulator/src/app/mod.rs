//! Demo session wiring

pub mod options;
pub mod run;
