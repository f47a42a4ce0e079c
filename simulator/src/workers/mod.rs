//! Background tasks: controller drivers, the demo script and narration

pub mod controller;
pub mod narrator;
pub mod script;
