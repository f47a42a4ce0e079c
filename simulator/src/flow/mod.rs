//! Request/response walk through an architecture diagram

pub mod animator;

pub use animator::{
    default_components, highlight, FlowInput, FlowNode, FlowSnapshot, FlowTimings, Highlight, Pass,
    RequestFlowAnimator,
};
