//! Cursor animation over an ordered list of components

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::SimError;
use crate::sched::{Machine, Outcome};

/// One component on the request path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowNode {
    pub id: String,
    pub label: String,
}

impl FlowNode {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
        }
    }
}

/// The path of a web request from the user down to the database
pub fn default_components() -> Vec<FlowNode> {
    [
        ("user", "User"),
        ("dns", "DNS"),
        ("loadbalancer", "Load Balancer"),
        ("firewall", "Firewall / WAF"),
        ("appserver", "Application Server"),
        ("cache", "Cache"),
        ("database", "Database"),
    ]
    .into_iter()
    .map(|(id, label)| FlowNode::new(id, label))
    .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pass {
    Request,
    Response,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Highlight {
    pub pass: Pass,
    pub node: usize,
}

/// Map a cursor step onto the node it highlights.
///
/// Steps `0..n` walk forward over the request; steps `n..2n` walk back over
/// the response, so step `s` lights node `2n - 1 - s`.
pub fn highlight(step: usize, node_count: usize) -> Option<Highlight> {
    if step < node_count {
        Some(Highlight {
            pass: Pass::Request,
            node: step,
        })
    } else if step < 2 * node_count {
        Some(Highlight {
            pass: Pass::Response,
            node: 2 * node_count - 1 - step,
        })
    } else {
        None
    }
}

/// Dwell times per step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowTimings {
    pub forward_delay: Duration,
    pub backward_delay: Duration,
}

impl Default for FlowTimings {
    fn default() -> Self {
        Self {
            forward_delay: Duration::from_millis(1200),
            backward_delay: Duration::from_millis(800),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowInput {
    /// Start a traversal if idle
    Run,

    /// Abandon the current traversal
    Cancel,

    /// Dwell of `step` in traversal `run` has elapsed
    Advance { run: u64, step: usize },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowSnapshot {
    /// -1 when idle, otherwise the step in `0..2n`
    pub cursor: i64,
    pub highlight: Option<Highlight>,
    pub highlighted: Option<FlowNode>,
    pub running: bool,
    pub completed_runs: u64,
    pub total_steps: usize,
}

pub struct RequestFlowAnimator {
    nodes: Vec<FlowNode>,
    timings: FlowTimings,
    cursor: Option<usize>,
    run: u64,
    completed_runs: u64,
}

impl RequestFlowAnimator {
    pub fn new(nodes: Vec<FlowNode>, timings: FlowTimings) -> Result<Self, SimError> {
        if nodes.is_empty() {
            return Err(SimError::InvalidCatalog(
                "a request flow needs at least one node".to_string(),
            ));
        }

        Ok(Self {
            nodes,
            timings,
            cursor: None,
            run: 0,
            completed_runs: 0,
        })
    }

    pub fn nodes(&self) -> &[FlowNode] {
        &self.nodes
    }

    pub fn is_running(&self) -> bool {
        self.cursor.is_some()
    }

    /// Cursor with -1 meaning idle
    pub fn cursor(&self) -> i64 {
        self.cursor.map_or(-1, |step| step as i64)
    }

    pub fn total_steps(&self) -> usize {
        2 * self.nodes.len()
    }

    pub fn completed_runs(&self) -> u64 {
        self.completed_runs
    }

    fn dwell(&self, step: usize) -> Duration {
        if step < self.nodes.len() {
            self.timings.forward_delay
        } else {
            self.timings.backward_delay
        }
    }

    fn enter(&mut self, step: usize) -> Outcome<FlowInput> {
        self.cursor = Some(step);
        if let Some(h) = highlight(step, self.nodes.len()) {
            debug!("Flow step {}: {:?} at {}", step, h.pass, self.nodes[h.node].id);
        }
        Outcome::after(self.dwell(step), FlowInput::Advance { run: self.run, step })
    }
}

impl Machine for RequestFlowAnimator {
    type Input = FlowInput;
    type Snapshot = FlowSnapshot;

    fn name(&self) -> &'static str {
        "flow"
    }

    fn dispatch(&mut self, input: FlowInput, _now: DateTime<Utc>) -> Outcome<FlowInput> {
        match (self.cursor, input) {
            (Some(_), FlowInput::Run) => Outcome::ignored("animation already running"),
            (None, FlowInput::Run) => {
                self.run += 1;
                info!("Request flow {} started over {} nodes", self.run, self.nodes.len());
                self.enter(0)
            }

            (None, FlowInput::Cancel) => Outcome::ignored("animation not running"),
            (Some(_), FlowInput::Cancel) => {
                self.cursor = None;
                info!("Request flow {} cancelled", self.run);
                Outcome::done()
            }

            (Some(current), FlowInput::Advance { run, step }) if run == self.run && step == current => {
                let next = step + 1;
                if next < self.total_steps() {
                    return self.enter(next);
                }
                self.cursor = None;
                self.completed_runs += 1;
                info!("Request flow {} complete", self.run);
                Outcome::done()
            }
            (_, FlowInput::Advance { .. }) => Outcome::ignored("stale flow step"),
        }
    }

    fn snapshot(&self) -> FlowSnapshot {
        let highlight = self
            .cursor
            .and_then(|step| highlight(step, self.nodes.len()));

        FlowSnapshot {
            cursor: self.cursor(),
            highlight,
            highlighted: highlight.map(|h| self.nodes[h.node].clone()),
            running: self.is_running(),
            completed_runs: self.completed_runs,
            total_steps: self.total_steps(),
        }
    }
}
