//! Scripted demo worker
//!
//! Plays a fixed list of timed control inputs against the running
//! controllers, the way a visitor would click through the demos.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::flow::{FlowInput, RequestFlowAnimator};
use crate::metrics::{MetricsInput, MetricsStream};
use crate::pipeline::{PipelineInput, StageSequencer};
use crate::scaling::{AutoScaleController, ScalingInput};
use crate::workers::controller::Handle;

/// A control input aimed at one controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Pipeline(PipelineInput),
    Metrics(MetricsInput),
    Scaling(ScalingInput),
    Flow(FlowInput),
}

/// An action fired `at` after the script starts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cue {
    pub at: Duration,
    pub action: Action,
}

impl Cue {
    pub fn new(at: Duration, action: Action) -> Self {
        Self { at, action }
    }
}

/// Handles to every controller the script can reach
#[derive(Clone)]
pub struct Targets {
    pub pipeline: Handle<StageSequencer>,
    pub metrics: Handle<MetricsStream>,
    pub scaling: Handle<AutoScaleController>,
    pub flow: Handle<RequestFlowAnimator>,
}

/// The default walkthrough: start everything, push traffic up, break a
/// server, inject an incident, then let traffic fall off.
pub fn default_script(fault_stage_id: Option<String>) -> Vec<Cue> {
    let secs = Duration::from_secs;
    vec![
        Cue::new(secs(0), Action::Metrics(MetricsInput::Start)),
        Cue::new(secs(0), Action::Pipeline(PipelineInput::Start { fault_stage_id })),
        Cue::new(secs(0), Action::Flow(FlowInput::Run)),
        Cue::new(secs(0), Action::Scaling(ScalingInput::SetAutoMode(true))),
        Cue::new(secs(1), Action::Scaling(ScalingInput::SetTrafficLevel(95))),
        Cue::new(secs(5), Action::Scaling(ScalingInput::SimulateFailure)),
        Cue::new(secs(6), Action::Metrics(MetricsInput::InjectIncident)),
        Cue::new(secs(12), Action::Scaling(ScalingInput::SetTrafficLevel(15))),
        Cue::new(secs(16), Action::Flow(FlowInput::Run)),
    ]
}

/// Play `cues` in order. Returns early on shutdown.
pub async fn run<S, F>(
    cues: Vec<Cue>,
    targets: &Targets,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Script worker starting with {} cues...", cues.len());

    let mut elapsed = Duration::ZERO;
    let mut cues = cues;
    cues.sort_by_key(|cue| cue.at);

    for cue in cues {
        let wait = cue.at.saturating_sub(elapsed);
        if !wait.is_zero() {
            tokio::select! {
                _ = &mut shutdown_signal => {
                    info!("Script worker shutting down...");
                    return;
                }
                _ = sleep_fn(wait) => {}
            }
            elapsed = cue.at;
        }

        debug!("Cue at {:?}: {:?}", cue.at, cue.action);
        if let Err(e) = fire(targets, cue.action) {
            warn!("Failed to deliver cue: {}", e);
        }
    }

    info!("Script finished");
}

fn fire(targets: &Targets, action: Action) -> Result<(), crate::errors::SimError> {
    match action {
        Action::Pipeline(input) => targets.pipeline.send(input),
        Action::Metrics(input) => targets.metrics.send(input),
        Action::Scaling(input) => targets.scaling.send(input),
        Action::Flow(input) => targets.flow.send(input),
    }
}
