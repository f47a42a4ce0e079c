//! Main demo session loop

use std::future::Future;
use std::pin::Pin;

use chrono::Utc;
use futures::future::join_all;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, info_span, Instrument};

use crate::app::options::{LifecycleOptions, SimOptions};
use crate::errors::SimError;
use crate::flow::{default_components, FlowSnapshot, RequestFlowAnimator};
use crate::metrics::{MetricsSnapshot, MetricsStream};
use crate::pipeline::{default_stages, PipelineSnapshot, StageSequencer};
use crate::scaling::{AutoScaleController, ScalingSnapshot};
use crate::utils::generate_session_id;
use crate::workers::script::{self, Cue, Targets};
use crate::workers::{controller, narrator};

/// Final state of every controller when a session ends
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub session_id: String,
    pub pipeline: PipelineSnapshot,
    pub metrics: MetricsSnapshot,
    pub scaling: ScalingSnapshot,
    pub flow: FlowSnapshot,
}

/// Run the default scripted demo
pub async fn run(
    options: SimOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<SessionReport, SimError> {
    let cues = script::default_script(options.fault_stage.clone());
    run_script(options, cues, shutdown_signal).await
}

/// Run `cues` against a fresh set of controllers until the runtime limit or
/// the shutdown signal, whichever comes first
pub async fn run_script(
    options: SimOptions,
    cues: Vec<Cue>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<SessionReport, SimError> {
    let session_id = generate_session_id();
    let span = info_span!("session", id = %session_id);

    session(session_id, options, cues, shutdown_signal)
        .instrument(span)
        .await
}

async fn session(
    session_id: String,
    options: SimOptions,
    cues: Vec<Cue>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<SessionReport, SimError> {
    info!("Initializing simulation session...");

    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let mut shutdown_manager = ShutdownManager::new(shutdown_tx.clone(), options.lifecycle.clone());

    let targets = match init(&options, cues, &shutdown_tx, &mut shutdown_manager) {
        Ok(targets) => targets,
        Err(e) => {
            error!("Failed to start simulation: {}", e);
            shutdown_manager.shutdown().await?;
            return Err(e);
        }
    };

    tokio::select! {
        _ = shutdown_signal => {
            info!("Shutdown signal received, shutting down...");
        }
        _ = tokio::time::sleep(options.lifecycle.max_runtime) => {
            info!("Demo runtime ({:?}) reached, shutting down...", options.lifecycle.max_runtime);
        }
    }

    drop(shutdown_tx);
    shutdown_manager.shutdown().await?;

    Ok(SessionReport {
        session_id,
        pipeline: targets.pipeline.snapshot(),
        metrics: targets.metrics.snapshot(),
        scaling: targets.scaling.snapshot(),
        flow: targets.flow.snapshot(),
    })
}

// =============================== INITIALIZATION ================================== //

fn init(
    options: &SimOptions,
    cues: Vec<Cue>,
    shutdown_tx: &broadcast::Sender<()>,
    shutdown_manager: &mut ShutdownManager,
) -> Result<Targets, SimError> {
    let targets = init_controllers(options, shutdown_tx, shutdown_manager)?;

    if options.narrate {
        init_narrator(targets.clone(), shutdown_tx, shutdown_manager)?;
    }

    init_script(cues, targets.clone(), shutdown_tx, shutdown_manager)?;

    Ok(targets)
}

fn init_controllers(
    options: &SimOptions,
    shutdown_tx: &broadcast::Sender<()>,
    shutdown_manager: &mut ShutdownManager,
) -> Result<Targets, SimError> {
    info!("Initializing controllers...");

    let sequencer = StageSequencer::new(default_stages(options.stage_duration))?;
    let stream = MetricsStream::new(options.metrics.clone(), rng_for(options.seed, 0), Utc::now())?;
    let scaler = AutoScaleController::new(
        options.scaling.clone(),
        options.initial_fleet,
        rng_for(options.seed, 1),
    )?;
    let animator = RequestFlowAnimator::new(default_components(), options.flow)?;

    let (pipeline, handle) = controller::spawn(sequencer, shutdown_future(shutdown_tx));
    shutdown_manager.with_worker_handle(pipeline.name(), handle)?;

    let (metrics, handle) = controller::spawn(stream, shutdown_future(shutdown_tx));
    shutdown_manager.with_worker_handle(metrics.name(), handle)?;

    let (scaling, handle) = controller::spawn(scaler, shutdown_future(shutdown_tx));
    shutdown_manager.with_worker_handle(scaling.name(), handle)?;

    let (flow, handle) = controller::spawn(animator, shutdown_future(shutdown_tx));
    shutdown_manager.with_worker_handle(flow.name(), handle)?;

    Ok(Targets {
        pipeline,
        metrics,
        scaling,
        flow,
    })
}

fn init_script(
    cues: Vec<Cue>,
    targets: Targets,
    shutdown_tx: &broadcast::Sender<()>,
    shutdown_manager: &mut ShutdownManager,
) -> Result<(), SimError> {
    info!("Initializing script worker...");

    let shutdown_signal = shutdown_future(shutdown_tx);
    let script_handle = tokio::spawn(
        async move {
            script::run(cues, &targets, tokio::time::sleep, shutdown_signal).await;
        }
        .in_current_span(),
    );

    shutdown_manager.with_worker_handle("script", script_handle)
}

fn init_narrator(
    targets: Targets,
    shutdown_tx: &broadcast::Sender<()>,
    shutdown_manager: &mut ShutdownManager,
) -> Result<(), SimError> {
    info!("Initializing narrator...");

    let shutdown_signal = shutdown_future(shutdown_tx);
    let narrator_handle = tokio::spawn(
        async move {
            narrator::run(&targets, shutdown_signal).await;
        }
        .in_current_span(),
    );

    shutdown_manager.with_worker_handle("narrator", narrator_handle)
}

fn shutdown_future(shutdown_tx: &broadcast::Sender<()>) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    let mut shutdown_rx = shutdown_tx.subscribe();
    Box::pin(async move {
        let _ = shutdown_rx.recv().await;
    })
}

/// Seeded generators get a distinct stream per controller
fn rng_for(seed: Option<u64>, stream: u64) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(stream)),
        None => StdRng::from_os_rng(),
    }
}

// ================================= SHUTDOWN ===================================== //

struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    lifecycle_options: LifecycleOptions,
    worker_handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl ShutdownManager {
    pub fn new(shutdown_tx: broadcast::Sender<()>, lifecycle_options: LifecycleOptions) -> Self {
        Self {
            shutdown_tx,
            lifecycle_options,
            worker_handles: Vec::new(),
        }
    }

    pub fn with_worker_handle(
        &mut self,
        name: &'static str,
        handle: JoinHandle<()>,
    ) -> Result<(), SimError> {
        if self.worker_handles.iter().any(|(n, _)| *n == name) {
            return Err(SimError::ShutdownError(format!("{}_handle already set", name)));
        }
        self.worker_handles.push((name, handle));
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), SimError> {
        let _ = self.shutdown_tx.send(());

        let abort_handles: Vec<_> = self
            .worker_handles
            .iter()
            .map(|(_, handle)| handle.abort_handle())
            .collect();

        match tokio::time::timeout(
            self.lifecycle_options.max_shutdown_delay,
            self.shutdown_impl(),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                error!(
                    "Shutdown timed out after {:?}, aborting remaining workers...",
                    self.lifecycle_options.max_shutdown_delay
                );
                for handle in abort_handles {
                    handle.abort();
                }
                Err(SimError::ShutdownError("shutdown timed out".to_string()))
            }
        }
    }

    async fn shutdown_impl(&mut self) -> Result<(), SimError> {
        info!("Shutting down simulation...");

        let (names, handles): (Vec<_>, Vec<_>) = self.worker_handles.drain(..).unzip();
        for (name, result) in names.into_iter().zip(join_all(handles).await) {
            result.map_err(|e| SimError::ShutdownError(format!("{} worker: {}", name, e)))?;
        }

        info!("Shutdown complete");
        Ok(())
    }
}
