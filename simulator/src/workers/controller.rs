//! Real-time driver for one controller
//!
//! Each controller gets its own task. Control inputs arrive over an
//! unbounded channel, timer follow-ups wait in an [`Agenda`] keyed by tokio
//! instants, and every applied input publishes a fresh snapshot on a watch
//! channel for the rendering side.

use std::future::Future;
use std::pin::Pin;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, Instrument, Span};

use crate::errors::SimError;
use crate::sched::{Agenda, Machine, Outcome};

/// Cloneable handle to a running controller
pub struct Handle<M: Machine> {
    name: &'static str,
    inputs: mpsc::UnboundedSender<M::Input>,
    snapshots: watch::Receiver<M::Snapshot>,
}

impl<M: Machine> Clone for Handle<M> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            inputs: self.inputs.clone(),
            snapshots: self.snapshots.clone(),
        }
    }
}

impl<M: Machine> Handle<M> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Queue a control input. Fails only once the controller task is gone.
    pub fn send(&self, input: M::Input) -> Result<(), SimError> {
        self.inputs
            .send(input)
            .map_err(|_| SimError::ControllerStopped(self.name.to_string()))
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> M::Snapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver notified after every applied input
    pub fn subscribe(&self) -> watch::Receiver<M::Snapshot> {
        self.snapshots.clone()
    }
}

/// Spawn `machine` on the tokio runtime, inside the caller's span
pub fn spawn<M>(
    machine: M,
    shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) -> (Handle<M>, JoinHandle<()>)
where
    M: Machine + Send + 'static,
    M::Input: Send + 'static,
    M::Snapshot: Send + Sync + 'static,
{
    let name = machine.name();
    let (input_tx, input_rx) = mpsc::unbounded_channel();
    let (snapshot_tx, snapshot_rx) = watch::channel(machine.snapshot());

    let handle = tokio::spawn(
        run(machine, input_rx, snapshot_tx, shutdown_signal).instrument(Span::current()),
    );

    (
        Handle {
            name,
            inputs: input_tx,
            snapshots: snapshot_rx,
        },
        handle,
    )
}

/// Run the controller loop until shutdown or until every handle is dropped
pub async fn run<M>(
    mut machine: M,
    mut inputs: mpsc::UnboundedReceiver<M::Input>,
    snapshots: watch::Sender<M::Snapshot>,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    M: Machine,
{
    let name = machine.name();
    info!("{} controller starting...", name);

    let mut agenda: Agenda<Instant, M::Input> = Agenda::new();

    loop {
        let next_due = agenda.next_due();

        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("{} controller shutting down...", name);
                return;
            }
            input = inputs.recv() => {
                match input {
                    Some(input) => {
                        apply(&mut machine, input, Instant::now(), &mut agenda, &snapshots);
                    }
                    None => {
                        info!("{} controller has no handles left, stopping", name);
                        return;
                    }
                }
            }
            _ = sleep_until(next_due) => {
                let now = Instant::now();
                while let Some((due, input)) = agenda.pop_due(now) {
                    apply(&mut machine, input, due, &mut agenda, &snapshots);
                }
            }
        }
    }
}

fn apply<M: Machine>(
    machine: &mut M,
    input: M::Input,
    at: Instant,
    agenda: &mut Agenda<Instant, M::Input>,
    snapshots: &watch::Sender<M::Snapshot>,
) {
    match machine.dispatch(input, Utc::now()) {
        Outcome::Applied(follow_ups) => {
            for follow_up in follow_ups {
                agenda.push(at + follow_up.delay, follow_up.input);
            }
            snapshots.send_replace(machine.snapshot());
        }
        Outcome::Ignored(reason) => {
            debug!("{}: input ignored ({})", machine.name(), reason);
        }
    }
}

async fn sleep_until(due: Option<Instant>) {
    match due {
        Some(due) => tokio::time::sleep_until(due).await,
        None => std::future::pending().await,
    }
}
