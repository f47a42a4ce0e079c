//! Console narration worker
//!
//! Watches every controller's snapshot channel and prints log lines that
//! have not been shown yet, plus each request-flow highlight as it moves.

use std::future::Future;
use std::pin::Pin;

use colored::{ColoredString, Colorize};
use tokio::sync::watch;
use tracing::info;

use crate::eventlog::{EntryLevel, LogEntry};
use crate::flow::{FlowSnapshot, Pass};
use crate::workers::script::Targets;

/// How many entries of a controller log were already printed
#[derive(Debug, Default, Clone, Copy)]
pub struct Seen(usize);

impl Seen {
    /// Entries appended since the last call. A log shorter than what was
    /// already printed has been cleared, so printing restarts from the top.
    pub fn unseen<'a>(&mut self, log: &'a [LogEntry]) -> &'a [LogEntry] {
        if log.len() < self.0 {
            self.0 = 0;
        }
        let fresh = &log[self.0..];
        self.0 = log.len();
        fresh
    }
}

/// `[HH:MM:SS] [source] message`, coloured by level
pub fn format_entry(source: &str, entry: &LogEntry) -> String {
    let message: ColoredString = match entry.level {
        EntryLevel::Info => entry.message.normal(),
        EntryLevel::Warn => entry.message.yellow(),
        EntryLevel::Error => entry.message.red().bold(),
    };
    format!(
        "{} {} {}",
        format!("[{}]", entry.timestamp.format("%H:%M:%S")).dimmed(),
        format!("[{}]", source).cyan(),
        message
    )
}

/// One line per flow highlight, `None` when nothing is lit
pub fn format_flow(snapshot: &FlowSnapshot) -> Option<String> {
    let highlight = snapshot.highlight?;
    let node = snapshot.highlighted.as_ref()?;
    let arrow = match highlight.pass {
        Pass::Request => "-> request ".green(),
        Pass::Response => "<- response".blue(),
    };
    Some(format!(
        "{} {} {} ({}/{})",
        "[flow]".cyan(),
        arrow,
        node.label,
        snapshot.cursor + 1,
        snapshot.total_steps
    ))
}

/// Print narration until shutdown or until a controller goes away
pub async fn run(targets: &Targets, mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>) {
    info!("Narrator starting...");

    let mut pipeline = targets.pipeline.subscribe();
    let mut metrics = targets.metrics.subscribe();
    let mut scaling = targets.scaling.subscribe();
    let mut flow = targets.flow.subscribe();

    let mut pipeline_seen = Seen::default();
    let mut metrics_seen = Seen::default();
    let mut scaling_seen = Seen::default();
    let mut last_cursor = -1;

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Narrator shutting down...");
                return;
            }
            changed = pipeline.changed() => {
                if changed.is_err() {
                    return;
                }
                let snapshot = pipeline.borrow_and_update().clone();
                print_entries("pipeline", pipeline_seen.unseen(&snapshot.log));
            }
            changed = metrics.changed() => {
                if changed.is_err() {
                    return;
                }
                let snapshot = metrics.borrow_and_update().clone();
                print_entries("metrics", metrics_seen.unseen(&snapshot.log));
            }
            changed = scaling.changed() => {
                if changed.is_err() {
                    return;
                }
                let snapshot = scaling.borrow_and_update().clone();
                print_entries("scaling", scaling_seen.unseen(&snapshot.log));
            }
            changed = flow.changed() => {
                if changed.is_err() {
                    return;
                }
                let snapshot = flow.borrow_and_update().clone();
                print_flow(&snapshot, &mut last_cursor);
            }
        }
    }
}

fn print_entries(source: &str, entries: &[LogEntry]) {
    for entry in entries {
        println!("{}", format_entry(source, entry));
    }
}

fn print_flow(snapshot: &FlowSnapshot, last_cursor: &mut i64) {
    if snapshot.cursor == *last_cursor {
        return;
    }
    *last_cursor = snapshot.cursor;
    if let Some(line) = format_flow(snapshot) {
        println!("{}", line);
    }
}

/// Wait for the next snapshot on `rx`, for callers that only need one
pub async fn next_snapshot<T: Clone>(rx: &mut watch::Receiver<T>) -> Option<T> {
    rx.changed().await.ok()?;
    Some(rx.borrow_and_update().clone())
}
