//! Scheduling primitives shared by every controller
//!
//! Controllers are plain state machines: a driver hands them one input at a
//! time together with the current time, and they answer with the timer
//! events they want delivered later. Two drivers exist, the deterministic
//! [`Timeline`] (virtual time, used by tests and tooling) and the tokio
//! driver in [`crate::workers::controller`].

pub mod agenda;
pub mod timeline;

use std::fmt::Debug;
use std::time::Duration;

use chrono::{DateTime, Utc};

pub use agenda::Agenda;
pub use timeline::Timeline;

/// An input to be delivered back to the same machine after `delay`
#[derive(Debug, Clone, PartialEq)]
pub struct Scheduled<I> {
    pub delay: Duration,
    pub input: I,
}

/// Result of dispatching one input
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<I> {
    /// The input changed state; deliver these follow-ups later
    Applied(Vec<Scheduled<I>>),

    /// The input was not valid in the current state and had no effect
    Ignored(&'static str),
}

impl<I> Outcome<I> {
    /// Applied with nothing further to schedule
    pub fn done() -> Self {
        Outcome::Applied(Vec::new())
    }

    /// Applied, with a single follow-up after `delay`
    pub fn after(delay: Duration, input: I) -> Self {
        Outcome::Applied(vec![Scheduled { delay, input }])
    }

    pub fn ignored(reason: &'static str) -> Self {
        Outcome::Ignored(reason)
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied(_))
    }

    pub fn is_ignored(&self) -> bool {
        matches!(self, Outcome::Ignored(_))
    }

    /// Follow-up inputs; empty when ignored
    pub fn into_follow_ups(self) -> Vec<Scheduled<I>> {
        match self {
            Outcome::Applied(follow_ups) => follow_ups,
            Outcome::Ignored(_) => Vec::new(),
        }
    }
}

/// A controller driven by external inputs and its own timer events.
///
/// `dispatch` must never block or sleep; waiting is expressed by returning
/// [`Scheduled`] follow-ups. Stale timer inputs are rejected by the machine
/// itself, so a driver may deliver every follow-up it was handed.
pub trait Machine {
    type Input: Debug;
    type Snapshot: Clone;

    /// Short name used in tracing output
    fn name(&self) -> &'static str;

    /// Apply one input at time `now`
    fn dispatch(&mut self, input: Self::Input, now: DateTime<Utc>) -> Outcome<Self::Input>;

    /// Read-only view for the rendering layer
    fn snapshot(&self) -> Self::Snapshot;
}
