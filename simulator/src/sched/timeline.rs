//! Deterministic virtual-time driver

use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::sched::{Agenda, Machine, Outcome};

/// Drives a [`Machine`] against a virtual clock.
///
/// Time only moves when the caller advances it, and every follow-up is
/// delivered at exactly the offset it was scheduled for, so runs are fully
/// reproducible.
pub struct Timeline<M: Machine> {
    machine: M,
    origin: DateTime<Utc>,
    elapsed: Duration,
    agenda: Agenda<Duration, M::Input>,
    delivered: u64,
}

impl<M: Machine> Timeline<M> {
    /// Start a timeline whose zero offset corresponds to `origin`
    pub fn new(machine: M, origin: DateTime<Utc>) -> Self {
        Self {
            machine,
            origin,
            elapsed: Duration::ZERO,
            agenda: Agenda::new(),
            delivered: 0,
        }
    }

    pub fn machine(&self) -> &M {
        &self.machine
    }

    pub fn into_machine(self) -> M {
        self.machine
    }

    pub fn snapshot(&self) -> M::Snapshot {
        self.machine.snapshot()
    }

    /// Virtual time elapsed since the origin
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// Current virtual wall-clock time
    pub fn now(&self) -> DateTime<Utc> {
        self.origin + chrono::Duration::milliseconds(self.elapsed.as_millis() as i64)
    }

    /// Number of timer inputs still waiting
    pub fn pending(&self) -> usize {
        self.agenda.len()
    }

    /// Number of timer inputs delivered so far
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// Dispatch a control input immediately. Returns whether it was applied.
    pub fn send(&mut self, input: M::Input) -> bool {
        self.apply(input)
    }

    /// Move the clock forward by `by`, delivering every timer input that
    /// falls due on the way. Returns the number of inputs delivered.
    pub fn advance(&mut self, by: Duration) -> usize {
        let target = self.elapsed + by;
        let mut count = 0;
        while let Some((due, input)) = self.agenda.pop_due(target) {
            self.elapsed = due;
            self.deliver(input);
            count += 1;
        }
        self.elapsed = target;
        count
    }

    /// Jump to the next pending timer input and deliver it.
    /// Returns the offset it was delivered at.
    pub fn step(&mut self) -> Option<Duration> {
        let (due, input) = self.agenda.pop_next()?;
        self.elapsed = self.elapsed.max(due);
        self.deliver(input);
        Some(self.elapsed)
    }

    /// Deliver timer inputs until none remain or `max_steps` were delivered.
    /// Returns the number delivered.
    pub fn run_until_idle(&mut self, max_steps: usize) -> usize {
        let mut count = 0;
        while count < max_steps && self.step().is_some() {
            count += 1;
        }
        count
    }

    fn deliver(&mut self, input: M::Input) {
        self.delivered += 1;
        self.apply(input);
    }

    fn apply(&mut self, input: M::Input) -> bool {
        let now = self.now();
        match self.machine.dispatch(input, now) {
            Outcome::Applied(follow_ups) => {
                for follow_up in follow_ups {
                    self.agenda
                        .push(self.elapsed + follow_up.delay, follow_up.input);
                }
                true
            }
            Outcome::Ignored(reason) => {
                debug!("{}: input ignored ({})", self.machine.name(), reason);
                false
            }
        }
    }
}
