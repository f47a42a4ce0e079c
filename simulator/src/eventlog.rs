//! Append-only narration log shared by the controllers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Severity of a narration entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryLevel {
    Info,
    Warn,
    Error,
}

/// A single timestamped narration line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub level: EntryLevel,
}

impl LogEntry {
    /// Render as `[HH:MM:SS] message`
    pub fn render(&self) -> String {
        format!("[{}] {}", self.timestamp.format("%H:%M:%S"), self.message)
    }
}

/// Append-only, ordered record of simulation events.
///
/// Entries are only ever pushed to the end or dropped all at once by
/// [`SimulationLog::clear`]. Readers get them oldest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimulationLog {
    entries: Vec<LogEntry>,
}

impl SimulationLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry stamped with the current wall-clock time
    pub fn append(&mut self, message: impl Into<String>, level: EntryLevel) {
        self.append_at(Utc::now(), message, level);
    }

    /// Append an entry with an explicit timestamp
    pub fn append_at(
        &mut self,
        timestamp: DateTime<Utc>,
        message: impl Into<String>,
        level: EntryLevel,
    ) {
        self.entries.push(LogEntry {
            timestamp,
            message: message.into(),
            level,
        });
    }

    pub fn info(&mut self, timestamp: DateTime<Utc>, message: impl Into<String>) {
        self.append_at(timestamp, message, EntryLevel::Info);
    }

    pub fn warn(&mut self, timestamp: DateTime<Utc>, message: impl Into<String>) {
        self.append_at(timestamp, message, EntryLevel::Warn);
    }

    pub fn error(&mut self, timestamp: DateTime<Utc>, message: impl Into<String>) {
        self.append_at(timestamp, message, EntryLevel::Error);
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// All entries, oldest first
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// The most recent `limit` entries, still oldest first
    pub fn window(&self, limit: usize) -> &[LogEntry] {
        let start = self.entries.len().saturating_sub(limit);
        &self.entries[start..]
    }

    pub fn last(&self) -> Option<&LogEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Count entries whose message contains `needle`
    pub fn count_containing(&self, needle: &str) -> usize {
        self.entries
            .iter()
            .filter(|e| e.message.contains(needle))
            .count()
    }

    /// Rendered lines, oldest first
    pub fn lines(&self) -> Vec<String> {
        self.entries.iter().map(LogEntry::render).collect()
    }
}
