//! Pipeline stages and their status transitions

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::SimError;

/// Default dwell time of every stage in the built-in catalog
pub const DEFAULT_STAGE_DURATION: Duration = Duration::from_millis(1500);

/// Status of a single stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    /// Not reached yet in this run
    Pending,

    /// Currently dwelling
    Running,

    /// Finished without fault
    Success,

    /// The injected fault fired here
    Error,

    /// Never ran because an earlier stage failed
    Skipped,
}

impl StageStatus {
    /// Whether `self -> next` is a legal move.
    ///
    /// Runs only go Pending -> Running -> Success/Error, or Pending -> Skipped
    /// behind a failure. Any status may return to Pending on reset.
    pub fn can_transition_to(self, next: StageStatus) -> bool {
        matches!(
            (self, next),
            (StageStatus::Pending, StageStatus::Running)
                | (StageStatus::Running, StageStatus::Success)
                | (StageStatus::Running, StageStatus::Error)
                | (StageStatus::Pending, StageStatus::Skipped)
                | (_, StageStatus::Pending)
        )
    }

    /// Terminal within a run
    pub fn is_settled(self) -> bool {
        matches!(
            self,
            StageStatus::Success | StageStatus::Error | StageStatus::Skipped
        )
    }
}

/// One named step of the simulated pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub id: String,
    pub label: String,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
    pub status: StageStatus,
}

impl Stage {
    pub fn new(id: impl Into<String>, label: impl Into<String>, duration: Duration) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            duration,
            status: StageStatus::Pending,
        }
    }

    /// Move to `next`, rejecting illegal transitions
    pub fn transition(&mut self, next: StageStatus) -> Result<(), String> {
        if !self.status.can_transition_to(next) {
            return Err(format!(
                "Invalid transition for stage {}: {:?} -> {:?}",
                self.id, self.status, next
            ));
        }
        self.status = next;
        Ok(())
    }
}

/// Check a catalog is usable: non-empty with unique ids
pub fn validate_catalog(stages: &[Stage]) -> Result<(), SimError> {
    if stages.is_empty() {
        return Err(SimError::InvalidCatalog(
            "a pipeline needs at least one stage".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for stage in stages {
        if !seen.insert(stage.id.as_str()) {
            return Err(SimError::InvalidCatalog(format!(
                "duplicate stage id: {}",
                stage.id
            )));
        }
    }
    Ok(())
}

/// The six-stage delivery pipeline, every stage dwelling `duration`
pub fn default_stages(duration: Duration) -> Vec<Stage> {
    [
        ("commit", "Code Commit"),
        ("build", "Build"),
        ("test", "Test"),
        ("security", "Security Scan"),
        ("deploy", "Deploy"),
        ("monitor", "Monitor"),
    ]
    .into_iter()
    .map(|(id, label)| Stage::new(id, label, duration))
    .collect()
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
