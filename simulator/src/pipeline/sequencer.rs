//! Fail-fast stage sequencer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::SimError;
use crate::eventlog::{LogEntry, SimulationLog};
use crate::pipeline::stage::{validate_catalog, Stage, StageStatus};
use crate::sched::{Machine, Outcome};

/// Pipeline input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineInput {
    /// Begin a run, failing at `fault_stage_id` if given
    Start { fault_stage_id: Option<String> },

    /// Return every stage to pending
    Reset,

    /// Dwell time of stage `index` in run `run` has elapsed
    StageElapsed { run: u64, index: usize },
}

/// Where the sequencer is between runs, or inside one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "lowercase")]
pub enum RunPhase {
    /// No run yet, or reset since the last one
    Idle,

    /// Stage `index` of run `run` is dwelling
    Running { run: u64, index: usize },

    /// Last run finished with every stage successful
    Succeeded,

    /// Last run stopped at stage `index`
    Failed { index: usize },
}

/// Read-only view of the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSnapshot {
    pub stages: Vec<Stage>,
    pub phase: RunPhase,
    pub fault_stage_id: Option<String>,
    pub rollback_active: bool,
    pub log: Vec<LogEntry>,
}

impl PipelineSnapshot {
    pub fn is_running(&self) -> bool {
        matches!(self.phase, RunPhase::Running { .. })
    }

    /// Index of the stage currently dwelling
    pub fn current_stage(&self) -> Option<usize> {
        match self.phase {
            RunPhase::Running { index, .. } => Some(index),
            _ => None,
        }
    }

    pub fn statuses(&self) -> Vec<StageStatus> {
        self.stages.iter().map(|s| s.status).collect()
    }
}

/// Runs an ordered list of stages, one at a time, stopping at the first
/// injected fault. At most one run is active; control inputs that would
/// overlap runs are ignored.
pub struct StageSequencer {
    stages: Vec<Stage>,
    fault_stage_id: Option<String>,
    rollback_active: bool,
    phase: RunPhase,
    runs: u64,
    log: SimulationLog,
}

impl StageSequencer {
    /// Create a sequencer over `stages`; statuses are forced to pending
    pub fn new(mut stages: Vec<Stage>) -> Result<Self, SimError> {
        validate_catalog(&stages)?;
        for stage in &mut stages {
            stage.status = StageStatus::Pending;
        }

        Ok(Self {
            stages,
            fault_stage_id: None,
            rollback_active: false,
            phase: RunPhase::Idle,
            runs: 0,
            log: SimulationLog::new(),
        })
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    pub fn is_running(&self) -> bool {
        matches!(self.phase, RunPhase::Running { .. })
    }

    pub fn rollback_active(&self) -> bool {
        self.rollback_active
    }

    pub fn log(&self) -> &SimulationLog {
        &self.log
    }

    fn begin(&mut self, fault_stage_id: Option<String>, now: DateTime<Utc>) -> Outcome<PipelineInput> {
        if let Some(fault) = &fault_stage_id {
            if !self.stages.iter().any(|s| &s.id == fault) {
                warn!("Fault stage '{}' is not in the pipeline, run will not fail", fault);
            }
        }

        self.runs += 1;
        self.clear();
        self.fault_stage_id = fault_stage_id;

        info!(
            "Pipeline run {} started ({} stages, fault: {:?})",
            self.runs,
            self.stages.len(),
            self.fault_stage_id
        );
        self.log.info(now, "Pipeline started...");
        self.enter_stage(0, now)
    }

    fn enter_stage(&mut self, index: usize, now: DateTime<Utc>) -> Outcome<PipelineInput> {
        let run = self.runs;
        let stage = &mut self.stages[index];
        if let Err(e) = stage.transition(StageStatus::Running) {
            warn!("{}", e);
        }
        self.log.info(now, format!("Stage: {} - Running...", stage.label));
        debug!("Stage {} running for {:?}", stage.id, stage.duration);

        self.phase = RunPhase::Running { run, index };
        Outcome::after(stage.duration, PipelineInput::StageElapsed { run, index })
    }

    fn finish_stage(&mut self, index: usize, now: DateTime<Utc>) -> Outcome<PipelineInput> {
        let faulted = self.fault_stage_id.as_deref() == Some(self.stages[index].id.as_str());

        if faulted {
            return self.fail_at(index, now);
        }

        let stage = &mut self.stages[index];
        if let Err(e) = stage.transition(StageStatus::Success) {
            warn!("{}", e);
        }
        self.log.info(now, format!("Stage: {} - Success", stage.label));

        if index + 1 < self.stages.len() {
            return self.enter_stage(index + 1, now);
        }

        self.log.info(now, "Pipeline completed successfully!");
        self.phase = RunPhase::Succeeded;
        info!("Pipeline run {} completed successfully", self.runs);
        Outcome::done()
    }

    fn fail_at(&mut self, index: usize, now: DateTime<Utc>) -> Outcome<PipelineInput> {
        let (before, after) = self.stages.split_at_mut(index + 1);
        let failed = &mut before[index];
        if let Err(e) = failed.transition(StageStatus::Error) {
            warn!("{}", e);
        }
        for stage in after.iter_mut() {
            if let Err(e) = stage.transition(StageStatus::Skipped) {
                warn!("{}", e);
            }
        }

        let label = failed.label.clone();
        self.log.error(now, format!("Stage: {} - FAILED!", label));
        self.log.error(
            now,
            format!("Pipeline stopped due to {} failure.", label.to_lowercase()),
        );
        self.log.warn(now, "Initiating rollback to previous stable version...");
        self.rollback_active = true;
        self.phase = RunPhase::Failed { index };

        warn!("Pipeline run {} failed at stage {}, rollback initiated", self.runs, failed.id);
        Outcome::done()
    }

    fn clear(&mut self) {
        for stage in &mut self.stages {
            stage.status = StageStatus::Pending;
        }
        self.log.clear();
        self.rollback_active = false;
        self.fault_stage_id = None;
        self.phase = RunPhase::Idle;
    }
}

impl Machine for StageSequencer {
    type Input = PipelineInput;
    type Snapshot = PipelineSnapshot;

    fn name(&self) -> &'static str {
        "pipeline"
    }

    fn dispatch(&mut self, input: PipelineInput, now: DateTime<Utc>) -> Outcome<PipelineInput> {
        match (self.phase, input) {
            (RunPhase::Running { .. }, PipelineInput::Start { .. }) => {
                Outcome::ignored("a run is already active")
            }
            (_, PipelineInput::Start { fault_stage_id }) => self.begin(fault_stage_id, now),

            (RunPhase::Running { .. }, PipelineInput::Reset) => {
                Outcome::ignored("cannot reset while a run is active")
            }
            (_, PipelineInput::Reset) => {
                self.clear();
                info!("Pipeline reset");
                Outcome::done()
            }

            (RunPhase::Running { run, index }, PipelineInput::StageElapsed { run: r, index: i })
                if run == r && index == i =>
            {
                self.finish_stage(index, now)
            }
            (_, PipelineInput::StageElapsed { .. }) => Outcome::ignored("stale stage timer"),
        }
    }

    fn snapshot(&self) -> PipelineSnapshot {
        PipelineSnapshot {
            stages: self.stages.clone(),
            phase: self.phase,
            fault_stage_id: self.fault_stage_id.clone(),
            rollback_active: self.rollback_active,
            log: self.log.entries().to_vec(),
        }
    }
}
