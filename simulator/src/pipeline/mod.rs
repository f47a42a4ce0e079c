//! Simulated CI/CD pipeline

pub mod sequencer;
pub mod stage;

pub use sequencer::{PipelineInput, PipelineSnapshot, RunPhase, StageSequencer};
pub use stage::{default_stages, Stage, StageStatus, DEFAULT_STAGE_DURATION};
