// file: src/models/mod.rs
// description: data models module exports
// reference: internal module structure

pub mod progress;
pub mod run;
pub mod stage;

pub use progress::ProgressSignal;
pub use run::{AbortCause, PipelineRun, RunState, StageRecord, StageResolution};
pub use stage::{ExecutionMode, StageId, StageOutcome, StageStatus, StatusBoard};
