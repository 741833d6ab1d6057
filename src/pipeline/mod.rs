// file: src/pipeline/mod.rs
// description: pipeline module exports and public api
// reference: pipeline orchestration

pub mod log_sink;
pub mod probe;
pub mod progress;
pub mod prompt;
pub mod runner;
pub mod sequencer;

pub use log_sink::{FileLogSink, LogSink};
pub use probe::{ConnectivityProbe, HttpConnectivityProbe};
pub use prompt::{ConsolePrompt, Decision, DecisionPrompt, PresetPrompt};
pub use runner::{ProcessRunner, StageCommand, StageExecutor};
pub use sequencer::{SequencerState, StageSequencer};
