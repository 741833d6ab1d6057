// file: src/lib.rs
// description: library entry point and public api exports
// reference: rust library patterns
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/readme.md"))]

pub mod config;
pub mod error;
pub mod interpreter;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod ui;
pub mod utils;

pub use config::{
    Config, InterpreterConfig, ProbeConfig, RendererPreference, StageConfig, StagesConfig,
    UiConfig,
};
pub use error::{PipelineError, Result};
pub use models::{
    AbortCause, ExecutionMode, PipelineRun, ProgressSignal, RunState, StageId, StageOutcome,
    StageResolution, StageStatus, StatusBoard,
};
pub use pipeline::{
    ConnectivityProbe, ConsolePrompt, Decision, DecisionPrompt, FileLogSink,
    HttpConnectivityProbe, LogSink, PresetPrompt, ProcessRunner, SequencerState, StageCommand,
    StageExecutor, StageSequencer,
};
pub use ui::{
    ContentUpdate, ModeGuard, PromptUpdate, Renderer, RendererKind, UiBridge, UiMode,
};
