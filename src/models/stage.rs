// file: src/models/stage.rs
// description: stage identity, execution mode, outcome and status board models
// reference: internal data structures

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The three fixed pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageId {
    Generation,
    Processing,
    Assembly,
}

impl StageId {
    pub const ALL: [StageId; 3] = [StageId::Generation, StageId::Processing, StageId::Assembly];

    pub fn index(self) -> usize {
        match self {
            StageId::Generation => 0,
            StageId::Processing => 1,
            StageId::Assembly => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StageId::Generation => "generation",
            StageId::Processing => "processing",
            StageId::Assembly => "assembly",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            StageId::Generation => "Program 1: generate markdown",
            StageId::Processing => "Program 2: AI processing",
            StageId::Assembly => "Program 3: build website",
        }
    }

    /// Only the AI processing stage streams; the other two run in batch.
    pub fn execution_mode(self) -> ExecutionMode {
        match self {
            StageId::Processing => ExecutionMode::Streaming,
            StageId::Generation | StageId::Assembly => ExecutionMode::Batch,
        }
    }

    pub fn prompt_text(self) -> String {
        format!("Run {}? (y = run, s = skip, n = abort) [y]", self.title())
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "generation" => Ok(StageId::Generation),
            "2" | "processing" => Ok(StageId::Processing),
            "3" | "assembly" => Ok(StageId::Assembly),
            other => Err(format!(
                "unknown stage '{other}' (expected generation, processing or assembly)"
            )),
        }
    }
}

/// How a stage process is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Wait for exit, capture everything at the end.
    Batch,
    /// Consume output line by line while the process runs.
    Streaming,
}

/// Result of one stage execution attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageOutcome {
    pub stage: StageId,
    pub success: bool,
    pub exit_code: i32,
    pub stdout_tail: String,
    pub stderr_tail: String,
    /// Spawn, wait or stream-read problem recorded while running.
    #[serde(default)]
    pub detail: Option<String>,
    pub duration_ms: u64,
}

impl StageOutcome {
    pub fn from_exit(stage: StageId, exit_code: i32, stdout_tail: String, stderr_tail: String) -> Self {
        Self {
            stage,
            success: exit_code == 0,
            exit_code,
            stdout_tail,
            stderr_tail,
            detail: None,
            duration_ms: 0,
        }
    }

    /// Outcome for a process that never started.
    pub fn spawn_failure(stage: StageId, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            stage,
            success: false,
            exit_code: -1,
            stdout_tail: String::new(),
            stderr_tail: message.clone(),
            detail: Some(message),
            duration_ms: 0,
        }
    }

    pub fn with_detail(mut self, detail: Option<String>) -> Self {
        self.detail = detail;
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// One-line explanation for status displays.
    pub fn summary(&self) -> String {
        match (&self.detail, self.success) {
            (_, true) => format!("exit code {}", self.exit_code),
            (Some(detail), false) => format!("exit code {}: {}", self.exit_code, detail),
            (None, false) => format!("exit code {}", self.exit_code),
        }
    }
}

/// Per-stage display state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Waiting,
    Running,
    Done,
    Failed,
    Skipped,
}

impl StageStatus {
    pub fn label(self) -> &'static str {
        match self {
            StageStatus::Waiting => "⏳ Waiting",
            StageStatus::Running => "▶ Running",
            StageStatus::Done => "✅ Done",
            StageStatus::Failed => "❌ Failed",
            StageStatus::Skipped => "⏭ Skipped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusBoard {
    statuses: [StageStatus; 3],
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self {
            statuses: [StageStatus::Waiting; 3],
        }
    }
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, stage: StageId, status: StageStatus) {
        self.statuses[stage.index()] = status;
    }

    pub fn get(&self, stage: StageId) -> StageStatus {
        self.statuses[stage.index()]
    }

    pub fn entries(&self) -> impl Iterator<Item = (StageId, StageStatus)> + '_ {
        StageId::ALL.into_iter().map(|stage| (stage, self.get(stage)))
    }
}
