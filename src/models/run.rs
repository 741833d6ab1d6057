// file: src/models/run.rs
// description: record of one user-initiated pipeline run
// reference: internal data structures

use crate::error::Result;
use crate::models::stage::{StageId, StageOutcome, StageStatus, StatusBoard};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// What happened to a stage within a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StageResolution {
    Ran(StageOutcome),
    Skipped,
    NotRun,
}

impl StageResolution {
    pub fn status(&self) -> StageStatus {
        match self {
            StageResolution::Ran(outcome) if outcome.success => StageStatus::Done,
            StageResolution::Ran(_) => StageStatus::Failed,
            StageResolution::Skipped => StageStatus::Skipped,
            StageResolution::NotRun => StageStatus::Waiting,
        }
    }

    /// Skipped stages do not block the ones after them.
    pub fn allows_next(&self) -> bool {
        match self {
            StageResolution::Ran(outcome) => outcome.success,
            StageResolution::Skipped => true,
            StageResolution::NotRun => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: StageId,
    pub resolution: StageResolution,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum AbortCause {
    ConnectivityCheck { detail: String },
    StageFailed { stage: StageId, detail: String },
    UserAbort { stage: StageId },
}

impl fmt::Display for AbortCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortCause::ConnectivityCheck { detail } => {
                write!(f, "connectivity check failed: {detail}")
            }
            AbortCause::StageFailed { stage, detail } => write!(f, "{stage} failed ({detail})"),
            AbortCause::UserAbort { stage } => write!(f, "aborted by user before {stage}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    Completed,
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    pub id: Uuid,
    /// Stages that reached a decision, in execution order.
    pub stages: Vec<StageRecord>,
    pub ai_check_result: Option<bool>,
    pub state: RunState,
    pub abort_cause: Option<AbortCause>,
}

impl PipelineRun {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            stages: Vec::new(),
            ai_check_result: None,
            state: RunState::Completed,
            abort_cause: None,
        }
    }

    pub fn record(&mut self, stage: StageId, resolution: StageResolution) {
        self.stages.push(StageRecord { stage, resolution });
    }

    pub fn abort(&mut self, cause: AbortCause) {
        self.state = RunState::Aborted;
        self.abort_cause = Some(cause);
    }

    pub fn succeeded(&self) -> bool {
        self.state == RunState::Completed
    }

    pub fn resolution(&self, stage: StageId) -> StageResolution {
        self.stages
            .iter()
            .find(|r| r.stage == stage)
            .map(|r| r.resolution.clone())
            .unwrap_or(StageResolution::NotRun)
    }

    /// Outcomes of the stages that were actually executed.
    pub fn outcomes(&self) -> Vec<&StageOutcome> {
        self.stages
            .iter()
            .filter_map(|r| match &r.resolution {
                StageResolution::Ran(outcome) => Some(outcome),
                _ => None,
            })
            .collect()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn status_board(&self) -> StatusBoard {
        let mut board = StatusBoard::new();
        for record in &self.stages {
            board.set(record.stage, record.resolution.status());
        }
        board
    }
}

impl Default for PipelineRun {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn outcome(stage: StageId, code: i32) -> StageOutcome {
        StageOutcome::from_exit(stage, code, String::new(), String::new())
    }

    #[test]
    fn test_unrecorded_stage_is_not_run() {
        let mut run = PipelineRun::new();
        run.record(StageId::Generation, StageResolution::Skipped);
        assert_eq!(run.resolution(StageId::Generation), StageResolution::Skipped);
        assert_eq!(run.resolution(StageId::Assembly), StageResolution::NotRun);
        assert!(run.outcomes().is_empty());
    }

    #[test]
    fn test_board_reflects_outcomes() {
        let mut run = PipelineRun::new();
        run.record(StageId::Generation, StageResolution::Ran(outcome(StageId::Generation, 0)));
        run.record(StageId::Processing, StageResolution::Ran(outcome(StageId::Processing, 1)));
        run.abort(AbortCause::StageFailed {
            stage: StageId::Processing,
            detail: "exit code 1".to_string(),
        });

        let board = run.status_board();
        assert_eq!(board.get(StageId::Generation), StageStatus::Done);
        assert_eq!(board.get(StageId::Processing), StageStatus::Failed);
        assert_eq!(board.get(StageId::Assembly), StageStatus::Waiting);
        assert!(!run.succeeded());
        assert_eq!(run.outcomes().len(), 2);
    }

    #[test]
    fn test_skipped_does_not_block() {
        assert!(StageResolution::Skipped.allows_next());
        assert!(!StageResolution::NotRun.allows_next());
        assert!(!StageResolution::Ran(outcome(StageId::Assembly, 2)).allows_next());
    }

    #[test]
    fn test_abort_cause_display() {
        let cause = AbortCause::UserAbort {
            stage: StageId::Assembly,
        };
        assert_eq!(cause.to_string(), "aborted by user before assembly");
    }
}
