// file: src/pipeline/prompt.rs
// description: per-stage run/skip/abort decisions
// reference: interactive confirmation before each pipeline step

use crate::error::{PipelineError, Result};
use crate::models::StageId;
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::BufRead;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Run,
    Skip,
    Abort,
}

impl Decision {
    /// Classify a typed answer. An empty answer accepts the default (run);
    /// anything unrecognised aborts.
    pub fn from_token(token: &str) -> Self {
        match token.trim().to_ascii_lowercase().as_str() {
            "" | "y" | "j" | "yes" | "ja" | "run" => Decision::Run,
            "s" | "skip" | "h" | "hoppa" => Decision::Skip,
            _ => Decision::Abort,
        }
    }
}

/// Source of the decision taken before each stage.
#[async_trait]
pub trait DecisionPrompt: Send + Sync {
    async fn decide(&self, stage: StageId) -> Result<Decision>;
}

/// Reads one answer per stage from standard input.
#[derive(Debug, Default)]
pub struct ConsolePrompt;

#[async_trait]
impl DecisionPrompt for ConsolePrompt {
    async fn decide(&self, stage: StageId) -> Result<Decision> {
        let answer = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line).map(|read| (read, line))
        })
        .await
        .map_err(|e| PipelineError::Prompt(format!("input task failed: {e}")))??;

        match answer {
            // End of input: nobody is there to confirm.
            (0, _) => Ok(Decision::Abort),
            (_, line) => {
                let decision = Decision::from_token(&line);
                tracing::debug!("{} answered {:?} -> {:?}", stage, line.trim(), decision);
                Ok(decision)
            }
        }
    }
}

/// Answers without asking: a default plus per-stage overrides.
#[derive(Debug, Clone)]
pub struct PresetPrompt {
    default: Decision,
    overrides: HashMap<StageId, Decision>,
}

impl PresetPrompt {
    pub fn new(default: Decision) -> Self {
        Self {
            default,
            overrides: HashMap::new(),
        }
    }

    pub fn with(mut self, stage: StageId, decision: Decision) -> Self {
        self.overrides.insert(stage, decision);
        self
    }
}

#[async_trait]
impl DecisionPrompt for PresetPrompt {
    async fn decide(&self, stage: StageId) -> Result<Decision> {
        Ok(self.overrides.get(&stage).copied().unwrap_or(self.default))
    }
}
