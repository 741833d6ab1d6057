// file: src/error.rs
// description: Custom error types and result type aliases
// reference: https://docs.rs/thiserror

use crate::models::StageId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to launch {stage}: {message}")]
    Spawn { stage: StageId, message: String },

    #[error("{stage} exited with code {exit_code}")]
    Execution { stage: StageId, exit_code: i32 },

    #[error("Reading output of {stage} failed: {message}")]
    StreamRead { stage: StageId, message: String },

    #[error("Connectivity check failed: {0}")]
    ConnectivityCheck(String),

    #[error("A pipeline run is already in progress")]
    RunInProgress,

    #[error("Prompt error: {0}")]
    Prompt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        PipelineError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_name_the_stage() {
        let err = PipelineError::Execution {
            stage: StageId::Processing,
            exit_code: 2,
        };
        assert_eq!(err.to_string(), "processing exited with code 2");

        let err = PipelineError::Spawn {
            stage: StageId::Generation,
            message: "No such file or directory".to_string(),
        };
        assert!(err.to_string().starts_with("Failed to launch generation"));
    }
}
