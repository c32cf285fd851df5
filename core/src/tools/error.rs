use thiserror::Error;

use crate::Text2SqlError;

/// Failures surfaced to an agent host through [`super::Tool::call`]
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Configuration: {0}")]
    Misconfigured(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Timeout: {0}")]
    Timeout(String),
}

impl From<Text2SqlError> for ToolError {
    fn from(err: Text2SqlError) -> Self {
        match err {
            Text2SqlError::InvalidInput(msg) => ToolError::InvalidArguments(msg),
            Text2SqlError::Configuration(msg) => ToolError::Misconfigured(msg),
            Text2SqlError::Timeout(msg) => ToolError::Timeout(msg),
            other => ToolError::ExecutionFailed(other.to_string()),
        }
    }
}

pub type ToolResult<T> = Result<T, ToolError>;
