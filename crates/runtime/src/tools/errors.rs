use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during tool execution.
///
/// Everything except [`ToolError::Connection`] is reported back to the model
/// as an error result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
pub enum ToolError {
    #[error("tool not found: {0}")]
    NotFound(String),
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
    #[error("timeout after {0}ms")]
    Timeout(u64),
    #[error("connection lost: {0}")]
    Connection(String),
}

impl ToolError {
    /// Whether the tool host can no longer be used.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

impl From<mcp::Error> for ToolError {
    fn from(error: mcp::Error) -> Self {
        match error {
            mcp::Error::ToolNotFound(name) => Self::NotFound(name),
            mcp::Error::InvalidArguments(reason) => Self::InvalidArguments(reason),
            mcp::Error::ToolCallFailed(reason) => Self::ExecutionFailed(reason),
            mcp::Error::Timeout(after) => Self::Timeout(after.as_millis() as u64),
            mcp::Error::JsonRpc(e) => Self::ExecutionFailed(e.to_string()),
            other => Self::Connection(other.to_string()),
        }
    }
}
