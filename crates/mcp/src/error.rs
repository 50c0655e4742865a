//! MCP error types.

use std::time::Duration;

use crate::protocol::JsonRpcError;
use thiserror::Error;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("failed to spawn server `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to reach server at {url}: {reason}")]
    Connect { url: String, reason: String },

    #[error("unsupported server locator: {0}")]
    UnsupportedLocator(String),

    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server exited unexpectedly")]
    ServerExited,

    #[error("timeout after {0:?} waiting for response")]
    Timeout(Duration),

    #[error("failed to serialize message: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("JSON-RPC error: {0}")]
    JsonRpc(#[from] JsonRpcError),

    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("tool call failed: {0}")]
    ToolCallFailed(String),

    #[error("tool registered twice: {0}")]
    DuplicateTool(String),

    #[error("output too large: {size} bytes (max {max})")]
    OutputTooLarge { size: usize, max: usize },
}

impl Error {
    /// Whether the error means the channel to the server is unusable.
    ///
    /// Tool-level failures (unknown tool, bad arguments, failed execution,
    /// an expired deadline) leave the session intact.
    pub fn is_connection_error(&self) -> bool {
        !matches!(
            self,
            Self::ToolNotFound(_)
                | Self::InvalidArguments(_)
                | Self::ToolCallFailed(_)
                | Self::JsonRpc(_)
                | Self::Timeout(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
