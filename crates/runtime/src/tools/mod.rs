//! Tool execution: the host trait and its implementations.

mod empty;
pub mod errors;
mod host;
mod mcp_host;
mod types;

pub use empty::EmptyToolHost;
pub use errors::ToolError;
pub use host::ToolHost;
pub use mcp_host::McpToolHost;
pub use types::ToolArguments;

pub use crate::model::{ToolCall, ToolSpec};
