//! toolchat runtime: model backends, tool hosts and the resolution loop.
//!
//! # Overview
//!
//! - **Backend**: a trait abstracting LLM providers (Gemini).
//! - **ToolHost**: a trait abstracting where tools run (an MCP server).
//! - **Agent**: sends a query to the model, runs the tools it asks for and
//!   feeds results back until the model answers.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use runtime::{Agent, AgentConfig, GeminiBackend, McpToolHost};
//!
//! # async fn example() -> runtime::Result<()> {
//! let locator: mcp::Locator = "target/debug/calculator".parse()?;
//! let host = McpToolHost::connect(&locator, Duration::from_secs(15)).await?;
//! let backend = GeminiBackend::builder("api-key", "gemini-2.5-flash").build();
//!
//! let mut agent = Agent::new(backend, host, AgentConfig::default());
//! let resolution = agent.resolve("What is (5 + 3)*8?").await?;
//! println!("{}", resolution.answer);
//!
//! agent.into_host().close().await?;
//! # Ok(())
//! # }
//! ```

mod agent;
mod error;
pub mod model;
mod providers;
pub mod tools;

pub use agent::{Agent, AgentConfig, DEFAULT_SYSTEM_INSTRUCTION, LoopState, Resolution};
pub use error::{Error, Result};
pub use model::{
    Backend, Message, ModelError, ModelRequest, ModelResponse, Part, Role, ToolCall, ToolResult,
    ToolSpec, Usage,
};
pub use providers::{GeminiBackend, GeminiBackendBuilder};
pub use tools::{EmptyToolHost, McpToolHost, ToolArguments, ToolError, ToolHost};
