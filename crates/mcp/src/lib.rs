//! Model Context Protocol plumbing: client session, transports and tool host.
//!
//! The client side connects to one server through a [`Locator`], performs the
//! handshake and exposes the server's tools. The host side serves a static
//! [`ToolRegistry`] over stdio or SSE.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! # async fn example() -> mcp::Result<()> {
//! let locator: mcp::Locator = "http://localhost:8050".parse()?;
//! let transport = mcp::connect(&locator, Duration::from_secs(15)).await?;
//! let session = mcp::Session::connect(transport).await?;
//!
//! for tool in session.tools() {
//!     println!("Tool: {}", tool.name);
//! }
//!
//! let result = session
//!     .call_tool("add", serde_json::json!({"a": 5, "b": 3}).as_object().cloned())
//!     .await?;
//! println!("{}", result.output());
//!
//! session.close().await?;
//! # Ok(())
//! # }
//! ```

mod error;
pub mod host;
mod protocol;
pub mod schema;
mod session;
pub mod transport;

pub use error::{Error, Result};
pub use host::{
    Host, ToolFailure, ToolHandler, ToolRegistry, ToolRegistryBuilder, TypedTool, router, serve_sse,
    serve_stdio,
};
pub use protocol::{
    CallToolParams, CallToolResult, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST,
    Implementation, InitializeParams, InitializeResult, JsonRpcError, JsonRpcRequest,
    JsonRpcResponse, ListToolsResult, METHOD_NOT_FOUND, PARSE_ERROR, PROTOCOL_VERSION, RequestId,
    ServerCapabilities, TOOL_NOT_FOUND, Tool, ToolContent, ToolsCapability,
};
pub use session::{DEFAULT_TIMEOUT, Session};
pub use transport::{AnyTransport, ChildProcess, InProcess, Locator, SseTransport, Transport, connect};
