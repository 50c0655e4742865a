//! MCP-backed tool host.

use std::time::Duration;

use mcp::{AnyTransport, Locator, Session};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{ToolArguments, ToolCall, ToolError, ToolHost, ToolSpec};
use crate::Result;

/// Tool host backed by one connected MCP server.
///
/// Owns the session and its transport; [`McpToolHost::close`] releases both.
pub struct McpToolHost<T = AnyTransport> {
    session: Session<T>,
    specs: Vec<ToolSpec>,
}

impl McpToolHost {
    /// Connect to the server at `locator` and cache its tool declarations.
    ///
    /// `timeout` bounds connection setup and every later tool call.
    pub async fn connect(locator: &Locator, timeout: Duration) -> Result<Self> {
        info!(%locator, "connecting to tool server");
        let transport = mcp::connect(locator, timeout).await?;
        Self::from_transport(transport, timeout).await
    }
}

impl<T: mcp::Transport> McpToolHost<T> {
    /// Run the handshake over an already open transport.
    pub async fn from_transport(transport: T, timeout: Duration) -> Result<Self> {
        let session = Session::connect_with_timeout(transport, timeout).await?;
        let specs: Vec<ToolSpec> = session.tools().iter().cloned().map(ToolSpec::from).collect();
        info!(
            server = %session.server_info().server_info.name,
            tools = ?specs.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            "connected to tool server"
        );
        Ok(Self { session, specs })
    }

    /// Name the server reported during the handshake.
    pub fn server_name(&self) -> &str {
        &self.session.server_info().server_info.name
    }

    /// Names of the cached tools, in advertised order.
    pub fn tool_names(&self) -> Vec<String> {
        self.specs.iter().map(|s| s.name.clone()).collect()
    }

    /// Ask the server for its tool list again.
    pub async fn list_tools(&self) -> Result<Vec<ToolSpec>> {
        let tools = self.session.list_tools().await?;
        Ok(tools.into_iter().map(ToolSpec::from).collect())
    }

    /// Close the session and its transport.
    pub async fn close(self) -> Result<()> {
        debug!(server = %self.server_name(), "closing tool server connection");
        Ok(self.session.close().await?)
    }
}

impl<T: mcp::Transport> ToolHost for McpToolHost<T> {
    fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    async fn execute(&self, call: &ToolCall) -> std::result::Result<Value, ToolError> {
        let spec = self
            .specs
            .iter()
            .find(|s| s.name == call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;

        let arguments = ToolArguments::try_from(call.input.clone())?;
        mcp::schema::validate(&spec.schema, &arguments.as_map())
            .map_err(ToolError::InvalidArguments)?;

        let result = self
            .session
            .call_tool(&call.name, arguments.0)
            .await
            .map_err(|e| {
                warn!(tool = %call.name, error = %e, "tool call failed");
                ToolError::from(e)
            })?;

        Ok(result.output())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcp::InProcess;
    use serde_json::json;

    async fn calculator() -> McpToolHost<InProcess> {
        let transport = InProcess::new(calculator::host().unwrap());
        McpToolHost::from_transport(transport, Duration::from_secs(5))
            .await
            .unwrap()
    }

    fn call(name: &str, input: Value) -> ToolCall {
        ToolCall::new("call_0", name, input)
    }

    #[tokio::test]
    async fn caches_declarations() {
        let host = calculator().await;
        assert_eq!(host.server_name(), "Calculator");
        assert_eq!(host.tool_names(), ["add", "multiply"]);
        assert_eq!(host.specs()[0].description, "Add two numbers together");
        assert_eq!(host.list_tools().await.unwrap(), host.specs());
    }

    #[tokio::test]
    async fn executes_calls() {
        let host = calculator().await;
        let output = host.execute(&call("add", json!({"a": 5, "b": 3}))).await;
        assert_eq!(output, Ok(json!(8)));
    }

    #[tokio::test]
    async fn distinguishes_failures() {
        let host = calculator().await;

        let missing = host.execute(&call("divide", json!({"a": 1, "b": 1}))).await;
        assert_eq!(missing, Err(ToolError::NotFound("divide".into())));

        let bad = host.execute(&call("add", json!({"a": "five", "b": 3}))).await;
        assert!(matches!(bad, Err(ToolError::InvalidArguments(msg)) if msg.contains("`a`")));

        let not_object = host.execute(&call("add", json!([5, 3]))).await;
        assert!(matches!(not_object, Err(ToolError::InvalidArguments(_))));

        let overflow = host
            .execute(&call("multiply", json!({"a": i64::MAX, "b": 2})))
            .await;
        assert!(matches!(overflow, Err(ToolError::ExecutionFailed(_))));
    }

    #[tokio::test]
    async fn closes() {
        calculator().await.close().await.unwrap();
    }
}
