//! Client session with one MCP server (handshake, requests, lifecycle).

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::protocol::{
    CallToolParams, CallToolResult, INVALID_PARAMS, InitializeParams, InitializeResult,
    JsonRpcRequest, JsonRpcResponse, ListToolsResult, RequestId, TOOL_NOT_FOUND, Tool,
};
use crate::transport::Transport;

/// Default timeout for MCP operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// An initialized session over a transport.
///
/// Requests are strictly sequential: the transport lock is held from sending a
/// request until its response arrives.
pub struct Session<T> {
    transport: Mutex<T>,
    next_id: AtomicI64,
    timeout: Duration,
    server_info: InitializeResult,
    tools: Vec<Tool>,
}

impl<T: Transport> Session<T> {
    /// Perform the MCP handshake over `transport` and fetch the tool list.
    pub async fn connect(transport: T) -> Result<Self> {
        Self::connect_with_timeout(transport, DEFAULT_TIMEOUT).await
    }

    /// Like [`Session::connect`] with a custom per-request timeout.
    ///
    /// If the handshake fails the transport is closed before the error is
    /// returned.
    pub async fn connect_with_timeout(transport: T, request_timeout: Duration) -> Result<Self> {
        let mut session = Self {
            transport: Mutex::new(transport),
            next_id: AtomicI64::new(1),
            timeout: request_timeout,
            server_info: InitializeResult::default(),
            tools: Vec::new(),
        };

        match session.handshake().await {
            Ok(()) => Ok(session),
            Err(e) => {
                if let Err(close_err) = session.transport.get_mut().close().await {
                    warn!("closing transport after failed handshake: {close_err}");
                }
                Err(e)
            }
        }
    }

    async fn handshake(&mut self) -> Result<()> {
        let result: InitializeResult = self
            .request("initialize", Some(InitializeParams::default()))
            .await?;
        self.notify("notifications/initialized").await?;

        info!(
            server = %result.server_info.name,
            protocol = %result.protocol_version,
            "initialized MCP session"
        );
        self.server_info = result;
        self.tools = self.list_tools().await?;
        Ok(())
    }

    /// Server name and capabilities from the handshake.
    pub fn server_info(&self) -> &InitializeResult {
        &self.server_info
    }

    /// Tools advertised when the session was established.
    pub fn tools(&self) -> &[Tool] {
        &self.tools
    }

    /// Ask the server for its current tool list.
    pub async fn list_tools(&self) -> Result<Vec<Tool>> {
        let result: ListToolsResult = self.request("tools/list", None::<()>).await?;
        Ok(result.tools)
    }

    /// Call a tool by name.
    ///
    /// Unknown tools, rejected arguments and failed executions map to
    /// [`Error::ToolNotFound`], [`Error::InvalidArguments`] and
    /// [`Error::ToolCallFailed`] respectively.
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<Map<String, Value>>,
    ) -> Result<CallToolResult> {
        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };

        let result: CallToolResult = match self.request("tools/call", Some(params)).await {
            Ok(result) => result,
            Err(Error::JsonRpc(e)) if e.code == TOOL_NOT_FOUND => {
                return Err(Error::ToolNotFound(name.to_string()));
            }
            Err(Error::JsonRpc(e)) if e.code == INVALID_PARAMS => {
                return Err(Error::InvalidArguments(e.message));
            }
            Err(e) => return Err(e),
        };

        if result.is_error {
            return Err(Error::ToolCallFailed(result.text()));
        }

        Ok(result)
    }

    /// Close the session and release the transport.
    pub async fn close(self) -> Result<()> {
        let mut transport = self.transport.into_inner();
        transport.close().await
    }

    // --- Internal methods ---

    fn next_request_id(&self) -> RequestId {
        RequestId::Number(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn request<P, R>(&self, method: &str, params: Option<P>) -> Result<R>
    where
        P: serde::Serialize,
        R: serde::de::DeserializeOwned,
    {
        let id = self.next_request_id();
        let mut request = JsonRpcRequest::new(id.clone(), method);
        if let Some(p) = params {
            request = request.with_params(p);
        }
        let request_json = serde_json::to_string(&request)?;

        let mut transport = self.transport.lock().await;
        debug!(method, ?id, "sending request");

        // The deadline covers delivery as well as the reply.
        let exchange = async {
            transport.send(request_json).await?;
            read_response(&mut *transport, &id).await
        };
        let response = timeout(self.timeout, exchange)
            .await
            .map_err(|_| Error::Timeout(self.timeout))??;

        let result_value = response.into_result()?;
        let result: R = serde_json::from_value(result_value)
            .map_err(|e| Error::InvalidResponse(format!("{method}: {e}")))?;

        Ok(result)
    }

    async fn notify(&self, method: &str) -> Result<()> {
        let notification = serde_json::to_string(&JsonRpcRequest::notification(method))?;
        let mut transport = self.transport.lock().await;
        timeout(self.timeout, transport.send(notification))
            .await
            .map_err(|_| Error::Timeout(self.timeout))?
    }
}

/// Read frames until the response to `id` arrives.
///
/// Server notifications and late answers to requests that already timed out
/// are skipped.
async fn read_response<T: Transport>(transport: &mut T, id: &RequestId) -> Result<JsonRpcResponse> {
    loop {
        let frame = transport.receive().await?;
        let message: Value = serde_json::from_str(&frame)
            .map_err(|e| Error::InvalidResponse(format!("unparsable message: {e}")))?;

        if message.get("method").is_some() {
            debug!(method = ?message["method"], "ignoring server-initiated message");
            continue;
        }

        let response: JsonRpcResponse = serde_json::from_value(message)
            .map_err(|e| Error::InvalidResponse(e.to_string()))?;

        match &response.id {
            Some(got) if got == id => return Ok(response),
            other => warn!(expected = ?id, got = ?other, "discarding unmatched response"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    use crate::host::{Host, ToolRegistry, TypedTool};
    use crate::transport::InProcess;

    /// Replays canned frames and counts how often it is closed.
    struct Scripted {
        replies: VecDeque<String>,
        sent: Vec<String>,
        closes: Arc<AtomicUsize>,
    }

    impl Scripted {
        fn new(replies: &[&str], closes: Arc<AtomicUsize>) -> Self {
            Self {
                replies: replies.iter().map(|s| s.to_string()).collect(),
                sent: Vec::new(),
                closes,
            }
        }
    }

    impl Transport for Scripted {
        async fn send(&mut self, frame: String) -> Result<()> {
            self.sent.push(frame);
            Ok(())
        }

        async fn receive(&mut self) -> Result<String> {
            self.replies.pop_front().ok_or(Error::ServerExited)
        }

        async fn close(&mut self) -> Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Accepts the connection but never finishes delivering a frame.
    struct Stuck {
        closes: Arc<AtomicUsize>,
    }

    impl Transport for Stuck {
        async fn send(&mut self, _frame: String) -> Result<()> {
            std::future::pending().await
        }

        async fn receive(&mut self) -> Result<String> {
            std::future::pending().await
        }

        async fn close(&mut self) -> Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(serde::Deserialize, schemars::JsonSchema)]
    struct Pair {
        a: i64,
        b: i64,
    }

    fn adder_host() -> Arc<Host> {
        let registry = ToolRegistry::builder()
            .register(TypedTool::new("add", "Add two numbers together", |p: Pair| {
                Ok::<_, String>(p.a + p.b)
            }))
            .unwrap()
            .build();
        Arc::new(Host::new("Calculator", registry))
    }

    #[tokio::test]
    async fn failed_handshake_closes_transport_once() {
        let closes = Arc::new(AtomicUsize::new(0));
        let transport = Scripted::new(&[], closes.clone());

        let err = Session::connect(transport).await.err().unwrap();
        assert!(matches!(err, Error::ServerExited));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn undeliverable_handshake_times_out() {
        let closes = Arc::new(AtomicUsize::new(0));
        let transport = Stuck {
            closes: closes.clone(),
        };

        let err = Session::connect_with_timeout(transport, Duration::from_millis(20))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::Timeout(_)));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn handshake_error_response_closes_transport() {
        let closes = Arc::new(AtomicUsize::new(0));
        let transport = Scripted::new(
            &[r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32603,"message":"boom"}}"#],
            closes.clone(),
        );

        let err = Session::connect(transport).await.err().unwrap();
        assert!(matches!(err, Error::JsonRpc(_)));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn skips_notifications_and_stale_responses() {
        let closes = Arc::new(AtomicUsize::new(0));
        let transport = Scripted::new(
            &[
                r#"{"jsonrpc":"2.0","method":"notifications/message","params":{}}"#,
                r#"{"jsonrpc":"2.0","id":99,"result":{}}"#,
                r#"{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2024-11-05","capabilities":{},"serverInfo":{"name":"x"}}}"#,
                r#"{"jsonrpc":"2.0","id":2,"result":{"tools":[]}}"#,
            ],
            closes.clone(),
        );

        let session = Session::connect(transport).await.unwrap();
        assert_eq!(session.server_info().server_info.name, "x");
        assert!(session.tools().is_empty());

        let sent = session.transport.lock().await.sent.clone();
        assert!(sent[0].contains("\"initialize\""));
        assert!(sent[1].contains("notifications/initialized"));
        assert!(sent[2].contains("tools/list"));

        session.close().await.unwrap();
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn calls_tools_in_process() {
        let session = Session::connect(InProcess::new(adder_host())).await.unwrap();
        assert_eq!(session.tools()[0].name, "add");

        let result = session
            .call_tool("add", serde_json::json!({"a": 5, "b": 3}).as_object().cloned())
            .await
            .unwrap();
        assert_eq!(result.output(), serde_json::json!(8));
    }

    #[tokio::test]
    async fn maps_tool_failures() {
        let session = Session::connect(InProcess::new(adder_host())).await.unwrap();

        let missing = session.call_tool("divide", None).await.unwrap_err();
        assert!(matches!(missing, Error::ToolNotFound(name) if name == "divide"));

        let bad = session
            .call_tool("add", serde_json::json!({"a": "x"}).as_object().cloned())
            .await
            .unwrap_err();
        assert!(matches!(bad, Error::InvalidArguments(_)));
    }

    #[tokio::test]
    async fn listing_is_stable() {
        let session = Session::connect(InProcess::new(adder_host())).await.unwrap();
        let first = session.list_tools().await.unwrap();
        let second = session.list_tools().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first, session.tools());
    }
}
