//! Tool host: serves a [`ToolRegistry`] to MCP clients.
//!
//! [`Host`] is transport-agnostic. It turns one JSON-RPC frame into at most
//! one reply frame; [`serve_stdio`] and [`serve_sse`] carry those frames over
//! the wire.

mod registry;
mod sse;
mod stdio;

pub use registry::{ToolFailure, ToolHandler, ToolRegistry, ToolRegistryBuilder, TypedTool};
pub use sse::{router, serve_sse};
pub use stdio::{serve, serve_stdio};

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::protocol::{
    CallToolParams, CallToolResult, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, Implementation,
    InitializeResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse, ListToolsResult,
    METHOD_NOT_FOUND, PARSE_ERROR, PROTOCOL_VERSION, ServerCapabilities, TOOL_NOT_FOUND,
    ToolsCapability,
};

/// A named set of tools answering MCP requests.
pub struct Host {
    info: Implementation,
    registry: ToolRegistry,
}

impl Host {
    pub fn new(name: impl Into<String>, registry: ToolRegistry) -> Self {
        Self {
            info: Implementation {
                name: name.into(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            },
            registry,
        }
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Handle one raw frame. Returns the serialized reply, if any.
    pub fn handle_frame(&self, frame: &str) -> Option<String> {
        let response = match serde_json::from_str::<Value>(frame) {
            Err(e) => Some(JsonRpcResponse::failure(
                None,
                JsonRpcError::new(PARSE_ERROR, format!("parse error: {e}")),
            )),
            Ok(value) => match serde_json::from_value::<JsonRpcRequest>(value) {
                Ok(request) => self.handle(request),
                // Responses sent back to us carry no method; nothing to answer.
                Err(_) if is_response(frame) => None,
                Err(e) => Some(JsonRpcResponse::failure(
                    None,
                    JsonRpcError::new(INVALID_REQUEST, format!("invalid request: {e}")),
                )),
            },
        }?;

        match serde_json::to_string(&response) {
            Ok(json) => Some(json),
            Err(e) => {
                warn!("failed to serialize response: {e}");
                None
            }
        }
    }

    /// Dispatch a parsed request. Notifications produce no response.
    pub fn handle(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let Some(id) = request.id else {
            debug!(method = %request.method, "notification");
            return None;
        };

        let outcome = match request.method.as_str() {
            "initialize" => self.initialize(),
            "ping" => Ok(Value::Object(Default::default())),
            "tools/list" => self.list_tools(),
            "tools/call" => self.call_tool(request.params),
            other => Err(JsonRpcError::new(
                METHOD_NOT_FOUND,
                format!("method not found: {other}"),
            )),
        };

        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::failure(Some(id), error),
        })
    }

    fn initialize(&self) -> Result<Value, JsonRpcError> {
        info!(host = %self.info.name, "client initialized");
        to_result(&InitializeResult {
            protocol_version: PROTOCOL_VERSION.to_string(),
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability::default()),
            },
            server_info: self.info.clone(),
        })
    }

    fn list_tools(&self) -> Result<Value, JsonRpcError> {
        to_result(&ListToolsResult {
            tools: self.registry.list(),
        })
    }

    fn call_tool(&self, params: Option<Value>) -> Result<Value, JsonRpcError> {
        let params: CallToolParams = params
            .ok_or_else(|| JsonRpcError::new(INVALID_PARAMS, "missing params"))
            .and_then(|p| {
                serde_json::from_value(p)
                    .map_err(|e| JsonRpcError::new(INVALID_PARAMS, format!("invalid params: {e}")))
            })?;

        let Some(tool) = self.registry.get(&params.name) else {
            warn!(tool = %params.name, "unknown tool");
            return Err(JsonRpcError::new(
                TOOL_NOT_FOUND,
                format!("unknown tool: {}", params.name),
            ));
        };

        let arguments = params.arguments.map(Value::Object).unwrap_or(Value::Null);
        debug!(tool = %params.name, %arguments, "calling tool");

        let result = match tool.call(arguments) {
            Ok(value) => CallToolResult::success(value),
            Err(ToolFailure::InvalidArguments(reason)) => {
                return Err(JsonRpcError::new(INVALID_PARAMS, reason));
            }
            Err(ToolFailure::Execution(reason)) => {
                warn!(tool = %params.name, %reason, "tool execution failed");
                CallToolResult::error(reason)
            }
        };
        to_result(&result)
    }
}

fn to_result(value: &impl serde::Serialize) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value)
        .map_err(|e| JsonRpcError::new(INTERNAL_ERROR, e.to_string()))
}

fn is_response(frame: &str) -> bool {
    serde_json::from_str::<Value>(frame)
        .map(|v| v.get("method").is_none() && (v.get("result").is_some() || v.get("error").is_some()))
        .unwrap_or(false)
}
