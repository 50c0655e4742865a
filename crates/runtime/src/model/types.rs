use super::errors::ModelError;
use crate::tools::ToolError;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::future::Future;
use std::ops::AddAssign;

/// Who authored a turn. Tool results travel in user turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    User,
    Assistant,
}

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Pairs the call with its result. Synthesized when the provider has none.
    pub id: String,
    pub name: String,
    pub input: Value,
    /// The provider's own id for the call, echoed back with the result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    /// Opaque reasoning signature the provider attached to the call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            input,
            provider_id: None,
            signature: None,
        }
    }
}

/// The outcome of one tool call, paired with it by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ToolResult {
    Success {
        tool_call_id: String,
        name: String,
        output: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider_id: Option<String>,
    },
    Failure {
        tool_call_id: String,
        name: String,
        error: ToolError,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        provider_id: Option<String>,
    },
}

impl ToolResult {
    pub fn success(call: &ToolCall, output: Value) -> Self {
        Self::Success {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            output,
            provider_id: call.provider_id.clone(),
        }
    }

    pub fn failure(call: &ToolCall, error: ToolError) -> Self {
        Self::Failure {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            error,
            provider_id: call.provider_id.clone(),
        }
    }

    pub fn tool_call_id(&self) -> &str {
        match self {
            Self::Success { tool_call_id, .. } | Self::Failure { tool_call_id, .. } => tool_call_id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Success { name, .. } | Self::Failure { name, .. } => name,
        }
    }

    /// The provider's id for the originating call, if it assigned one.
    pub fn provider_id(&self) -> Option<&str> {
        match self {
            Self::Success { provider_id, .. } | Self::Failure { provider_id, .. } => {
                provider_id.as_deref()
            }
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }

    /// The payload shown to the model: `{"result": ...}` or `{"error": "..."}`.
    pub fn response(&self) -> Value {
        match self {
            Self::Success { output, .. } => json!({ "result": output }),
            Self::Failure { error, .. } => json!({ "error": error.to_string() }),
        }
    }
}

/// A part of a message, which can be text or a tool interaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Part {
    Text(String),
    ToolCall(ToolCall),
    ToolResult(ToolResult),
}

/// A message, consisting of a role and one or more parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub parts: Vec<Part>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            parts: vec![Part::Text(text.into())],
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            parts: vec![Part::Text(text.into())],
        }
    }

    /// One user turn carrying every result of a tool round, in call order.
    pub fn tool_results(results: Vec<ToolResult>) -> Self {
        Self {
            role: Role::User,
            parts: results.into_iter().map(Part::ToolResult).collect(),
        }
    }

    /// Get combined text content from all text parts.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Text(text) => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Extract all tool calls from this message.
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::ToolCall(call) => Some(call.clone()),
                _ => None,
            })
            .collect()
    }
}

/// A tool declaration as the model sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub schema: Value,
}

impl From<mcp::Tool> for ToolSpec {
    fn from(tool: mcp::Tool) -> Self {
        Self {
            name: tool.name,
            description: tool.description.unwrap_or_default(),
            schema: tool.input_schema,
        }
    }
}

/// Token usage statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl AddAssign for Usage {
    fn add_assign(&mut self, other: Self) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }
}

/// Everything needed for a model request.
#[derive(Debug, Clone)]
pub struct ModelRequest<'a> {
    pub system: Option<&'a str>,
    pub messages: &'a [Message],
    pub tools: &'a [ToolSpec],
}

/// The response from a model.
#[derive(Debug, Clone)]
pub struct ModelResponse {
    pub message: Message,
    pub usage: Usage,
}

/// Trait for LLM provider backends.
pub trait Backend: Send + Sync {
    fn call(
        &self,
        request: ModelRequest<'_>,
    ) -> impl Future<Output = Result<ModelResponse, ModelError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(id: &str, name: &str) -> ToolCall {
        ToolCall::new(id, name, json!({"a": 5, "b": 3}))
    }

    #[test]
    fn message_text_extraction() {
        let msg = Message {
            role: Role::Assistant,
            parts: vec![
                Part::Text("Hello ".into()),
                Part::ToolCall(call("1", "add")),
                Part::Text("world".into()),
            ],
        };
        assert_eq!(msg.text(), "Hello world");
    }

    #[test]
    fn message_tool_calls_extraction() {
        let msg = Message {
            role: Role::Assistant,
            parts: vec![
                Part::Text("Let me compute".into()),
                Part::ToolCall(call("1", "add")),
                Part::ToolCall(call("2", "multiply")),
            ],
        };
        let calls = msg.tool_calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name, "add");
        assert_eq!(calls[1].name, "multiply");
    }

    #[test]
    fn tool_result_responses() {
        let ok = ToolResult::success(&call("1", "add"), json!(8));
        assert_eq!(ok.response(), json!({"result": 8}));
        assert_eq!(ok.name(), "add");
        assert!(!ok.is_error());

        let failed = ToolResult::failure(&call("2", "divide"), ToolError::NotFound("divide".into()));
        assert_eq!(failed.response(), json!({"error": "tool not found: divide"}));
        assert_eq!(failed.tool_call_id(), "2");
        assert_eq!(failed.provider_id(), None);
        assert!(failed.is_error());
    }

    #[test]
    fn results_carry_the_provider_call_id() {
        let call = ToolCall {
            provider_id: Some("fc-7".into()),
            ..call("fc-7", "add")
        };
        assert_eq!(ToolResult::success(&call, json!(8)).provider_id(), Some("fc-7"));
    }

    #[test]
    fn bridges_descriptors() {
        let tool = mcp::Tool {
            name: "add".into(),
            description: None,
            input_schema: json!({"type": "object"}),
        };
        let spec = ToolSpec::from(tool);
        assert_eq!(spec.description, "");
        assert_eq!(spec.schema, json!({"type": "object"}));
    }
}
