//! Google Gemini `generateContent` backend.
//!
//! See: <https://ai.google.dev/api/generate-content>

use std::sync::atomic::{AtomicU64, Ordering};

use crate::model::{
    Backend, Message, ModelError, ModelRequest, ModelResponse, Part, Role, ToolCall, ToolSpec,
    Usage,
};
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

const GEMINI_API_URL: &str = "https://generativelanguage.googleapis.com";

// ─────────────────────────────────────────────────────────────────────────────
// API Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<GeminiTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    function_declarations: Vec<GeminiFunctionDeclaration>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiFunctionDeclaration {
    name: String,
    description: String,
    parameters_json_schema: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    max_output_tokens: u32,
}

#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum GeminiRole {
    User,
    Model,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<GeminiRole>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FunctionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    response: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged, rename_all_fields = "camelCase")]
enum GeminiPart {
    Text {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thought: Option<bool>,
    },
    FunctionCall {
        function_call: FunctionCall,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        thought_signature: Option<String>,
    },
    FunctionResponse {
        function_response: FunctionResponse,
    },
    Other(Value),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    code: u16,
    message: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend Implementation
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for creating a Gemini backend.
#[derive(Debug, Clone)]
pub struct GeminiBackendBuilder {
    api_key: String,
    model: String,
    base_url: String,
    max_output_tokens: Option<u32>,
    system: Option<String>,
}

impl GeminiBackendBuilder {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: GEMINI_API_URL.to_string(),
            max_output_tokens: None,
            system: None,
        }
    }

    /// Override the API root, e.g. to point at a mock server.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = Some(max_output_tokens);
        self
    }

    /// System instruction used when a request does not carry its own.
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn build(self) -> GeminiBackend {
        GeminiBackend {
            client: reqwest::Client::new(),
            api_key: self.api_key,
            model: self.model,
            base_url: self.base_url,
            max_output_tokens: self.max_output_tokens,
            system: self.system,
            next_call_id: AtomicU64::new(0),
        }
    }
}

/// Gemini API backend.
pub struct GeminiBackend {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    max_output_tokens: Option<u32>,
    system: Option<String>,
    next_call_id: AtomicU64,
}

impl GeminiBackend {
    pub fn builder(api_key: impl Into<String>, model: impl Into<String>) -> GeminiBackendBuilder {
        GeminiBackendBuilder::new(api_key, model)
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }

    fn message_to_api(msg: &Message) -> GeminiContent {
        let role = match msg.role {
            Role::User => GeminiRole::User,
            Role::Assistant => GeminiRole::Model,
        };

        let parts = msg
            .parts
            .iter()
            .map(|part| match part {
                Part::Text(text) => GeminiPart::Text {
                    text: text.clone(),
                    thought: None,
                },
                Part::ToolCall(call) => GeminiPart::FunctionCall {
                    function_call: FunctionCall {
                        id: call.provider_id.clone(),
                        name: call.name.clone(),
                        args: call.input.clone(),
                    },
                    thought_signature: call.signature.clone(),
                },
                Part::ToolResult(result) => GeminiPart::FunctionResponse {
                    function_response: FunctionResponse {
                        id: result.provider_id().map(str::to_string),
                        name: result.name().to_string(),
                        response: result.response(),
                    },
                },
            })
            .collect();

        GeminiContent {
            role: Some(role),
            parts,
        }
    }

    fn tools_to_api(specs: &[ToolSpec]) -> Vec<GeminiTool> {
        if specs.is_empty() {
            return Vec::new();
        }
        vec![GeminiTool {
            function_declarations: specs
                .iter()
                .map(|spec| GeminiFunctionDeclaration {
                    name: spec.name.clone(),
                    description: spec.description.clone(),
                    parameters_json_schema: spec.schema.clone(),
                })
                .collect(),
        }]
    }

    fn response_to_message(&self, parts: Vec<GeminiPart>) -> Message {
        let parts = parts
            .into_iter()
            .filter_map(|part| match part {
                GeminiPart::Text { text, thought } if !thought.unwrap_or_default() => {
                    Some(Part::Text(text))
                }
                GeminiPart::FunctionCall {
                    function_call,
                    thought_signature,
                } => {
                    let id = function_call.id.clone().unwrap_or_else(|| {
                        format!("call_{}", self.next_call_id.fetch_add(1, Ordering::Relaxed))
                    });
                    Some(Part::ToolCall(ToolCall {
                        id,
                        name: function_call.name,
                        input: function_call.args,
                        provider_id: function_call.id,
                        signature: thought_signature,
                    }))
                }
                _ => None,
            })
            .collect();

        Message {
            role: Role::Assistant,
            parts,
        }
    }

    fn error_from_body(status: reqwest::StatusCode, body: &str) -> ModelError {
        match serde_json::from_str::<GeminiErrorResponse>(body) {
            Ok(resp) => ModelError::Api(format!(
                "Gemini error ({}): {}",
                resp.error.code, resp.error.message
            )),
            Err(_) => ModelError::Api(format!("{status}: {body}")),
        }
    }
}

impl std::fmt::Display for GeminiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "gemini({})", self.model)
    }
}

impl Backend for GeminiBackend {
    async fn call(&self, request: ModelRequest<'_>) -> Result<ModelResponse, ModelError> {
        let system = request.system.or(self.system.as_deref());

        let api_request = GeminiRequest {
            contents: request.messages.iter().map(Self::message_to_api).collect(),
            system_instruction: system.map(|text| GeminiSystemInstruction {
                parts: vec![GeminiPart::Text {
                    text: text.to_string(),
                    thought: None,
                }],
            }),
            tools: Self::tools_to_api(request.tools),
            generation_config: self
                .max_output_tokens
                .map(|max_output_tokens| GeminiGenerationConfig { max_output_tokens }),
        };

        debug!(
            model = %self.model,
            messages = api_request.contents.len(),
            tools = request.tools.len(),
            "calling Gemini"
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .header(CONTENT_TYPE, "application/json")
            .json(&api_request)
            .send()
            .await
            .map_err(|e| ModelError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Self::error_from_body(status, &body));
        }

        let api_response: GeminiResponse = response
            .json()
            .await
            .map_err(|e| ModelError::InvalidResponse(e.to_string()))?;

        let candidate = api_response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::InvalidResponse("no candidates in response".into()))?;
        debug!(finish_reason = ?candidate.finish_reason, "Gemini responded");

        let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
        let message = self.response_to_message(parts);
        let usage = api_response
            .usage_metadata
            .map(|u| Usage {
                input_tokens: u.prompt_token_count,
                output_tokens: u.candidates_token_count,
            })
            .unwrap_or_default();

        Ok(ModelResponse { message, usage })
    }
}
