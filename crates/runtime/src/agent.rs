//! Bounded query resolution: model ↔ tool rounds until a final answer.

use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::model::{
    Backend, Message, ModelRequest, ModelResponse, ToolCall, ToolResult, ToolSpec, Usage,
};
use crate::tools::{ToolError, ToolHost};
use crate::{Error, Result};

/// System instruction used when none is configured.
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are an efficient calculator. You can only use the tools provided to you to answer the user's question.";

/// Tuning knobs for [`Agent`].
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub system_instruction: String,
    /// Tool rounds allowed before giving up.
    pub max_rounds: usize,
    pub model_timeout: Duration,
    pub tool_timeout: Duration,
    /// When set, the final answer is rephrased by one extra tool-less model
    /// call using this as the system instruction.
    pub persona: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
            max_rounds: 8,
            model_timeout: Duration::from_secs(60),
            tool_timeout: Duration::from_secs(15),
            persona: None,
        }
    }
}

/// Where the resolution loop is, and what it carries into the next step.
#[derive(Debug, Clone)]
pub enum LoopState {
    /// Waiting for the model's next turn.
    AwaitingModel,
    /// Running the calls the model just asked for, in order.
    InvokingTool(Vec<ToolCall>),
    /// The model answered without asking for tools.
    Done(Message),
}

impl LoopState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AwaitingModel => "awaiting_model",
            Self::InvokingTool(_) => "invoking_tool",
            Self::Done(_) => "done",
        }
    }
}

/// A resolved query.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub answer: String,
    /// Tool rounds it took.
    pub rounds: usize,
    /// Every turn exchanged, ending with the answer.
    pub conversation: Vec<Message>,
    pub usage: Usage,
}

/// Answers queries with a model backend and a tool host.
pub struct Agent<B, H> {
    backend: B,
    host: H,
    config: AgentConfig,
}

impl<B: Backend, H: ToolHost> Agent<B, H> {
    pub fn new(backend: B, host: H, config: AgentConfig) -> Self {
        Self {
            backend,
            host,
            config,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Give back the tool host, e.g. to close it.
    pub fn into_host(self) -> H {
        self.host
    }

    /// Resolve `query`, invoking tools as the model asks.
    ///
    /// Tool failures are reported back to the model. Losing the tool host,
    /// model errors, model timeouts and exceeding `max_rounds` are fatal.
    pub async fn resolve(&mut self, query: &str) -> Result<Resolution> {
        let mut conversation = vec![Message::user(query)];
        let mut usage = Usage::default();
        let mut rounds = 0;
        let mut state = LoopState::AwaitingModel;

        info!(query, "resolving query");

        loop {
            debug!(state = state.name(), rounds);
            state = match state {
                LoopState::AwaitingModel => {
                    let response = self
                        .ask_model(
                            &conversation,
                            Some(self.config.system_instruction.as_str()),
                            self.host.specs(),
                        )
                        .await?;
                    usage += response.usage;

                    let calls = response.message.tool_calls();
                    if calls.is_empty() {
                        LoopState::Done(response.message)
                    } else if rounds == self.config.max_rounds {
                        warn!(rounds, "model kept requesting tools");
                        return Err(Error::LoopLimitExceeded { rounds });
                    } else {
                        conversation.push(response.message);
                        LoopState::InvokingTool(calls)
                    }
                }
                LoopState::InvokingTool(calls) => {
                    let mut results = Vec::with_capacity(calls.len());
                    for call in &calls {
                        results.push(self.invoke(call).await?);
                    }
                    conversation.push(Message::tool_results(results));
                    rounds += 1;
                    LoopState::AwaitingModel
                }
                LoopState::Done(candidate) => {
                    let (answer, reply) = self.present(&conversation, candidate, &mut usage).await?;
                    conversation.push(reply);
                    info!(rounds, "query resolved");
                    return Ok(Resolution {
                        answer,
                        rounds,
                        conversation,
                        usage,
                    });
                }
            };
        }
    }

    /// The final answer text, and the turn that carries it.
    async fn present(
        &self,
        conversation: &[Message],
        candidate: Message,
        usage: &mut Usage,
    ) -> Result<(String, Message)> {
        let Some(persona) = &self.config.persona else {
            return Ok((candidate.text(), candidate));
        };

        debug!("rephrasing answer with persona");
        let response = self.ask_model(conversation, Some(persona.as_str()), &[]).await?;
        *usage += response.usage;
        Ok((response.message.text(), response.message))
    }

    async fn ask_model(
        &self,
        messages: &[Message],
        system: Option<&str>,
        tools: &[ToolSpec],
    ) -> Result<ModelResponse> {
        let request = ModelRequest {
            system,
            messages,
            tools,
        };
        let limit = self.config.model_timeout;
        Ok(timeout(limit, self.backend.call(request))
            .await
            .map_err(|_| Error::Timeout(limit))??)
    }

    async fn invoke(&self, call: &ToolCall) -> Result<ToolResult> {
        info!(tool = %call.name, arguments = %call.input, "invoking tool");
        let limit = self.config.tool_timeout;
        let outcome = match timeout(limit, self.host.execute(call)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ToolError::Timeout(limit.as_millis() as u64)),
        };

        match outcome {
            Ok(output) => {
                debug!(tool = %call.name, %output, "tool succeeded");
                Ok(ToolResult::success(call, output))
            }
            Err(error) if error.is_fatal() => Err(Error::Connection(Box::new(error))),
            Err(error) => {
                warn!(tool = %call.name, %error, "tool failed, reporting to model");
                Ok(ToolResult::failure(call, error))
            }
        }
    }
}
