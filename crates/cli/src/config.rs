//! Configuration loading from toolchat.toml.

use std::path::Path;
use std::time::Duration;

use runtime::{AgentConfig, DEFAULT_SYSTEM_INSTRUCTION};
use serde::Deserialize;

/// Top-level configuration. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub model: ModelConfig,
    pub agent: LoopConfig,
    pub server: ServerConfig,
}

/// Model provider configuration.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ModelConfig {
    /// Gemini model name.
    pub name: String,
    pub max_output_tokens: Option<u32>,
    pub system_instruction: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: "gemini-2.5-flash".to_string(),
            max_output_tokens: None,
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
        }
    }
}

/// Resolution loop limits.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoopConfig {
    pub max_rounds: usize,
    pub model_timeout_secs: u64,
    pub tool_timeout_secs: u64,
    /// Optional persona used to rephrase final answers.
    pub persona: Option<String>,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_rounds: 8,
            model_timeout_secs: 60,
            tool_timeout_secs: 15,
            persona: None,
        }
    }
}

/// Where the tool server lives.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// URL of an SSE server, or a command line for a stdio server.
    pub locator: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            locator: "http://localhost:8050".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.model.name.trim().is_empty() {
            return Err(ConfigError::Invalid("model.name must not be empty".into()));
        }
        if self.agent.model_timeout_secs == 0 || self.agent.tool_timeout_secs == 0 {
            return Err(ConfigError::Invalid("timeouts must be at least 1 second".into()));
        }
        Ok(())
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.agent.tool_timeout_secs)
    }

    /// Settings for the resolution loop.
    pub fn agent_config(&self) -> AgentConfig {
        AgentConfig {
            system_instruction: self.model.system_instruction.clone(),
            max_rounds: self.agent.max_rounds,
            model_timeout: Duration::from_secs(self.agent.model_timeout_secs),
            tool_timeout: self.tool_timeout(),
            persona: self.agent.persona.clone(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.model.name, "gemini-2.5-flash");
        assert_eq!(config.server.locator, "http://localhost:8050");

        let agent = config.agent_config();
        assert_eq!(agent.max_rounds, 8);
        assert_eq!(agent.model_timeout, Duration::from_secs(60));
        assert_eq!(agent.tool_timeout, Duration::from_secs(15));
        assert_eq!(agent.system_instruction, DEFAULT_SYSTEM_INSTRUCTION);
        assert!(agent.persona.is_none());
    }

    #[test]
    fn parses_all_sections() {
        let config = Config::parse(
            r#"
            [model]
            name = "gemini-2.0-flash"
            max_output_tokens = 512

            [agent]
            max_rounds = 3
            persona = "You are a cat. Your name is Neko."

            [server]
            locator = "target/debug/calculator --transport stdio"
            "#,
        )
        .unwrap();
        assert_eq!(config.model.max_output_tokens, Some(512));
        assert_eq!(config.agent.max_rounds, 3);
        assert_eq!(config.agent.tool_timeout_secs, 15);
        assert_eq!(
            config.agent_config().persona.as_deref(),
            Some("You are a cat. Your name is Neko.")
        );
        assert!(config.server.locator.ends_with("stdio"));
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            Config::parse("[agent]\ntool_timeout_secs = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::parse("[model]\napi_key = \"secret\""),
            Err(ConfigError::Parse(_))
        ));
    }
}
