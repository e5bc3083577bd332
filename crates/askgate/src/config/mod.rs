use serde::Deserialize;
use url::Url;

use crate::error::{AskgateError, Result};
use crate::prompts;

/// Main configuration structure for askgate
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// LLM backend configuration
    #[serde(default)]
    pub backend: BackendConfig,
    /// Prompt template overrides
    #[serde(default)]
    pub prompts: PromptsConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "127.0.0.1:8080")
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

fn default_listen_addr() -> String {
    "127.0.0.1:8080".to_string()
}

/// LLM backend configuration (OpenAI-compatible chat-completions API)
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// API base URL, e.g. "https://api.openai.com/v1"
    #[serde(default)]
    pub api_url: String,
    /// Environment variable name holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Model identifier
    #[serde(default = "default_model")]
    pub model: String,
    /// Request timeout in seconds for non-streaming completion calls.
    /// Streaming reads are unbounded.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Sampling temperature. Zero keeps answers deterministic.
    #[serde(default)]
    pub temperature: f32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            api_key_env: default_api_key_env(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
            temperature: 0.0,
        }
    }
}

impl BackendConfig {
    /// Check that the configured API URL is usable.
    pub fn validate(&self) -> Result<()> {
        if self.api_url.is_empty() {
            return Err(AskgateError::Config(
                "backend.api_url must be configured".to_string(),
            ));
        }

        let url = Url::parse(&self.api_url)
            .map_err(|e| AskgateError::Config(format!("Invalid backend.api_url: {e}")))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(AskgateError::Config(format!(
                "backend.api_url must start with 'http://' or 'https://', got '{}'",
                self.api_url
            )));
        }

        Ok(())
    }
}

fn default_api_key_env() -> String {
    "ASKGATE_API_KEY".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

/// Prompt templates, defaulting to the built-in ones
#[derive(Debug, Clone, Deserialize)]
pub struct PromptsConfig {
    /// System prompt for answering questions
    #[serde(default = "default_chat_system")]
    pub chat_system: String,
    /// User template for answering questions ({question})
    #[serde(default = "default_chat_user")]
    pub chat_user: String,
    /// System prompt for the relevance judge
    #[serde(default = "default_judge_system")]
    pub judge_system: String,
    /// User template for the relevance judge ({question}, {answer})
    #[serde(default = "default_judge_user")]
    pub judge_user: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            chat_system: default_chat_system(),
            chat_user: default_chat_user(),
            judge_system: default_judge_system(),
            judge_user: default_judge_user(),
        }
    }
}

fn default_chat_system() -> String {
    prompts::CHAT_SYSTEM_PROMPT.to_string()
}

fn default_chat_user() -> String {
    prompts::CHAT_USER_PROMPT.to_string()
}

fn default_judge_system() -> String {
    prompts::JUDGE_SYSTEM_PROMPT.to_string()
}

fn default_judge_user() -> String {
    prompts::JUDGE_USER_PROMPT.to_string()
}
