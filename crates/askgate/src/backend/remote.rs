//! Remote chat backend over an OpenAI-compatible chat-completions API
//!
//! Works against any OpenAI-compatible endpoint with configurable URL,
//! model, and API key via environment variable. Rate-limited completion
//! calls are retried with exponential backoff; that retry is a transport
//! concern, invisible to the relevance retry budget upstream.

use std::env;
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::backend::{ByteStream, ChatBackend, Completion};
use crate::config::BackendConfig;
use crate::error::{AskgateError, Result};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Chat backend talking to a remote OpenAI-compatible HTTP API
#[derive(Debug)]
pub struct RemoteBackend {
    client: Client,
    config: BackendConfig,
    api_key: String,
}

/// Chat completion request body
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
    stream: bool,
}

/// Message in the chat completion request
#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

/// Chat completion response body
#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

/// Choice in the chat completion response
#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

/// Message in the response choice
#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Token usage metadata, when the backend reports it
#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

impl RemoteBackend {
    /// Create a new remote backend with the given configuration.
    ///
    /// Reads the API key from the environment variable named in
    /// `config.api_key_env`. Returns an error if the variable is not set.
    ///
    /// The client carries only a connect timeout; streaming reads have no
    /// upper bound, and the completion path sets its per-request timeout
    /// instead.
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let api_key = env::var(&config.api_key_env).map_err(|_| {
            AskgateError::Config(format!("API key env var '{}' not set", config.api_key_env))
        })?;

        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| AskgateError::Backend(format!("Failed to create HTTP client: {e}")))?;

        info!(
            "Remote backend initialized with model: {}, api_url: {}",
            config.model, config.api_url
        );

        Ok(Self {
            client,
            config: config.clone(),
            api_key,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.api_url.trim_end_matches('/')
        )
    }

    fn request_body(&self, system_prompt: &str, user_prompt: &str, stream: bool) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                Message {
                    role: "user".to_string(),
                    content: user_prompt.to_string(),
                },
            ],
            temperature: self.config.temperature,
            stream,
        }
    }

    fn log_usage(usage: &Usage) {
        info!(
            "Token usage: prompt = {}, completion = {}, total = {}",
            usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
        );
    }
}

#[async_trait]
impl ChatBackend for RemoteBackend {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<Completion> {
        let request = self.request_body(system_prompt, user_prompt, false);
        let url = self.endpoint();
        debug!("Calling chat completion API at: {url}");

        let mut last_error = None;
        let mut delay = Duration::from_secs(1);

        for attempt in 0..MAX_RATE_LIMIT_RETRIES {
            match self
                .client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .timeout(Duration::from_secs(self.config.timeout_secs))
                .json(&request)
                .send()
                .await
            {
                Ok(response) => {
                    let status = response.status();

                    if status == 429 {
                        warn!(
                            "Rate limited on attempt {}/{}, waiting {:?}",
                            attempt + 1,
                            MAX_RATE_LIMIT_RETRIES,
                            delay
                        );
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                        continue;
                    }

                    if !status.is_success() {
                        let error_text = response
                            .text()
                            .await
                            .unwrap_or_else(|_| "Unknown error".to_string());
                        return Err(AskgateError::Backend(format!(
                            "API returned {status}: {error_text}"
                        )));
                    }

                    let completion: ChatCompletionResponse = response
                        .json()
                        .await
                        .map_err(|e| AskgateError::Backend(format!("Invalid response: {e}")))?;

                    if let Some(usage) = &completion.usage {
                        Self::log_usage(usage);
                    }

                    let Some(choice) = completion.choices.into_iter().next() else {
                        warn!("No choices inside chat completion response");
                        return Ok(Completion::Empty);
                    };

                    return Ok(match choice.message.content {
                        Some(text) if !text.trim().is_empty() => Completion::Text(text),
                        _ => Completion::Empty,
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    last_error = Some(err_msg.clone());
                    if attempt < MAX_RATE_LIMIT_RETRIES - 1 {
                        warn!(
                            "Request failed on attempt {}/{}, retrying: {}",
                            attempt + 1,
                            MAX_RATE_LIMIT_RETRIES,
                            err_msg
                        );
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                    }
                }
            }
        }

        Err(AskgateError::Backend(format!(
            "Failed after {} retries: {}",
            MAX_RATE_LIMIT_RETRIES,
            last_error.unwrap_or_else(|| "Unknown error".to_string())
        )))
    }

    async fn complete_stream(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<ByteStream> {
        let request = self.request_body(system_prompt, user_prompt, true);
        let url = self.endpoint();
        debug!("Opening streaming chat completion at: {url}");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .json(&request)
            .send()
            .await
            .map_err(|e| AskgateError::Backend(format!("Streaming request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AskgateError::Backend(format!(
                "API returned {status}: {error_text}"
            )));
        }

        Ok(Box::pin(
            response.bytes_stream().map_err(std::io::Error::other),
        ))
    }
}
