use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use docbot_core::config::LlmConfig;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
}

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llm request failed: {0}")]
    Request(String),
    #[error("llm rate limited after {attempts} attempts")]
    RateLimited { attempts: u32 },
    #[error("llm api returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("could not decode llm response: {0}")]
    Decode(String),
    #[error("llm response contained no message")]
    EmptyResponse,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError>;
}

/// The configured client, or `None` when no provider is usable.
pub fn llm_from_config(config: &LlmConfig) -> Result<Option<Arc<dyn LlmClient>>, LlmError> {
    if !config.is_enabled() {
        return Ok(None);
    }
    Ok(Some(Arc::new(OpenAiCompatibleClient::from_config(config)?)))
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Chat-completions client for OpenAI and API-compatible servers (Ollama).
pub struct OpenAiCompatibleClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<SecretString>,
    max_retries: u32,
    base_delay: Duration,
}

impl OpenAiCompatibleClient {
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| LlmError::Request(error.to_string()))?;
        Ok(Self {
            client,
            base_url: config.effective_base_url().to_string(),
            api_key: config.api_key.clone(),
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(500),
        })
    }

    /// Shortens the retry backoff; tests use this to keep runs fast.
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2_u32.saturating_pow(attempt))
    }

    async fn send_once(&self, request: &CompletionRequest) -> Result<String, Attempt> {
        let body = ChatRequest {
            model: &request.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: false,
        };

        let mut builder =
            self.client.post(format!("{}/chat/completions", self.base_url)).json(&body);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key.expose_secret());
        }

        let response = builder.send().await.map_err(|error| {
            let retryable = error.is_timeout() || error.is_connect();
            Attempt { error: LlmError::Request(error.to_string()), retryable }
        })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Attempt { error: LlmError::RateLimited { attempts: 1 }, retryable: true });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Attempt {
                error: LlmError::Api { status: status.as_u16(), body },
                retryable: status.is_server_error(),
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|error| Attempt { error: LlmError::Decode(error.to_string()), retryable: false })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(Attempt { error: LlmError::EmptyResponse, retryable: false })
    }
}

struct Attempt {
    error: LlmError,
    retryable: bool,
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        let mut attempt = 0;
        loop {
            match self.send_once(&request).await {
                Ok(content) => return Ok(content),
                Err(failure) if failure.retryable && attempt < self.max_retries => {
                    warn!(
                        model = %request.model,
                        attempt = attempt + 1,
                        error = %failure.error,
                        "llm request failed; retrying"
                    );
                    tokio::time::sleep(self.backoff(attempt)).await;
                    attempt += 1;
                }
                Err(failure) => {
                    return Err(match failure.error {
                        LlmError::RateLimited { .. } => {
                            LlmError::RateLimited { attempts: attempt + 1 }
                        }
                        other => other,
                    })
                }
            }
        }
    }
}
