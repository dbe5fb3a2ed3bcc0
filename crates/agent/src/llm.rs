//! Chat-completions transport used by the intent classifier.

use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use voicely_core::config::LlmConfig;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const RETRY_BACKOFF: Duration = Duration::from_millis(250);
const ERROR_BODY_PREVIEW: usize = 400;

#[derive(Clone, Debug, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system", content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user", content: content.into() }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<&'static str>,
    pub temperature: f32,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ChatCompletion {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ChatChoice {
    #[serde(default)]
    pub message: AssistantMessage,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct AssistantMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ToolCall {
    pub function: FunctionCall,
}

#[derive(Clone, Debug, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded argument object, as sent by the API.
    #[serde(default)]
    pub arguments: String,
}

impl ChatCompletion {
    pub fn first_message(&self) -> Option<&AssistantMessage> {
        self.choices.first().map(|choice| &choice.message)
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatCompletion>;
}

/// Talks to any OpenAI-compatible `/chat/completions` endpoint, including a
/// local Ollama server.
#[derive(Clone)]
pub struct OpenAiClient {
    http: Client,
    endpoint: String,
    api_key: Option<SecretString>,
    max_retries: u32,
}

impl OpenAiClient {
    pub fn new(http: Client, base_url: &str, api_key: Option<SecretString>) -> Self {
        Self {
            http,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key,
            max_retries: 0,
        }
    }

    pub fn from_config(http: Client, config: &LlmConfig) -> Self {
        let base_url = config.base_url.as_deref().unwrap_or(DEFAULT_OPENAI_BASE_URL);
        Self::new(http, base_url, config.api_key.clone()).with_max_retries(config.max_retries)
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send_once(&self, request: &ChatRequest) -> Result<ChatCompletion, Attempt> {
        let mut builder = self.http.post(&self.endpoint).json(request);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key.expose_secret());
        }

        let response = builder
            .send()
            .await
            .map_err(|error| Attempt::Retryable(anyhow!("chat request failed: {error}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let preview = body.chars().take(ERROR_BODY_PREVIEW).collect::<String>();
            let error = anyhow!("chat endpoint returned HTTP {}: {preview}", status.as_u16());
            return Err(if is_retryable(status) {
                Attempt::Retryable(error)
            } else {
                Attempt::Fatal(error)
            });
        }

        response
            .json::<ChatCompletion>()
            .await
            .map_err(|error| Attempt::Fatal(anyhow!("chat response decode failed: {error}")))
    }
}

enum Attempt {
    Retryable(anyhow::Error),
    Fatal(anyhow::Error),
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatCompletion> {
        let mut attempt = 0;
        loop {
            match self.send_once(request).await {
                Ok(completion) => return Ok(completion),
                Err(Attempt::Fatal(error)) => return Err(error),
                Err(Attempt::Retryable(error)) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        event_name = "agent.llm.retry",
                        attempt,
                        max_retries = self.max_retries,
                        error = %error,
                        "chat request failed; retrying"
                    );
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                }
                Err(Attempt::Retryable(error)) => {
                    bail!("{error} (after {} attempts)", attempt + 1)
                }
            }
        }
    }
}
