//! # Bindery OpenRouter
//!
//! OpenRouter implementation of the [`bindery_core::LlmClient`] seam over
//! the OpenAI-compatible chat-completions API. JSON mode maps to
//! `response_format: {"type": "json_object"}`.

use bindery_core::{BinderyError, GenerationRequest, LlmClient, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

const DEFAULT_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Errors raised by the OpenRouter backend.
#[derive(Debug, Error)]
pub enum OpenRouterError {
    /// HTTP transport failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success HTTP status.
    #[error("openrouter api error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body excerpt.
        message: String,
    },

    /// Response body did not match the expected shape.
    #[error("invalid response format: {0}")]
    Json(#[from] serde_json::Error),

    /// The response carried no choices.
    #[error("empty response")]
    Empty,
}

impl OpenRouterError {
    /// Whether the call is worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Api { status, .. } => *status == 429 || *status == 408 || *status >= 500,
            Self::Transport(err) => err.is_timeout() || err.is_connect(),
            Self::Json(_) | Self::Empty => false,
        }
    }
}

impl From<OpenRouterError> for BinderyError {
    fn from(err: OpenRouterError) -> Self {
        if err.is_retryable() {
            Self::transient(anyhow::anyhow!(err.to_string()))
        } else {
            Self::Service(err.to_string())
        }
    }
}

/// Connection settings.
#[derive(Clone, Debug)]
pub struct OpenRouterConfig {
    /// API key (bearer).
    pub api_key: String,
    /// Model name (e.g. `anthropic/claude-3.5-sonnet`).
    pub model: String,
    /// Endpoint override.
    pub api_url: Option<Url>,
}

impl OpenRouterConfig {
    /// Settings with the default endpoint.
    #[must_use]
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            api_url: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// OpenRouter client.
#[derive(Clone, Debug)]
pub struct OpenRouter {
    http: Client,
    config: OpenRouterConfig,
}

impl OpenRouter {
    /// Creates a client.
    #[must_use]
    pub fn new(config: OpenRouterConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    /// The connection settings.
    #[must_use]
    pub const fn config(&self) -> &OpenRouterConfig {
        &self.config
    }

    fn endpoint(&self) -> String {
        self.config
            .api_url
            .as_ref()
            .map_or(DEFAULT_API_URL.to_owned(), |u| u.as_str().to_owned())
    }

    async fn chat(&self, request: ChatRequest<'_>) -> std::result::Result<String, OpenRouterError> {
        let endpoint = self.endpoint();
        debug!(endpoint, model = request.model, "openrouter request");
        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(200)
                .collect();
            return Err(OpenRouterError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        let parsed: ChatResponse = serde_json::from_str(&body)?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(OpenRouterError::Empty)
    }
}

impl LlmClient for OpenRouter {
    fn model(&self) -> &str {
        &self.config.model
    }

    async fn generate_content(&self, request: GenerationRequest) -> Result<String> {
        let mut messages = Vec::with_capacity(2);
        if let Some(instruction) = request.system_instruction.as_deref() {
            messages.push(ChatMessage {
                role: "system",
                content: instruction,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &request.contents,
        });

        let chat_request = ChatRequest {
            model: &self.config.model,
            messages,
            temperature: request.config.temperature,
            max_tokens: request.config.max_output_tokens,
            response_format: request.config.json_mode.then_some(ResponseFormat {
                kind: "json_object",
            }),
        };

        self.chat(chat_request).await.map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryability_tracks_status_classes() {
        let retryable = OpenRouterError::Api {
            status: 429,
            message: String::new(),
        };
        assert!(retryable.is_retryable());
        let fatal = OpenRouterError::Api {
            status: 401,
            message: String::new(),
        };
        assert!(!fatal.is_retryable());
        let err: BinderyError = fatal.into();
        assert!(!err.is_transient());
    }

    #[test]
    fn default_endpoint_is_openrouter() {
        let client = OpenRouter::new(OpenRouterConfig::new("key", "meta-llama/llama-3-70b"));
        assert_eq!(client.endpoint(), DEFAULT_API_URL);
    }

    #[test]
    fn chat_request_serialises_json_mode() {
        let request = ChatRequest {
            model: "m",
            messages: vec![ChatMessage { role: "user", content: "hi" }],
            temperature: None,
            max_tokens: None,
            response_format: Some(ResponseFormat { kind: "json_object" }),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["response_format"]["type"], "json_object");
        assert!(value.get("temperature").is_none());
    }
}
