//! Error types for the Gemini backend.

use serde::Deserialize;
use thiserror::Error;

/// Errors raised by the Gemini backend.
#[derive(Debug, Error)]
pub enum GeminiError {
    /// HTTP transport failure (connect, TLS, timeout).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success HTTP status with the API's message.
    #[error("gemini api error ({status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the error body.
        message: String,
    },

    /// Rate limit exceeded.
    #[error("rate limit exceeded: {message}")]
    RateLimit {
        /// Message extracted from the error body.
        message: String,
        /// Suggested retry delay, when the API provided one.
        retry_after_secs: Option<u64>,
    },

    /// Response body did not match the expected shape.
    #[error("invalid response format: {0}")]
    Json(#[from] serde_json::Error),

    /// The response carried no usable candidate.
    #[error("empty response: {0}")]
    Empty(String),
}

/// Gemini API error response body.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorResponse {
    pub error: Option<ApiErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorDetail {
    pub message: Option<String>,
    pub status: Option<String>,
}

impl ApiErrorResponse {
    pub(crate) fn message(&self) -> String {
        self.error
            .as_ref()
            .and_then(|e| e.message.clone().or_else(|| e.status.clone()))
            .unwrap_or_else(|| "unknown API error".to_owned())
    }
}

impl GeminiError {
    /// Whether the call is worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimit { .. } => true,
            Self::Api { status, .. } => *status == 408 || *status >= 500,
            Self::Transport(err) => err.is_timeout() || err.is_connect(),
            Self::Json(_) | Self::Empty(_) => false,
        }
    }

    /// Builds the error for a non-success status and its body.
    pub(crate) fn from_status(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<ApiErrorResponse>(body)
            .map_or_else(|_| body.chars().take(200).collect(), |e| e.message());
        if status == 429 {
            Self::RateLimit {
                message,
                retry_after_secs: None,
            }
        } else {
            Self::Api { status, message }
        }
    }
}

impl From<GeminiError> for bindery_core::BinderyError {
    fn from(err: GeminiError) -> Self {
        if err.is_retryable() {
            Self::transient(anyhow::anyhow!(err.to_string()))
        } else {
            Self::Service(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limits_and_server_errors_are_retryable() {
        assert!(GeminiError::from_status(429, "{}").is_retryable());
        assert!(GeminiError::from_status(503, "{}").is_retryable());
        assert!(!GeminiError::from_status(401, "{}").is_retryable());
        assert!(!GeminiError::from_status(400, "{}").is_retryable());
    }

    #[test]
    fn api_message_is_extracted_from_body() {
        let body = r#"{"error": {"message": "API key not valid", "status": "INVALID_ARGUMENT"}}"#;
        let err = GeminiError::from_status(400, body);
        assert!(err.to_string().contains("API key not valid"));
    }

    #[test]
    fn retryable_errors_convert_to_transient() {
        let err: bindery_core::BinderyError = GeminiError::from_status(429, "{}").into();
        assert!(err.is_transient());
        let err: bindery_core::BinderyError = GeminiError::from_status(403, "{}").into();
        assert!(!err.is_transient());
    }
}
