//! Gemini HTTP client.

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::error::GeminiError;
use crate::types::{
    BatchEmbedRequest, BatchEmbedResponse, GenerateContentRequest, GenerateContentResponse,
};

const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Connection settings.
#[derive(Clone, Debug)]
pub struct GeminiConfig {
    /// API key.
    pub api_key: String,
    /// Generation model (e.g. `gemini-2.0-flash`).
    pub model: String,
    /// Embedding model (e.g. `text-embedding-004`).
    pub embedding_model: String,
    /// Embedding vector dimension for the embedding model.
    pub embedding_dimensions: usize,
    /// API base URL override.
    pub api_base: Option<Url>,
}

impl GeminiConfig {
    /// Settings with the default embedding model.
    #[must_use]
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            embedding_model: "text-embedding-004".to_owned(),
            embedding_dimensions: 768,
            api_base: None,
        }
    }
}

/// Gemini client implementing the core LLM and embedding seams.
#[derive(Clone, Debug)]
pub struct Gemini {
    http: Client,
    config: GeminiConfig,
}

impl Gemini {
    /// Creates a client.
    #[must_use]
    pub fn new(config: GeminiConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    /// The connection settings.
    #[must_use]
    pub const fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        let base = self
            .config
            .api_base
            .as_ref()
            .map_or(DEFAULT_API_BASE.to_owned(), |u| {
                u.as_str().trim_end_matches('/').to_owned()
            });
        format!("{base}/models/{model}:{method}")
    }

    async fn post<Req: Serialize, Res: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: &Req,
    ) -> Result<Res, GeminiError> {
        debug!(endpoint, "gemini request");
        let response = self
            .http
            .post(endpoint)
            .query(&[("key", self.config.api_key.as_str())])
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GeminiError::from_status(status.as_u16(), &body));
        }
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Calls `generateContent` and returns the first candidate's text.
    pub(crate) async fn generate(
        &self,
        request: GenerateContentRequest,
    ) -> Result<String, GeminiError> {
        let endpoint = self.endpoint(&self.config.model, "generateContent");
        let response: GenerateContentResponse = self.post(&endpoint, &request).await?;
        response
            .text()
            .ok_or_else(|| GeminiError::Empty("no candidate text in response".to_owned()))
    }

    /// Calls `batchEmbedContents` and returns the vectors in order.
    pub(crate) async fn embed_batch(
        &self,
        request: BatchEmbedRequest,
    ) -> Result<Vec<Vec<f32>>, GeminiError> {
        let endpoint = self.endpoint(&self.config.embedding_model, "batchEmbedContents");
        let response: BatchEmbedResponse = self.post(&endpoint, &request).await?;
        Ok(response.embeddings.into_iter().map(|e| e.values).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_uses_default_base() {
        let client = Gemini::new(GeminiConfig::new("key", "gemini-2.0-flash"));
        assert_eq!(
            client.endpoint("gemini-2.0-flash", "generateContent"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[test]
    fn endpoint_respects_base_override() {
        let mut config = GeminiConfig::new("key", "gemini-2.0-flash");
        config.api_base = Some(Url::parse("https://proxy.internal/v1beta/").unwrap());
        let client = Gemini::new(config);
        assert_eq!(
            client.endpoint("text-embedding-004", "batchEmbedContents"),
            "https://proxy.internal/v1beta/models/text-embedding-004:batchEmbedContents"
        );
    }
}
