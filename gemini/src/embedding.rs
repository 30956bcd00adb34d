//! [`EmbeddingClient`] implementation.

use bindery_core::{EmbeddingClient, Result};

use crate::client::Gemini;
use crate::types::{BatchEmbedRequest, Content, EmbedContentRequest};

impl EmbeddingClient for Gemini {
    fn dim(&self) -> usize {
        self.config().embedding_dimensions
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let model = format!("models/{}", self.config().embedding_model);
        let request = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|text| EmbedContentRequest {
                    model: model.clone(),
                    content: Content::text(None, text.clone()),
                })
                .collect(),
        };
        self.embed_batch(request).await.map_err(Into::into)
    }
}
