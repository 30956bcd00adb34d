//! [`LlmClient`] implementation.

use bindery_core::{GenerationRequest, LlmClient, Result};

use crate::client::Gemini;
use crate::types::{Content, GenerateContentRequest, GenerationConfig};

impl LlmClient for Gemini {
    fn model(&self) -> &str {
        &self.config().model
    }

    async fn generate_content(&self, request: GenerationRequest) -> Result<String> {
        let generation_config = GenerationConfig {
            temperature: request.config.temperature,
            max_output_tokens: request.config.max_output_tokens,
            response_mime_type: request
                .config
                .json_mode
                .then(|| "application/json".to_owned()),
            response_schema: request.config.response_schema.clone(),
        };

        let api_request = GenerateContentRequest {
            contents: vec![Content::text(Some("user"), request.contents)],
            system_instruction: request
                .system_instruction
                .map(|instruction| Content::text(None, instruction)),
            generation_config: Some(generation_config),
        };

        self.generate(api_request).await.map_err(Into::into)
    }
}
