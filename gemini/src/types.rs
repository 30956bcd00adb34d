//! Request and response payloads for the Gemini REST API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One content block.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Content {
    /// Role: `user` or `model`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Content parts.
    pub parts: Vec<Part>,
}

impl Content {
    /// A single-part text content.
    #[must_use]
    pub fn text(role: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            role: role.map(str::to_owned),
            parts: vec![Part { text: text.into() }],
        }
    }
}

/// One text part.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Part {
    /// The text.
    pub text: String,
}

/// Generation parameters.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Output token cap.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    /// `application/json` switches the model into strict JSON mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
    /// Schema the JSON response must satisfy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<Value>,
}

/// `generateContent` request body.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    /// Conversation contents.
    pub contents: Vec<Content>,
    /// System instruction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<Content>,
    /// Generation parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

/// `generateContent` response body.
#[derive(Clone, Debug, Deserialize)]
pub struct GenerateContentResponse {
    /// Candidates, best first.
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

/// One response candidate.
#[derive(Clone, Debug, Deserialize)]
pub struct Candidate {
    /// Candidate content.
    pub content: Option<Content>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate.
    #[must_use]
    pub fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let text: String = content.parts.iter().map(|p| p.text.as_str()).collect();
        if text.is_empty() { None } else { Some(text) }
    }
}

/// One entry of a `batchEmbedContents` request.
#[derive(Clone, Debug, Serialize)]
pub struct EmbedContentRequest {
    /// Fully-qualified model name (`models/<model>`).
    pub model: String,
    /// Content to embed.
    pub content: Content,
}

/// `batchEmbedContents` request body.
#[derive(Clone, Debug, Serialize)]
pub struct BatchEmbedRequest {
    /// Per-text requests.
    pub requests: Vec<EmbedContentRequest>,
}

/// `batchEmbedContents` response body.
#[derive(Clone, Debug, Deserialize)]
pub struct BatchEmbedResponse {
    /// One embedding per request, in order.
    #[serde(default)]
    pub embeddings: Vec<EmbeddingValues>,
}

/// One embedding vector.
#[derive(Clone, Debug, Deserialize)]
pub struct EmbeddingValues {
    /// The vector.
    pub values: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_mode_serialises_with_camel_case_keys() {
        let request = GenerateContentRequest {
            contents: vec![Content::text(Some("user"), "hello")],
            system_instruction: Some(Content::text(None, "be terse")),
            generation_config: Some(GenerationConfig {
                response_mime_type: Some("application/json".to_owned()),
                ..GenerationConfig::default()
            }),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["generationConfig"]["responseMimeType"], json!("application/json"));
        assert_eq!(value["systemInstruction"]["parts"][0]["text"], json!("be terse"));
    }

    #[test]
    fn response_text_concatenates_first_candidate() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"role": "model", "parts": [
                {"text": "{\"a\":"}, {"text": " 1}"}
            ]}}]
        }))
        .unwrap();
        assert_eq!(response.text().as_deref(), Some("{\"a\": 1}"));
    }

    #[test]
    fn empty_candidates_yield_none() {
        let response: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
        assert!(response.text().is_none());
    }
}
