//! Traits for the replaceable external collaborators.
//!
//! The pipeline never talks to a PDF parser, an LLM vendor, a byte store,
//! or a graph database directly; it consumes these seams. Provider crates
//! implement them over HTTP, tests substitute recorded fakes.

use core::future::Future;
use core::time::Duration;

use serde_json::Value;
use url::Url;

use crate::document::Page;
use crate::error::Result;
use crate::id::DocumentId;
use crate::indexing::{GraphEdgeSpec, GraphNodeSpec};

/// Structural PDF parsing and OCR.
///
/// One call parses the whole document; when `pages_to_process` is given,
/// only those pages are returned (parsers cannot skip pages internally, so
/// filtering happens after the single parse).
pub trait OcrService: Send + Sync {
    /// Extracts pages from the document behind `url`.
    fn extract_pages(
        &self,
        url: &Url,
        document_id: DocumentId,
        pages_to_process: Option<&[u32]>,
    ) -> impl Future<Output = Result<Vec<Page>>> + Send;
}

/// Generation parameters for one LLM call.
#[derive(Clone, Debug, Default)]
pub struct GenerationConfig {
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Output token cap.
    pub max_output_tokens: Option<u32>,
    /// Request strict JSON output.
    pub json_mode: bool,
    /// JSON schema the response must satisfy, when the provider supports it.
    pub response_schema: Option<Value>,
}

/// One LLM generation request.
#[derive(Clone, Debug)]
pub struct GenerationRequest {
    /// System instruction prepended to the conversation.
    pub system_instruction: Option<String>,
    /// User contents.
    pub contents: String,
    /// Generation parameters.
    pub config: GenerationConfig,
}

impl GenerationRequest {
    /// Creates a request with default parameters.
    #[must_use]
    pub fn new(contents: impl Into<String>) -> Self {
        Self {
            system_instruction: None,
            contents: contents.into(),
            config: GenerationConfig::default(),
        }
    }

    /// Sets the system instruction.
    #[must_use]
    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    /// Requests strict JSON output.
    #[must_use]
    pub const fn json_mode(mut self) -> Self {
        self.config.json_mode = true;
        self
    }

    /// Attaches a response schema.
    #[must_use]
    pub fn with_response_schema(mut self, schema: Value) -> Self {
        self.config.response_schema = Some(schema);
        self
    }
}

/// Text generation behind a single replaceable interface.
///
/// All LLM non-determinism is isolated here; tests substitute a
/// recorded-response fake and assert post-synthesis invariants instead of
/// exact outputs.
pub trait LlmClient: Send + Sync {
    /// The model identifier recorded on extraction rows.
    fn model(&self) -> &str;

    /// Generates content for the request, returning the raw response text.
    fn generate_content(
        &self,
        request: GenerationRequest,
    ) -> impl Future<Output = Result<String>> + Send;
}

/// Batch text embedding.
pub trait EmbeddingClient: Send + Sync {
    /// Embedding vector dimension.
    fn dim(&self) -> usize;

    /// Embeds each text; the result has one vector per input, each of
    /// length [`dim`](EmbeddingClient::dim).
    fn embed(&self, texts: &[String]) -> impl Future<Output = Result<Vec<Vec<f32>>>> + Send;
}

/// Byte storage the OCR service reads from.
pub trait StorageService: Send + Sync {
    /// Creates a time-limited download URL for an object.
    fn create_download_url(
        &self,
        bucket: &str,
        path: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<Url>> + Send;
}

/// Graph database projection target.
pub trait GraphStore: Send + Sync {
    /// Writes (or upserts) a node.
    fn write_node(&self, node: GraphNodeSpec) -> impl Future<Output = Result<()>> + Send;

    /// Writes an edge between existing nodes.
    fn write_edge(&self, edge: GraphEdgeSpec) -> impl Future<Output = Result<()>> + Send;
}
