//! The service bundle handed to every stage.

use bindery_core::{
    EmbeddingClient, GraphStore, LlmClient, OcrService, PipelineConfig, StorageService,
};
use bindery_store::Store;

/// Everything the stages need: the relational store, the replaceable
/// external services, and the product configuration.
///
/// Generic over every seam so tests wire recorded fakes and production
/// wires provider crates, with no trait objects in between.
#[derive(Debug)]
pub struct Pipeline<S, O, L, E, G, B> {
    /// The relational store (single source of truth).
    pub store: S,
    /// Structural PDF parsing and OCR.
    pub ocr: O,
    /// Text generation.
    pub llm: L,
    /// Batch embeddings.
    pub embeddings: E,
    /// Graph projection target.
    pub graph: G,
    /// Byte storage for document downloads.
    pub storage: B,
    /// Product configuration.
    pub config: PipelineConfig,
}

impl<S, O, L, E, G, B> Pipeline<S, O, L, E, G, B>
where
    S: Store,
    O: OcrService,
    L: LlmClient,
    E: EmbeddingClient,
    G: GraphStore,
    B: StorageService,
{
    /// Bundles services with the given configuration.
    pub const fn new(
        store: S,
        ocr: O,
        llm: L,
        embeddings: E,
        graph: G,
        storage: B,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store,
            ocr,
            llm,
            embeddings,
            graph,
            storage,
            config,
        }
    }
}
