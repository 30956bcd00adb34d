//! # bindery
//!
//! Facade crate that re-exports the bindery workspace: a durable, staged
//! pipeline turning insurance policy documents (policies, quotes,
//! schedules, loss runs) into a structured knowledge base — typed entities
//! with canonical identity, a relationship graph, and retrievable text
//! with provenance.
//!
//! ## What's inside?
//!
//! - [`bindery_core`] — the domain model, error taxonomy, configuration,
//!   and the replaceable service seams (OCR, LLM, embeddings, storage,
//!   graph).
//! - Stage crates behind the `pipeline` feature: page analysis, tables,
//!   chunking, section extraction, enrichment, synthesis, indexing.
//! - [`store`](bindery_store) — repositories over in-memory and redb
//!   backends.
//! - [`workflow`](bindery_workflow) — the four-stage orchestration plus
//!   product workflows (single document, policy comparison, quote
//!   comparison, proposal generation).
//! - Provider crates behind `gemini` / `openrouter` features.
//!
//! ## Example
//!
//! ```rust,ignore
//! use bindery::workflow::{Pipeline, ProcessDocumentWorkflow, WorkflowPayload};
//! # async fn demo<S, O, L, E, G, B>(pipeline: Pipeline<S, O, L, E, G, B>) -> bindery::Result<()>
//! # where
//! #     S: bindery::store::Store,
//! #     O: bindery::OcrService,
//! #     L: bindery::LlmClient,
//! #     E: bindery::EmbeddingClient,
//! #     G: bindery::GraphStore,
//! #     B: bindery::StorageService,
//! # {
//! let payload = WorkflowPayload::single(
//!     bindery::WorkflowId::generate(),
//!     bindery::DocumentId::generate(),
//! );
//! let workflow = ProcessDocumentWorkflow::new(&pipeline);
//! let results = workflow.run(&payload).await?;
//! println!("stages completed: {}", results.len());
//! # Ok(())
//! # }
//! ```

pub use bindery_core::*;

// Pipeline stages
#[cfg(feature = "bindery-analysis")]
pub use bindery_analysis as analysis;

#[cfg(feature = "bindery-tables")]
pub use bindery_tables as tables;

#[cfg(feature = "bindery-chunking")]
pub use bindery_chunking as chunking;

#[cfg(feature = "bindery-extraction")]
pub use bindery_extraction as extraction;

#[cfg(feature = "bindery-enrichment")]
pub use bindery_enrichment as enrichment;

#[cfg(feature = "bindery-synthesis")]
pub use bindery_synthesis as synthesis;

#[cfg(feature = "bindery-index")]
pub use bindery_index as index;

// Persistence
#[cfg(feature = "bindery-store")]
pub use bindery_store as store;

// Orchestration
#[cfg(feature = "bindery-workflow")]
pub use bindery_workflow as workflow;

// Provider integrations
#[cfg(feature = "gemini")]
pub use bindery_gemini as gemini;

#[cfg(feature = "openrouter")]
pub use bindery_openrouter as openrouter;
