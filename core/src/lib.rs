//! # Bindery Core
//!
//! Domain model and service seams for the bindery document pipeline.
//!
//! This crate defines everything the pipeline stages agree on:
//!
//! - Typed rows for documents, pages, manifests, tables, chunks, section
//!   extractions, canonical entities, relationships, and effective
//!   provisions, each with a stable identity.
//! - The error taxonomy the workflow retry policy dispatches on.
//! - Traits for the replaceable external collaborators: OCR, language
//!   models, embeddings, byte storage, and the graph store. Concrete
//!   implementations live in provider crates; tests substitute recorded
//!   fakes.
//!
//! Nothing in this crate performs I/O.

pub mod analysis;
pub mod chunk;
pub mod config;
pub mod document;
pub mod entity;
pub mod error;
pub mod id;
pub mod indexing;
pub mod mention;
pub mod provision;
pub mod section;
pub mod services;
pub mod stage;
pub mod table;
pub mod text;

pub use analysis::{
    DocumentProfile, DocumentType, PageClassification, PageManifest, PageSignal, PageType,
    SectionBoundary,
};
pub use chunk::{HybridChunk, SectionSuperChunk, SectionType};
pub use config::{ChunkingBudgets, LlmProvider, LlmSettings, PipelineConfig};
pub use document::{Document, Page, PageDimensions, PageMetadata, ProcessingStatus, WordBox};
pub use entity::{CanonicalEntity, Relationship, RelationshipType};
pub use error::{BinderyError, Result};
pub use id::{
    CanonicalEntityId, ChunkId, DocumentId, ExtractionId, RelationshipId, TableId, WorkflowId,
};
pub use indexing::{GraphEdgeSpec, GraphNodeSpec, VectorEmbeddingRow};
pub use mention::{EntityMention, EntityType, MentionSource};
pub use provision::{EffectiveCoverage, EffectiveExclusion, EffectiveState, Severity, SynthesisMethod};
pub use section::{SectionExtraction, SourceChunks};
pub use services::{
    EmbeddingClient, GenerationConfig, GenerationRequest, GraphStore, LlmClient, OcrService,
    StorageService,
};
pub use stage::{Stage, StageRun, StageStatus};
pub use table::{
    LossRunClaim, SovItem, TableCell, TableClassification, TableExtractionSource, TableJson,
    TableKind,
};
