//! # Bindery Chunking
//!
//! Section-aware hybrid chunking for the PROCESSED stage.
//!
//! Pages are grouped into contiguous same-section runs (sections come from
//! the manifest's `page_section_map` and are never re-detected here), then
//! split on paragraph boundaries under a token budget. Each chunk carries a
//! content-hash id, so re-runs over the same input produce identical ids
//! and downstream references stay reproducible. Contiguous same-section
//! chunks are grouped into token-bounded super-chunks for the extractors.

pub mod chunker;
pub mod tokens;

pub use chunker::{ChunkingResult, ChunkingStatistics, HybridChunker};
pub use tokens::estimate_tokens;
