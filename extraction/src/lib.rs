//! # Bindery Extraction
//!
//! The EXTRACTED stage: schema-driven section extraction and entity
//! synthesis.
//!
//! - [`ExtractorRegistry`] maps normalised section names (with aliases) to
//!   extractor implementations; unknown sections fall back to the default
//!   extractor.
//! - [`SectionExtractionOrchestrator`] runs super-chunks through their
//!   extractors in priority order. A failed section yields an empty result
//!   with confidence 0; the run continues.
//! - [`DeterministicParser`] backstops the LLM with curated regex families
//!   for policy numbers, insured names, dates, and carriers;
//!   [`reconcile_mentions`] merges the two sources per chunk.
//! - [`EntitySynthesizer`] turns each section's extracted fields into typed
//!   domain entities with slugified document-local identifiers and
//!   schema-validated attributes.

pub mod json;
pub mod orchestrator;
pub mod parser;
pub mod reconcile;
pub mod registry;
pub mod schema;
pub mod strategies;

pub use json::parse_json_tolerant;
pub use orchestrator::{DocumentExtractionResult, SectionExtractionOrchestrator};
pub use parser::DeterministicParser;
pub use reconcile::{reconcile_mentions, ReconcileStats};
pub use registry::{ExtractorKind, ExtractorRegistry};
pub use strategies::EntitySynthesizer;
