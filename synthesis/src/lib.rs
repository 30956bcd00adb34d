//! # Bindery Synthesis
//!
//! The post-extraction synthesis engine: transforms endorsement-centric
//! extraction into provision-centric output — what a broker wants to see.
//!
//! Modifications are grouped by impacted provision, an effective state is
//! determined by priority, carve-backs and conditions are collected, and
//! every output row carries citations (pages, verbatim text) plus a
//! taxonomy canonical id for cross-document matching. The engine never
//! fails the workflow: thin input degrades to lower-confidence output with
//! `fallback_recommended` set.

pub mod coverage;
pub mod exclusion;
pub mod inference;
pub mod knowledge;
pub mod orchestrator;
pub mod taxonomy;
pub mod types;

pub use coverage::CoverageSynthesizer;
pub use exclusion::ExclusionSynthesizer;
pub use inference::InferenceService;
pub use knowledge::BaseFormKnowledgeBase;
pub use orchestrator::SynthesisOrchestrator;
pub use types::{EndorsementRecord, Modification, SynthesisOutcome};
