//! # Bindery Page Analysis
//!
//! The first sub-phase of the PROCESSED stage: decide, per page, whether
//! full processing is worth it and which section the page belongs to.
//!
//! Three pure passes mirror the activity boundaries of the workflow:
//!
//! 1. [`SignalExtractor`] computes lightweight per-page features from a
//!    preview parse (text density, table presence, a lexical fingerprint).
//! 2. [`PageClassifier`] assigns a [`bindery_core::PageType`] with
//!    confidence and a `should_process` flag, detecting near-duplicate
//!    pages by fingerprint.
//! 3. [`ManifestBuilder`] folds the classifications into the
//!    [`bindery_core::PageManifest`], whose `page_section_map` is the
//!    authoritative section assignment for the rest of the pipeline.

pub mod classifier;
pub mod manifest;
pub mod signals;

pub use classifier::PageClassifier;
pub use manifest::ManifestBuilder;
pub use signals::SignalExtractor;
