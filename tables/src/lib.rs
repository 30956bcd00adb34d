//! # Bindery Tables
//!
//! The table pipeline of the PROCESSED stage. For every page flagged with
//! tables:
//!
//! 1. [`TableCapture`] prefers the structural `TableJson` captured during
//!    OCR and falls back to parsing markdown pipe tables.
//! 2. [`TableClassifier`] assigns a [`bindery_core::TableKind`] with a
//!    rules scorer over header and column keywords.
//! 3. [`SovNormalizer`] and [`LossRunNormalizer`] turn `property_sov` and
//!    `loss_run` tables into typed domain rows; other kinds stay raw.

pub mod capture;
pub mod classify;
pub mod normalize;

pub use capture::TableCapture;
pub use classify::TableClassifier;
pub use normalize::{LossRunNormalizer, NormalizeOutcome, SovNormalizer};
