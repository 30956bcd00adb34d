//! # Bindery Index
//!
//! The SUMMARIZED stage: embedding rows for retrieval and a graph
//! projection of canonical entities and relationships.
//!
//! Both targets are eventually consistent with the relational store; they
//! are written only here, after the ENRICHED stage has committed.

pub mod graph;
pub mod vector;

pub use graph::{GraphProjector, MemoryGraphStore};
pub use vector::VectorIndexer;
