//! # Bindery Gemini
//!
//! Google Gemini implementations of the [`bindery_core::LlmClient`] and
//! [`bindery_core::EmbeddingClient`] seams, over the public REST API.
//!
//! JSON mode maps to `response_mime_type: "application/json"` plus the
//! request's response schema; embeddings go through `batchEmbedContents`.

pub mod client;
pub mod embedding;
pub mod error;
pub mod llm;
pub mod types;

pub use client::{Gemini, GeminiConfig};
pub use error::GeminiError;
