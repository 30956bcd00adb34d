//! Persisted section extraction results.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::chunk::SectionType;
use crate::id::{ChunkId, DocumentId, ExtractionId};
use crate::mention::EntityMention;

/// Chunk provenance carried on every section extraction for citation.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SourceChunks {
    /// Stable ids of the contributing chunks.
    pub chunk_ids: Vec<ChunkId>,
    /// Inclusive page range covered by those chunks.
    pub page_range: Option<(u32, u32)>,
}

/// One section's extraction output. Multiple rows per document are allowed
/// (one per section type per run).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SectionExtraction {
    /// Row identifier.
    pub id: ExtractionId,
    /// Owning document.
    pub document_id: DocumentId,
    /// Extracted section.
    pub section_type: SectionType,
    /// Structured fields, shaped by the section's schema.
    pub extracted_data: Value,
    /// Entities found in the section.
    pub entities: Vec<EntityMention>,
    /// Extraction confidence in `[0, 1]`; 0 for a failed section.
    pub confidence: f32,
    /// Chunk provenance.
    pub source_chunks: SourceChunks,
    /// Model that produced the extraction, when an LLM ran.
    pub model_version: Option<String>,
    /// Tokens processed.
    pub token_count: usize,
    /// Wall time spent, in milliseconds.
    pub processing_time_ms: u64,
}

impl SectionExtraction {
    /// Creates an empty, zero-confidence result for a failed section.
    #[must_use]
    pub fn empty(document_id: DocumentId, section_type: SectionType) -> Self {
        Self {
            id: ExtractionId::generate(),
            document_id,
            section_type,
            extracted_data: Value::Object(serde_json::Map::new()),
            entities: Vec::new(),
            confidence: 0.0,
            source_chunks: SourceChunks::default(),
            model_version: None,
            token_count: 0,
            processing_time_ms: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_result_has_zero_confidence() {
        let row = SectionExtraction::empty(DocumentId::generate(), SectionType::Coverages);
        assert!(row.confidence.abs() < f32::EPSILON);
        assert!(row.entities.is_empty());
        assert!(row.source_chunks.chunk_ids.is_empty());
    }
}
