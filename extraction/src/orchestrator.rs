//! The section extraction run loop.

use std::time::Instant;

use bindery_core::{
    DocumentId, EntityMention, GenerationRequest, LlmClient, SectionExtraction, SectionSuperChunk,
    SourceChunks,
};
use tracing::{debug, error, info};

use crate::json::parse_json_tolerant;
use crate::parser::DeterministicParser;
use crate::reconcile::{reconcile_mentions, ReconcileStats};
use crate::registry::ExtractorRegistry;
use crate::strategies::EntitySynthesizer;

/// Complete extraction output for one document.
#[derive(Clone, Debug, Default)]
pub struct DocumentExtractionResult {
    /// Per-section extraction rows, in processing order.
    pub section_results: Vec<SectionExtraction>,
    /// All entities across sections, post-reconciliation.
    pub all_entities: Vec<EntityMention>,
    /// Total tokens processed.
    pub total_tokens: usize,
    /// Total wall time, milliseconds.
    pub total_processing_time_ms: u64,
    /// Parser backstop statistics.
    pub backstop: ReconcileStats,
}

/// Runs super-chunks through their section extractors in priority order.
///
/// A failed section (transport error, malformed JSON) yields an empty
/// zero-confidence row; the remaining sections continue.
#[derive(Debug, Clone, Default)]
pub struct SectionExtractionOrchestrator {
    registry: ExtractorRegistry,
    synthesizer: EntitySynthesizer,
    parser: DeterministicParser,
}

impl SectionExtractionOrchestrator {
    /// Creates an orchestrator with the standard registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: ExtractorRegistry::new(),
            synthesizer: EntitySynthesizer::new(),
            parser: DeterministicParser::new(),
        }
    }

    /// Extracts all LLM-requiring sections of a document.
    pub async fn extract_all_sections<L: LlmClient>(
        &self,
        client: &L,
        document_id: DocumentId,
        super_chunks: &[SectionSuperChunk],
    ) -> DocumentExtractionResult {
        let mut llm_sections: Vec<&SectionSuperChunk> =
            super_chunks.iter().filter(|sc| sc.requires_llm).collect();
        llm_sections.sort_by_key(|sc| sc.processing_priority);

        info!(
            document_id = %document_id,
            total_super_chunks = super_chunks.len(),
            llm_sections = llm_sections.len(),
            "starting section extraction"
        );

        let mut result = DocumentExtractionResult::default();

        for super_chunk in llm_sections {
            let (row, stats) = self.extract_section(client, document_id, super_chunk).await;
            result.total_tokens += row.token_count;
            result.total_processing_time_ms += row.processing_time_ms;
            result.all_entities.extend(row.entities.iter().cloned());
            for (entity_type, count) in stats.backstopped {
                *result.backstop.backstopped.entry(entity_type).or_default() += count;
            }
            result.section_results.push(row);
        }

        info!(
            document_id = %document_id,
            sections = result.section_results.len(),
            entities = result.all_entities.len(),
            backstopped = result.backstop.total_backstopped(),
            "section extraction completed"
        );
        result
    }

    async fn extract_section<L: LlmClient>(
        &self,
        client: &L,
        document_id: DocumentId,
        super_chunk: &SectionSuperChunk,
    ) -> (SectionExtraction, ReconcileStats) {
        let started = Instant::now();
        let section = super_chunk.section_type;
        let text = super_chunk.text();
        let kind = self.registry.resolve_for_chunk(section, &text);

        let request = GenerationRequest::new(kind.prompt(&text))
            .with_system_instruction(kind.system_instruction())
            .json_mode()
            .with_response_schema(kind.response_schema());

        let response = match client.generate_content(request).await {
            Ok(response) => response,
            Err(err) => {
                error!(section = section.as_str(), %err, "section extraction failed");
                return (
                    SectionExtraction::empty(document_id, section),
                    ReconcileStats::default(),
                );
            }
        };

        let parsed = match parse_json_tolerant(&response) {
            Ok(value) => value,
            Err(err) => {
                error!(section = section.as_str(), %err, "model output unparseable");
                return (
                    SectionExtraction::empty(document_id, section),
                    ReconcileStats::default(),
                );
            }
        };

        let (extracted_data, confidence) = kind.map_response(parsed);

        // Strategy-synthesised entities, backstopped by the deterministic
        // parser over the same text.
        let llm_entities = self.synthesizer.synthesize(section, &extracted_data, confidence);
        let parsed_entities = self.parser.parse_all(&text);
        let (mut entities, stats) = reconcile_mentions(llm_entities, parsed_entities);

        let first_chunk = super_chunk.chunks.first().map(|c| c.id.clone());
        for mention in &mut entities {
            if mention.chunk_id.is_none() {
                mention.chunk_id = first_chunk.clone();
            }
        }

        debug!(
            section = section.as_str(),
            entities = entities.len(),
            confidence,
            "section extracted"
        );

        let row = SectionExtraction {
            id: bindery_core::ExtractionId::generate(),
            document_id,
            section_type: section,
            extracted_data,
            entities,
            confidence,
            source_chunks: SourceChunks {
                chunk_ids: super_chunk.chunk_ids(),
                page_range: super_chunk.page_range(),
            },
            model_version: Some(client.model().to_owned()),
            token_count: super_chunk.total_tokens,
            processing_time_ms: started.elapsed().as_millis() as u64,
        };
        (row, stats)
    }
}
