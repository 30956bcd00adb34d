//! EXTRACTED: per-section LLM extraction and step-output persistence.

use bindery_core::{
    DocumentId, EmbeddingClient, GraphStore, LlmClient, OcrService, Result, StorageService,
    WorkflowId,
};
use bindery_extraction::SectionExtractionOrchestrator;
use bindery_store::{StepEntityOutput, StepSectionOutput, Store};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use crate::engine::{run_activity, ActivityOptions};
use crate::events::EventSink;
use crate::pipeline::Pipeline;

/// Runs the EXTRACTED stage and returns its summary.
pub async fn run<S, O, L, E, G, B>(
    pipeline: &Pipeline<S, O, L, E, G, B>,
    workflow_id: WorkflowId,
    document_id: DocumentId,
    cancel: &CancellationToken,
    events: &EventSink,
) -> Result<Value>
where
    S: Store,
    O: OcrService,
    L: LlmClient,
    E: EmbeddingClient,
    G: GraphStore,
    B: StorageService,
{
    let store = &pipeline.store;

    let mut super_chunks = run_activity(
        "load_super_chunks",
        ActivityOptions::status_update(),
        cancel,
        || store.super_chunks(document_id),
    )
    .await?;

    // Product configs can narrow extraction to the sections they need.
    super_chunks.retain(|sc| pipeline.config.wants_section(sc.section_type));

    let orchestrator = SectionExtractionOrchestrator::new();
    let result = run_activity("extract_sections", ActivityOptions::extractor(), cancel, || async {
        Ok(orchestrator.extract_all_sections(&pipeline.llm, document_id, &super_chunks).await)
    })
    .await?;

    let failed_sections = result
        .section_results
        .iter()
        .filter(|r| r.confidence.abs() < f32::EPSILON && r.entities.is_empty())
        .count();
    if failed_sections > 0 {
        events.warning(format!(
            "{failed_sections} section(s) degraded to empty extraction"
        ));
    }

    // Persist extraction rows plus the step outputs product UIs read.
    run_activity("persist_extractions", ActivityOptions::status_update(), cancel, || {
        let rows = result.section_results.clone();
        async move {
            for row in rows {
                let section_output = StepSectionOutput {
                    id: Uuid::new_v4(),
                    document_id,
                    workflow_id,
                    section_type: row.section_type,
                    display_payload: row.extracted_data.clone(),
                    confidence: row.confidence,
                    page_range: row.source_chunks.page_range,
                    source_extraction_id: Some(row.id),
                };
                for entity in &row.entities {
                    store
                        .add_step_entity_output(StepEntityOutput {
                            id: Uuid::new_v4(),
                            document_id,
                            workflow_id,
                            entity_type: entity.entity_type.as_str().to_owned(),
                            entity_label: entity.normalized_value.clone(),
                            display_payload: serde_json::to_value(entity)?,
                            confidence: entity.confidence,
                            source_extraction_id: Some(row.id),
                        })
                        .await?;
                }
                store.add_section_extraction(row).await?;
                store.add_step_section_output(section_output).await?;
            }
            Ok(())
        }
    })
    .await?;

    let entity_count = result.all_entities.len();
    events.progress(
        "extracted",
        0.5,
        format!(
            "{} sections extracted, {} entities",
            result.section_results.len(),
            entity_count
        ),
    );
    info!(
        document_id = %document_id,
        sections = result.section_results.len(),
        entities = entity_count,
        backstopped = result.backstop.total_backstopped(),
        "extracted stage complete"
    );

    Ok(json!({
        "stage": "extracted",
        "status": "completed",
        "document_id": document_id.to_string(),
        "sections_extracted": result.section_results.len(),
        "sections_failed": failed_sections,
        "entities_found": entity_count,
        "entities_backstopped": result.backstop.total_backstopped(),
        "total_tokens": result.total_tokens,
    }))
}
