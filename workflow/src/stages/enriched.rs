//! ENRICHED: aggregation, canonical resolution (saga), relationships,
//! synthesis.

use bindery_core::{
    DocumentId, EmbeddingClient, EntityMention, EntityType, GraphStore, LlmClient, OcrService,
    Result, StorageService, WorkflowId,
};
use bindery_enrichment::{aggregate_mentions, CanonicalResolver, RelationshipExtractor, SagaLog};
use bindery_store::Store;
use bindery_synthesis::SynthesisOrchestrator;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::engine::{run_activity, run_shielded, ActivityOptions};
use crate::events::EventSink;
use crate::pipeline::Pipeline;

/// Runs the ENRICHED stage and returns its summary.
///
/// Canonical entities created here are tracked in an explicit saga log; if
/// relationship extraction or persistence fails afterwards, the rollback
/// activity deletes exactly those ids (in reverse order) before the error
/// propagates. Rollback is shielded from cancellation.
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

    // Aggregate mentions across all section extractions.
    let sections = run_activity(
        "aggregate_document_entities",
        ActivityOptions::extractor(),
        cancel,
        || store.section_extractions(document_id),
    )
    .await?;
    let mentions: Vec<EntityMention> = sections
        .iter()
        .flat_map(|s| s.entities.iter().cloned())
        .collect();
    let aggregates = aggregate_mentions(&mentions);

    // Resolve against the existing canonical set and persist the plan.
    let involved_types: Vec<EntityType> = {
        let mut types: Vec<EntityType> = aggregates.iter().map(|a| a.entity_type).collect();
        types.sort();
        types.dedup();
        types
    };
    let existing = run_activity(
        "load_canonical_candidates",
        ActivityOptions::status_update(),
        cancel,
        || store.canonical_entities_by_type(&involved_types),
    )
    .await?;

    let plan = CanonicalResolver::new().resolve(&existing, aggregates);
    let saga: SagaLog = plan.saga.clone();
    let all_ids = plan.all_ids();

    run_activity("resolve_canonical_entities", ActivityOptions::status_update(), cancel, || {
        let created = plan.created.clone();
        let merged = plan.merged.clone();
        let ids = all_ids.clone();
        async move {
            for entity in created.into_iter().chain(merged) {
                store.upsert_canonical_entity(entity).await?;
            }
            store.replace_document_entity_links(document_id, ids).await
        }
    })
    .await?;

    events.progress(
        "enriched",
        0.65,
        format!(
            "{} canonical entities ({} new)",
            all_ids.len(),
            saga.created_ids().len()
        ),
    );

    // Everything after this point is compensated on failure.
    match enrich_after_resolution(pipeline, workflow_id, document_id, cancel, events).await {
        Ok(summary) => {
            let entities_resolved = all_ids.len();
            info!(
                document_id = %document_id,
                entities = entities_resolved,
                "enriched stage complete"
            );
            let mut summary = summary;
            if let Some(object) = summary.as_object_mut() {
                object.insert("entities_resolved".to_owned(), json!(entities_resolved));
                object.insert("entities_created".to_owned(), json!(saga.created_ids().len()));
            }
            Ok(summary)
        }
        Err(err) => {
            if !saga.is_empty() {
                warn!(
                    document_id = %document_id,
                    created = saga.created_ids().len(),
                    "saga rollback: deleting canonical entities created this run"
                );
                run_shielded("rollback_entities", ActivityOptions::compensation(), || {
                    let ids = saga.rollback_order();
                    async move {
                        for id in ids {
                            // Idempotent: an id already gone is fine.
                            store.delete_canonical_entity(id).await?;
                        }
                        Ok(())
                    }
                })
                .await?;
            }
            Err(err)
        }
    }
}

/// The post-resolution half: relationship extraction and synthesis.
async fn enrich_after_resolution<S, O, L, E, G, B>(
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

    let entity_ids = store.document_entity_ids(document_id).await?;
    let entities = store.canonical_entities(&entity_ids).await?;

    let extractor = RelationshipExtractor::new();
    let relationships = run_activity(
        "extract_relationships",
        ActivityOptions::extractor(),
        cancel,
        || async {
            Ok(extractor.extract(&pipeline.llm, workflow_id, document_id, &entities).await)
        },
    )
    .await?;

    run_activity("persist_relationships", ActivityOptions::status_update(), cancel, || {
        store.add_relationships(relationships.clone())
    })
    .await?;

    // Synthesis never fails the stage; it degrades with a flag instead.
    let sections = store.section_extractions(document_id).await?;
    let synthesis = SynthesisOrchestrator::new(
        pipeline.config.confidence_threshold,
        pipeline.config.enable_llm_fallback,
    )
    .synthesize_with_fallback(&pipeline.llm, &sections)
    .await;

    if synthesis.fallback_recommended && !synthesis.fallback_used {
        events.warning(format!(
            "synthesis confidence {:.2} below threshold; fallback recommended",
            synthesis.overall_confidence
        ));
    }

    Ok(json!({
        "stage": "enriched",
        "status": "completed",
        "document_id": document_id.to_string(),
        "relationship_count": relationships.len(),
        "effective_coverages": synthesis.effective_coverages.len(),
        "effective_exclusions": synthesis.effective_exclusions.len(),
        "synthesis": serde_json::to_value(&synthesis)?,
    }))
}
