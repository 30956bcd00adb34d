//! SUMMARIZED: vector embeddings and graph projection.

use bindery_core::{
    DocumentId, EmbeddingClient, GraphStore, LlmClient, OcrService, Result, Stage,
    StorageService, WorkflowId,
};
use bindery_index::{GraphProjector, VectorIndexer};
use bindery_store::Store;
use bindery_synthesis::SynthesisOutcome;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::engine::{run_activity, ActivityOptions, Heartbeat};
use crate::events::EventSink;
use crate::pipeline::Pipeline;

/// Runs the SUMMARIZED stage and returns its summary.
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
    let heartbeat = Heartbeat::new();

    let chunks = store.chunks(document_id).await?;
    let entity_ids = store.document_entity_ids(document_id).await?;
    let entities = store.canonical_entities(&entity_ids).await?;

    // Vector embeddings for chunks and canonical entities.
    let embedding_count = run_activity(
        "generate_embeddings",
        ActivityOptions::long_running(),
        cancel,
        || {
            heartbeat.beat(format!("embedding {} chunks", chunks.len()));
            let chunks = chunks.clone();
            let entities = entities.clone();
            async move {
                let indexer = VectorIndexer::new();
                let mut rows = indexer
                    .embed_chunks(&pipeline.embeddings, document_id, &chunks)
                    .await?;
                rows.extend(
                    indexer
                        .embed_entities(&pipeline.embeddings, document_id, &entities)
                        .await?,
                );
                let count = rows.len();
                store.add_embeddings(rows).await?;
                Ok(count)
            }
        },
    )
    .await?;

    // Graph projection, scoped by workflow id, plus evidence edges from
    // the synthesis outcome carried on the enriched stage marker.
    let relationships = store.relationships(document_id).await?;
    let projector = GraphProjector::new();
    run_activity("project_graph", ActivityOptions::extractor(), cancel, || {
        projector.project(&pipeline.graph, workflow_id, &entities, &relationships)
    })
    .await?;

    let synthesis = enriched_synthesis(pipeline, workflow_id, document_id).await?;
    if let Some(synthesis) = &synthesis {
        run_activity("project_evidence", ActivityOptions::extractor(), cancel, || {
            projector.project_evidence(
                &pipeline.graph,
                workflow_id,
                &synthesis.effective_coverages,
                &synthesis.effective_exclusions,
            )
        })
        .await?;
    }

    events.progress(
        "summarized",
        0.95,
        format!(
            "{embedding_count} embeddings, {} nodes, {} edges",
            entities.len(),
            relationships.len()
        ),
    );
    info!(
        document_id = %document_id,
        embeddings = embedding_count,
        nodes = entities.len(),
        edges = relationships.len(),
        "summarized stage complete"
    );

    Ok(json!({
        "stage": "summarized",
        "status": "completed",
        "document_id": document_id.to_string(),
        "embeddings_written": embedding_count,
        "graph_nodes": entities.len(),
        "graph_edges": relationships.len(),
        "summarized": true,
        "indexed": true,
    }))
}

/// Reads the synthesis outcome persisted on the enriched stage marker.
async fn enriched_synthesis<S, O, L, E, G, B>(
    pipeline: &Pipeline<S, O, L, E, G, B>,
    workflow_id: WorkflowId,
    document_id: DocumentId,
) -> Result<Option<SynthesisOutcome>>
where
    S: Store,
    O: OcrService,
    L: LlmClient,
    E: EmbeddingClient,
    G: GraphStore,
    B: StorageService,
{
    let Some(run) = pipeline
        .store
        .stage_run(workflow_id, document_id, Stage::Enriched)
        .await?
    else {
        return Ok(None);
    };
    let Some(synthesis) = run.summary.as_ref().and_then(|s| s.get("synthesis")) else {
        return Ok(None);
    };
    Ok(serde_json::from_value(synthesis.clone()).ok())
}
