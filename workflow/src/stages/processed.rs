//! PROCESSED: page analysis, selective OCR, tables, chunking.

use std::time::Duration;

use bindery_analysis::{ManifestBuilder, PageClassifier, SignalExtractor};
use bindery_chunking::HybridChunker;
use bindery_core::{
    BinderyError, DocumentId, EmbeddingClient, GraphStore, LlmClient, OcrService, Result,
    StorageService, TableKind,
};
use bindery_store::Store;
use bindery_tables::{LossRunNormalizer, SovNormalizer, TableCapture, TableClassifier};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::engine::{run_activity, ActivityOptions, Heartbeat};
use crate::events::EventSink;
use crate::pipeline::Pipeline;

/// Runs the PROCESSED stage and returns its summary.
pub async fn run<S, O, L, E, G, B>(
    pipeline: &Pipeline<S, O, L, E, G, B>,
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

    // Fetch the document row; a missing file path is fatal.
    let document = run_activity("fetch_document", ActivityOptions::status_update(), cancel, || {
        store.document(document_id)
    })
    .await?;
    let Some(file_path) = document.file_path.clone() else {
        return Err(BinderyError::NotFound(format!(
            "document {document_id} has no file path"
        )));
    };

    let url = run_activity("create_download_url", ActivityOptions::status_update(), cancel, || {
        pipeline
            .storage
            .create_download_url("documents", &file_path, Duration::from_secs(900))
    })
    .await?;

    // Page analysis runs over a preview parse that is not persisted; the
    // selective pass below persists only the pages worth keeping.
    let preview = run_activity("extract_page_signals", ActivityOptions::long_running(), cancel, || {
        heartbeat.beat("preview parse");
        pipeline.ocr.extract_pages(&url, document_id, None)
    })
    .await?;

    let signals = SignalExtractor::new().extract(&preview);
    let classifications = PageClassifier::new().classify(&signals);
    let manifest = ManifestBuilder::new().build(
        document_id,
        document.page_count.max(preview.len() as u32),
        classifications,
        &signals,
    )?;
    run_activity("create_page_manifest", ActivityOptions::status_update(), cancel, || {
        store.save_manifest(manifest.clone())
    })
    .await?;

    events.progress(
        "processed",
        0.05,
        format!(
            "manifest built: {} of {} pages selected",
            manifest.pages_to_process.len(),
            manifest.total_pages
        ),
    );

    // Selective OCR: the manifest decides which pages are persisted.
    let pages = if manifest.pages_to_process.is_empty() {
        Vec::new()
    } else {
        run_activity("ocr_extraction", ActivityOptions::long_running(), cancel, || {
            heartbeat.beat(format!("ocr over {} pages", manifest.pages_to_process.len()));
            pipeline
                .ocr
                .extract_pages(&url, document_id, Some(&manifest.pages_to_process))
        })
        .await?
    };
    run_activity("persist_pages", ActivityOptions::status_update(), cancel, || {
        store.replace_pages(document_id, pages.clone())
    })
    .await?;

    // Table extraction over the persisted pages.
    let mut tables_found = 0usize;
    if pipeline.config.ensure_table_extraction {
        let tables = TableCapture::new().capture(document_id, &pages);
        tables_found = tables.len();

        let classifier = TableClassifier::new();
        let mut classifications = Vec::with_capacity(tables.len());
        let mut sov_items = Vec::new();
        let mut loss_run_claims = Vec::new();

        for table in &tables {
            let context = pages
                .iter()
                .find(|p| p.page_number == table.page_number)
                .map(|p| p.text.as_str());
            let classification = classifier.classify(table, context);
            match classification.kind {
                TableKind::PropertySov => {
                    let outcome = SovNormalizer::new().normalize(document_id, table);
                    for warning in outcome.warnings {
                        events.warning(format!("sov table {}: {warning}", table.table_id));
                    }
                    sov_items.extend(outcome.rows);
                }
                TableKind::LossRun => {
                    let outcome = LossRunNormalizer::new().normalize(document_id, table);
                    for warning in outcome.warnings {
                        events.warning(format!("loss-run table {}: {warning}", table.table_id));
                    }
                    loss_run_claims.extend(outcome.rows);
                }
                // Other kinds are stored raw and skipped for
                // domain-object materialisation.
                _ => {}
            }
            classifications.push(classification);
        }

        run_activity("persist_tables", ActivityOptions::status_update(), cancel, || {
            let tables = tables.clone();
            let classifications = classifications.clone();
            let sov_items = sov_items.clone();
            let loss_run_claims = loss_run_claims.clone();
            async move {
                store.replace_tables(document_id, tables).await?;
                store
                    .replace_table_classifications(document_id, classifications)
                    .await?;
                store.replace_sov_items(document_id, sov_items).await?;
                store.replace_loss_run_claims(document_id, loss_run_claims).await
            }
        })
        .await?;
    }

    // Hybrid chunking consumes the manifest's section map verbatim.
    let chunking = HybridChunker::new(pipeline.config.chunking)
        .chunk_pages(&pages, &manifest.page_section_map);
    run_activity("persist_chunks", ActivityOptions::long_running(), cancel, || {
        heartbeat.beat(format!("persisting {} chunks", chunking.chunks.len()));
        let chunks = chunking.chunks.clone();
        let super_chunks = chunking.super_chunks.clone();
        async move {
            store.replace_chunks(document_id, chunks).await?;
            store.replace_super_chunks(document_id, super_chunks).await
        }
    })
    .await?;

    let profile = &manifest.document_profile;
    info!(
        document_id = %document_id,
        document_type = profile.document_type.as_str(),
        pages = manifest.pages_to_process.len(),
        tables = tables_found,
        chunks = chunking.chunks.len(),
        "processed stage complete"
    );

    Ok(json!({
        "stage": "processed",
        "status": "completed",
        "document_id": document_id.to_string(),
        "document_type": profile.document_type.as_str(),
        "document_subtype": profile.document_subtype,
        "profile_confidence": profile.confidence,
        "pages_processed": manifest.pages_to_process.len(),
        "pages_skipped": manifest.pages_skipped.len(),
        "processing_ratio": manifest.processing_ratio(),
        "tables_found": tables_found,
        "chunks_created": chunking.chunks.len(),
        "super_chunks_created": chunking.super_chunks.len(),
        "total_tokens": chunking.total_tokens,
    }))
}
