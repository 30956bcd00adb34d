//! Quote comparison: premiums and coverage states across quotes.

use std::collections::BTreeMap;

use bindery_core::{
    BinderyError, DocumentId, EmbeddingClient, GraphStore, LlmClient, OcrService, Result,
    SectionType, StorageService,
};
use bindery_store::Store;
use serde_json::{json, Value};
use tracing::info;

use crate::events::EventSink;
use crate::payload::WorkflowPayload;
use crate::pipeline::Pipeline;
use crate::process_document::ProcessDocumentWorkflow;
use crate::product::synthesis_for;

/// Compares two or more quotes: premium side-by-side plus effective
/// coverage states.
#[derive(Debug)]
pub struct QuoteComparisonWorkflow<'a, S, O, L, E, G, B> {
    pipeline: &'a Pipeline<S, O, L, E, G, B>,
    events: EventSink,
}

impl<'a, S, O, L, E, G, B> QuoteComparisonWorkflow<'a, S, O, L, E, G, B>
where
    S: Store,
    O: OcrService,
    L: LlmClient,
    E: EmbeddingClient,
    G: GraphStore,
    B: StorageService,
{
    /// Creates the workflow.
    #[must_use]
    pub fn new(pipeline: &'a Pipeline<S, O, L, E, G, B>) -> Self {
        Self {
            pipeline,
            events: EventSink::disabled(),
        }
    }

    /// Wires an event sink.
    #[must_use]
    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    /// Processes each quote, then assembles the comparison.
    pub async fn run(&self, payload: &WorkflowPayload) -> Result<Value> {
        if payload.documents.len() < 2 {
            return Err(BinderyError::InvariantViolation(format!(
                "quote comparison requires at least two documents, got {}",
                payload.documents.len()
            )));
        }

        for document in &payload.documents {
            let single = WorkflowPayload {
                documents: vec![document.clone()],
                ..payload.clone()
            };
            ProcessDocumentWorkflow::new(self.pipeline)
                .with_events(self.events.clone())
                .run(&single)
                .await?;
        }

        let mut premiums: BTreeMap<String, Value> = BTreeMap::new();
        let mut coverage_counts: BTreeMap<String, usize> = BTreeMap::new();

        for document in &payload.documents {
            let key = document.document_id.to_string();
            premiums.insert(
                key.clone(),
                self.declared_premium(document.document_id)
                    .await?
                    .map_or(Value::Null, Value::String),
            );
            if let Some(outcome) = synthesis_for(
                &self.pipeline.store,
                payload.workflow_id,
                document.document_id,
            )
            .await?
            {
                coverage_counts.insert(key, outcome.effective_coverages.len());
            }
        }

        info!(documents = payload.documents.len(), "quote comparison complete");

        Ok(json!({
            "status": "completed",
            "workflow_id": payload.workflow_id.to_string(),
            "documents": payload.documents.iter().map(|d| d.document_id.to_string()).collect::<Vec<_>>(),
            "premiums": premiums,
            "coverage_counts": coverage_counts,
        }))
    }

    /// Total premium from the quote's declarations extraction.
    async fn declared_premium(&self, document_id: DocumentId) -> Result<Option<String>> {
        let sections = self.pipeline.store.section_extractions(document_id).await?;
        Ok(sections
            .iter()
            .find(|s| s.section_type == SectionType::Declarations)
            .and_then(|s| s.extracted_data.get("total_premium"))
            .and_then(Value::as_str)
            .map(str::to_owned))
    }
}
