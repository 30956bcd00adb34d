//! Single-document processing product.

use bindery_core::{
    EmbeddingClient, GraphStore, LlmClient, OcrService, Result, StorageService,
};
use bindery_store::Store;
use serde_json::{json, Value};

use crate::events::EventSink;
use crate::payload::WorkflowPayload;
use crate::pipeline::Pipeline;
use crate::process_document::ProcessDocumentWorkflow;
use crate::StatusHandle;

/// Processes exactly one document through the shared core; the thinnest
/// product, with no post-processing.
#[derive(Debug)]
pub struct SingleDocumentWorkflow<'a, S, O, L, E, G, B> {
    inner: ProcessDocumentWorkflow<'a, S, O, L, E, G, B>,
}

impl<'a, S, O, L, E, G, B> SingleDocumentWorkflow<'a, S, O, L, E, G, B>
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
            inner: ProcessDocumentWorkflow::new(pipeline),
        }
    }

    /// Wires an event sink.
    #[must_use]
    pub fn with_events(mut self, events: EventSink) -> Self {
        self.inner = self.inner.with_events(events);
        self
    }

    /// The status handle backing `get_status()` queries.
    #[must_use]
    pub fn status_handle(&self) -> StatusHandle {
        self.inner.status_handle()
    }

    /// Runs the pipeline and returns the per-stage summaries.
    pub async fn run(&self, payload: &WorkflowPayload) -> Result<Value> {
        let results = self.inner.run(payload).await?;
        let stages: serde_json::Map<String, Value> = results
            .into_iter()
            .map(|(stage, summary)| (stage.as_str().to_owned(), summary))
            .collect();
        Ok(json!({
            "status": "completed",
            "workflow_id": payload.workflow_id.to_string(),
            "document_id": payload.documents[0].document_id.to_string(),
            "stages": stages,
        }))
    }
}
