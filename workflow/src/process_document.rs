//! The parent workflow: four stages in order, idempotent by marker.

use std::collections::BTreeMap;

use bindery_core::{
    BinderyError, DocumentId, EmbeddingClient, GraphStore, LlmClient, OcrService,
    ProcessingStatus, Result, Stage, StageStatus, StorageService, WorkflowId,
};
use bindery_store::Store;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::engine::{run_activity, ActivityOptions};
use crate::events::EventSink;
use crate::payload::WorkflowPayload;
use crate::pipeline::Pipeline;
use crate::stages;
use crate::StatusHandle;

/// Map stage → summary returned by a completed run.
pub type StageResults = BTreeMap<Stage, Value>;

/// Orchestrates the four pipeline stages for one document.
///
/// Stage execution is idempotent by marker: a stage whose completion
/// marker exists returns its persisted summary without re-running, so a
/// restarted workflow resumes after the last committed stage.
#[derive(Debug)]
pub struct ProcessDocumentWorkflow<'a, S, O, L, E, G, B> {
    pipeline: &'a Pipeline<S, O, L, E, G, B>,
    status: StatusHandle,
    events: EventSink,
    cancel: CancellationToken,
}

impl<'a, S, O, L, E, G, B> ProcessDocumentWorkflow<'a, S, O, L, E, G, B>
where
    S: Store,
    O: OcrService,
    L: LlmClient,
    E: EmbeddingClient,
    G: GraphStore,
    B: StorageService,
{
    /// Creates a workflow over the given service bundle.
    #[must_use]
    pub fn new(pipeline: &'a Pipeline<S, O, L, E, G, B>) -> Self {
        Self {
            pipeline,
            status: StatusHandle::new(),
            events: EventSink::disabled(),
            cancel: CancellationToken::new(),
        }
    }

    /// Wires an event sink.
    #[must_use]
    pub fn with_events(mut self, events: EventSink) -> Self {
        self.events = events;
        self
    }

    /// Wires an external cancellation token.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The status handle backing `get_status()` queries.
    #[must_use]
    pub fn status_handle(&self) -> StatusHandle {
        self.status.clone()
    }

    /// Whether a stage's completion marker exists.
    pub async fn is_complete(
        &self,
        workflow_id: WorkflowId,
        document_id: DocumentId,
        stage: Stage,
    ) -> Result<bool> {
        Ok(self
            .pipeline
            .store
            .stage_run(workflow_id, document_id, stage)
            .await?
            .is_some_and(|run| run.status == StageStatus::Completed))
    }

    /// Runs the pipeline for the payload's single document.
    ///
    /// # Errors
    ///
    /// Fails when the payload does not reference exactly one document,
    /// or when a stage fails terminally. Completed stage markers remain
    /// valid either way.
    pub async fn run(&self, payload: &WorkflowPayload) -> Result<StageResults> {
        if payload.documents.len() != 1 {
            return Err(BinderyError::InvariantViolation(format!(
                "process-document workflow requires exactly one document, got {}",
                payload.documents.len()
            )));
        }
        let workflow_id = payload.workflow_id;
        let document_id = payload.documents[0].document_id;

        self.status.set_phase("processed", 0.0);
        let _ = self
            .pipeline
            .store
            .set_document_status(document_id, ProcessingStatus::Processing)
            .await;

        let mut results = StageResults::new();
        let progress_points = [
            (Stage::Processed, 0.0f32),
            (Stage::Extracted, 0.4),
            (Stage::Enriched, 0.6),
            (Stage::Summarized, 0.8),
        ];

        for (stage, progress) in progress_points {
            self.status.set_phase(stage.as_str(), progress);
            let summary = match self.run_stage(workflow_id, document_id, stage).await {
                Ok(summary) => summary,
                Err(err) => {
                    self.status.set_failed(&err.to_string());
                    let _ = self
                        .pipeline
                        .store
                        .set_document_status(document_id, ProcessingStatus::Failed)
                        .await;
                    return Err(err);
                }
            };

            if stage == Stage::Processed {
                if let Some(document_type) =
                    summary.get("document_type").and_then(Value::as_str)
                {
                    self.status.set_document_type(document_type);
                }
            }
            self.events
                .progress(stage.as_str(), progress + 0.2, "stage completed");
            results.insert(stage, summary);
        }

        self.status.set_completed();
        let _ = self
            .pipeline
            .store
            .set_document_status(document_id, ProcessingStatus::Completed)
            .await;
        info!(workflow_id = %workflow_id, document_id = %document_id, "pipeline completed");
        Ok(results)
    }

    /// Runs one stage, consulting its marker first.
    async fn run_stage(
        &self,
        workflow_id: WorkflowId,
        document_id: DocumentId,
        stage: Stage,
    ) -> Result<Value> {
        let store = &self.pipeline.store;

        // Idempotent skip: the persisted summary answers re-runs.
        if let Some(run) = store.stage_run(workflow_id, document_id, stage).await? {
            if run.status == StageStatus::Completed {
                info!(stage = stage.as_str(), "stage already completed, skipping");
                return Ok(run.summary.unwrap_or(Value::Null));
            }
        }

        // Declared dependency must be completed before this stage runs.
        if let Some(dependency) = stage.dependency() {
            if !self.is_complete(workflow_id, document_id, dependency).await? {
                return Err(BinderyError::InvariantViolation(format!(
                    "stage {} requires completed {}",
                    stage.as_str(),
                    dependency.as_str()
                )));
            }
        }

        run_activity("update_stage_status", ActivityOptions::status_update(), &self.cancel, || {
            store.transition_stage(workflow_id, document_id, stage, StageStatus::Running, None)
        })
        .await?;

        let outcome = match stage {
            Stage::Processed => {
                stages::processed::run(self.pipeline, document_id, &self.cancel, &self.events)
                    .await
            }
            Stage::Extracted => {
                stages::extracted::run(
                    self.pipeline,
                    workflow_id,
                    document_id,
                    &self.cancel,
                    &self.events,
                )
                .await
            }
            Stage::Enriched => {
                stages::enriched::run(
                    self.pipeline,
                    workflow_id,
                    document_id,
                    &self.cancel,
                    &self.events,
                )
                .await
            }
            Stage::Summarized => {
                stages::summarized::run(
                    self.pipeline,
                    workflow_id,
                    document_id,
                    &self.cancel,
                    &self.events,
                )
                .await
            }
        };

        match outcome {
            Ok(summary) => {
                run_activity(
                    "update_stage_status",
                    ActivityOptions::status_update(),
                    &self.cancel,
                    || {
                        store.transition_stage(
                            workflow_id,
                            document_id,
                            stage,
                            StageStatus::Completed,
                            Some(summary.clone()),
                        )
                    },
                )
                .await?;
                Ok(summary)
            }
            Err(err) => {
                warn!(stage = stage.as_str(), %err, "stage failed");
                // Best effort: record the failure even under cancellation.
                let _ = store
                    .transition_stage(workflow_id, document_id, stage, StageStatus::Failed, None)
                    .await;
                Err(err)
            }
        }
    }
}
