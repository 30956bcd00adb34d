//! Policy comparison: process each policy, then align effective
//! provisions across documents by canonical id.

use std::collections::BTreeMap;

use bindery_core::{
    BinderyError, EmbeddingClient, GraphStore, LlmClient, OcrService, Result, StorageService,
};
use bindery_store::Store;
use bindery_synthesis::SynthesisOutcome;
use serde_json::{json, Value};
use tracing::info;

use crate::events::EventSink;
use crate::payload::WorkflowPayload;
use crate::pipeline::Pipeline;
use crate::process_document::ProcessDocumentWorkflow;
use crate::product::synthesis_for;

/// One aligned provision across the compared documents.
#[derive(Debug)]
struct AlignedProvision {
    name: String,
    kind: &'static str,
    states: BTreeMap<String, String>,
}

/// Compares two or more policies on their effective provisions.
#[derive(Debug)]
pub struct PolicyComparisonWorkflow<'a, S, O, L, E, G, B> {
    pipeline: &'a Pipeline<S, O, L, E, G, B>,
    events: EventSink,
}

impl<'a, S, O, L, E, G, B> PolicyComparisonWorkflow<'a, S, O, L, E, G, B>
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

    /// Processes every document through the shared core, then builds the
    /// comparison matrix. Documents are processed independently; no
    /// cross-document ordering is guaranteed.
    pub async fn run(&self, payload: &WorkflowPayload) -> Result<Value> {
        if payload.documents.len() < 2 {
            return Err(BinderyError::InvariantViolation(format!(
                "policy comparison requires at least two documents, got {}",
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

        let mut outcomes: BTreeMap<String, SynthesisOutcome> = BTreeMap::new();
        for document in &payload.documents {
            if let Some(outcome) = synthesis_for(
                &self.pipeline.store,
                payload.workflow_id,
                document.document_id,
            )
            .await?
            {
                outcomes.insert(document.document_id.to_string(), outcome);
            }
        }

        let provisions = align_provisions(&outcomes);
        let differing = provisions
            .iter()
            .filter(|p| {
                let mut states: Vec<&String> = p.states.values().collect();
                states.sort();
                states.dedup();
                states.len() > 1 || p.states.len() < outcomes.len()
            })
            .count();

        info!(
            documents = payload.documents.len(),
            provisions = provisions.len(),
            differing,
            "policy comparison complete"
        );

        Ok(json!({
            "status": "completed",
            "workflow_id": payload.workflow_id.to_string(),
            "documents": payload.documents.iter().map(|d| d.document_id.to_string()).collect::<Vec<_>>(),
            "provisions": provisions
                .iter()
                .map(|p| {
                    json!({
                        "name": p.name,
                        "kind": p.kind,
                        "states": p.states,
                    })
                })
                .collect::<Vec<_>>(),
            "provision_count": provisions.len(),
            "differing_count": differing,
        }))
    }
}

/// Aligns provisions by canonical id; the taxonomy makes ids stable across
/// documents, so the same coverage lines up even under different spellings.
fn align_provisions(outcomes: &BTreeMap<String, SynthesisOutcome>) -> Vec<AlignedProvision> {
    let mut aligned: BTreeMap<String, AlignedProvision> = BTreeMap::new();

    for (document, outcome) in outcomes {
        for coverage in &outcome.effective_coverages {
            aligned
                .entry(coverage.canonical_id.clone())
                .or_insert_with(|| AlignedProvision {
                    name: coverage.name.clone(),
                    kind: "coverage",
                    states: BTreeMap::new(),
                })
                .states
                .insert(document.clone(), coverage.effective_state.as_str().to_owned());
        }
        for exclusion in &outcome.effective_exclusions {
            aligned
                .entry(exclusion.canonical_id.clone())
                .or_insert_with(|| AlignedProvision {
                    name: exclusion.name.clone(),
                    kind: "exclusion",
                    states: BTreeMap::new(),
                })
                .states
                .insert(document.clone(), exclusion.effective_state.as_str().to_owned());
        }
    }

    aligned.into_values().collect()
}
