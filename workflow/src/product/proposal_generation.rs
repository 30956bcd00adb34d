//! Proposal generation: process, then draft a broker-facing narrative.

use bindery_core::{
    BinderyError, EmbeddingClient, GenerationRequest, GraphStore, LlmClient, OcrService, Result,
    StorageService,
};
use bindery_store::Store;
use bindery_synthesis::SynthesisOutcome;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::events::EventSink;
use crate::payload::WorkflowPayload;
use crate::pipeline::Pipeline;
use crate::process_document::ProcessDocumentWorkflow;
use crate::product::synthesis_for;

const NARRATIVE_INSTRUCTION: &str = "You are drafting an insurance proposal summary for a \
broker. Given the effective coverages and exclusions of a processed policy, write a concise \
narrative (3-6 paragraphs) covering: what is covered, notable expansions from endorsements, \
material exclusions and their carve-backs, and open items worth flagging. Plain prose, no \
markdown.";

/// Generates a proposal narrative from a processed document's effective
/// provisions. The narrative degrades to a deterministic rendering when
/// the model is unavailable; proposal generation never fails on that.
#[derive(Debug)]
pub struct ProposalGenerationWorkflow<'a, S, O, L, E, G, B> {
    pipeline: &'a Pipeline<S, O, L, E, G, B>,
    events: EventSink,
}

impl<'a, S, O, L, E, G, B> ProposalGenerationWorkflow<'a, S, O, L, E, G, B>
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

    /// Processes the document and drafts the narrative.
    pub async fn run(&self, payload: &WorkflowPayload) -> Result<Value> {
        if payload.documents.len() != 1 {
            return Err(BinderyError::InvariantViolation(format!(
                "proposal generation requires exactly one document, got {}",
                payload.documents.len()
            )));
        }
        let document_id = payload.documents[0].document_id;

        ProcessDocumentWorkflow::new(self.pipeline)
            .with_events(self.events.clone())
            .run(payload)
            .await?;

        let outcome = synthesis_for(&self.pipeline.store, payload.workflow_id, document_id)
            .await?
            .unwrap_or_default();

        let narrative = match self.draft_narrative(&outcome).await {
            Ok(narrative) => narrative,
            Err(err) => {
                warn!(%err, "narrative model call failed, using deterministic rendering");
                self.events
                    .warning("proposal narrative degraded to deterministic rendering");
                deterministic_narrative(&outcome)
            }
        };

        info!(document_id = %document_id, "proposal generated");
        Ok(json!({
            "status": "completed",
            "workflow_id": payload.workflow_id.to_string(),
            "document_id": document_id.to_string(),
            "narrative": narrative,
            "effective_coverages": outcome.effective_coverages.len(),
            "effective_exclusions": outcome.effective_exclusions.len(),
            "synthesis_confidence": outcome.overall_confidence,
        }))
    }

    async fn draft_narrative(&self, outcome: &SynthesisOutcome) -> Result<String> {
        let request = GenerationRequest::new(serde_json::to_string_pretty(outcome)?)
            .with_system_instruction(NARRATIVE_INSTRUCTION);
        self.pipeline.llm.generate_content(request).await
    }
}

/// Fallback narrative assembled without a model.
fn deterministic_narrative(outcome: &SynthesisOutcome) -> String {
    let mut narrative = String::new();
    if outcome.effective_coverages.is_empty() && outcome.effective_exclusions.is_empty() {
        return "No effective provisions were synthesised for this document.".to_owned();
    }

    narrative.push_str("Coverages in effect:\n");
    for coverage in &outcome.effective_coverages {
        narrative.push_str(&format!(
            "- {} ({}; sources: {})\n",
            coverage.name,
            coverage.effective_state.as_str(),
            coverage.sources.join(", ")
        ));
    }
    narrative.push_str("\nExclusions:\n");
    for exclusion in &outcome.effective_exclusions {
        narrative.push_str(&format!(
            "- {} ({})\n",
            exclusion.name,
            exclusion.effective_state.as_str()
        ));
        for carve_back in &exclusion.carve_backs {
            narrative.push_str(&format!("  carve-back: {carve_back}\n"));
        }
    }
    narrative
}
