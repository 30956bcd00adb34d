//! Product workflows sharing the processing core.

pub mod policy_comparison;
pub mod proposal_generation;
pub mod quote_comparison;
pub mod single_document;

pub use policy_comparison::PolicyComparisonWorkflow;
pub use proposal_generation::ProposalGenerationWorkflow;
pub use quote_comparison::QuoteComparisonWorkflow;
pub use single_document::SingleDocumentWorkflow;

use bindery_core::{DocumentId, Result, Stage, WorkflowId};
use bindery_store::Store;
use bindery_synthesis::SynthesisOutcome;

/// Reads the synthesis outcome persisted on a document's enriched marker.
pub(crate) async fn synthesis_for<S: Store>(
    store: &S,
    workflow_id: WorkflowId,
    document_id: DocumentId,
) -> Result<Option<SynthesisOutcome>> {
    let Some(run) = store.stage_run(workflow_id, document_id, Stage::Enriched).await? else {
        return Ok(None);
    };
    Ok(run
        .summary
        .as_ref()
        .and_then(|s| s.get("synthesis"))
        .and_then(|s| serde_json::from_value(s.clone()).ok()))
}
