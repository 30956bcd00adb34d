//! Step-output rows surfaced to product UIs.

use bindery_core::{DocumentId, ExtractionId, SectionType, WorkflowId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// One section's display payload for a workflow step.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StepSectionOutput {
    /// Row identifier.
    pub id: Uuid,
    /// Owning document.
    pub document_id: DocumentId,
    /// Producing workflow run.
    pub workflow_id: WorkflowId,
    /// Section the payload describes.
    pub section_type: SectionType,
    /// Display payload (the section's extracted data).
    pub display_payload: Value,
    /// Overall confidence.
    pub confidence: f32,
    /// Inclusive page range, when known.
    pub page_range: Option<(u32, u32)>,
    /// Source section extraction.
    pub source_extraction_id: Option<ExtractionId>,
}

/// One entity's display payload for a workflow step.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StepEntityOutput {
    /// Row identifier.
    pub id: Uuid,
    /// Owning document.
    pub document_id: DocumentId,
    /// Producing workflow run.
    pub workflow_id: WorkflowId,
    /// Entity type tag.
    pub entity_type: String,
    /// Display label.
    pub entity_label: String,
    /// Display payload.
    pub display_payload: Value,
    /// Confidence.
    pub confidence: f32,
    /// Source section extraction.
    pub source_extraction_id: Option<ExtractionId>,
}
