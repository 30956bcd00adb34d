//! Workflow entrypoint payloads.

use bindery_core::{DocumentId, WorkflowId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One document referenced by a workflow run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DocumentRef {
    /// Document identifier.
    pub document_id: DocumentId,
    /// Display name, when the caller has one.
    pub document_name: Option<String>,
}

impl DocumentRef {
    /// Creates a reference without a display name.
    #[must_use]
    pub const fn new(document_id: DocumentId) -> Self {
        Self {
            document_id,
            document_name: None,
        }
    }
}

/// Payload accepted by every workflow entrypoint.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WorkflowPayload {
    /// Workflow run identifier.
    pub workflow_id: WorkflowId,
    /// Workflow definition identifier.
    pub workflow_definition_id: Option<String>,
    /// Human-readable workflow name.
    pub workflow_name: Option<String>,
    /// Documents to process.
    pub documents: Vec<DocumentRef>,
    /// Caller metadata, passed through untouched.
    pub metadata: Option<Value>,
}

impl WorkflowPayload {
    /// Creates a payload for the given documents.
    #[must_use]
    pub fn new(workflow_id: WorkflowId, documents: Vec<DocumentRef>) -> Self {
        Self {
            workflow_id,
            workflow_definition_id: None,
            workflow_name: None,
            documents,
            metadata: None,
        }
    }

    /// Creates a single-document payload.
    #[must_use]
    pub fn single(workflow_id: WorkflowId, document_id: DocumentId) -> Self {
        Self::new(workflow_id, vec![DocumentRef::new(document_id)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_round_trips_through_serde() {
        let payload = WorkflowPayload::single(WorkflowId::generate(), DocumentId::generate());
        let json = serde_json::to_string(&payload).unwrap();
        let back: WorkflowPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back.documents.len(), 1);
        assert_eq!(back.workflow_id, payload.workflow_id);
    }
}
