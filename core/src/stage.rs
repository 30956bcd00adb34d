//! Pipeline stages and the stage-run marker rows.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id::{DocumentId, WorkflowId};

/// The four pipeline stages, in dependency order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// OCR, page analysis, tables, chunking.
    Processed,
    /// Section extraction and entity synthesis.
    Extracted,
    /// Canonical resolution, relationships, synthesis.
    Enriched,
    /// Vector and graph indexing.
    Summarized,
}

impl Stage {
    /// Stable string form used as the marker-row key.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::Extracted => "extracted",
            Self::Enriched => "enriched",
            Self::Summarized => "summarized",
        }
    }

    /// The stage that must complete before this one starts.
    #[must_use]
    pub const fn dependency(self) -> Option<Self> {
        match self {
            Self::Processed => None,
            Self::Extracted => Some(Self::Processed),
            Self::Enriched => Some(Self::Extracted),
            Self::Summarized => Some(Self::Enriched),
        }
    }

    /// All stages, in execution order.
    #[must_use]
    pub const fn all() -> [Self; 4] {
        [Self::Processed, Self::Extracted, Self::Enriched, Self::Summarized]
    }
}

/// Status of one `(workflow, document, stage)` run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// No attempt recorded.
    #[default]
    NotStarted,
    /// Currently executing.
    Running,
    /// Completed; the summary is authoritative and the stage is skipped on
    /// re-runs.
    Completed,
    /// Last attempt failed.
    Failed,
}

impl StageStatus {
    /// Stable string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether a transition to `next` is allowed. Transitions are monotone
    /// (`not_started → running → completed|failed`) except that a retry may
    /// reset `failed` back to `running`. A completed stage never moves.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match (self, next) {
            (Self::NotStarted, Self::Running)
            | (Self::Running, Self::Completed | Self::Failed)
            | (Self::Failed, Self::Running) => true,
            _ => false,
        }
    }
}

/// Marker row: the source of truth for stage skipping. At most one row per
/// `(workflow, document, stage)`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StageRun {
    /// Owning workflow run.
    pub workflow_id: WorkflowId,
    /// Owning document.
    pub document_id: DocumentId,
    /// Stage this row tracks.
    pub stage: Stage,
    /// Current status.
    pub status: StageStatus,
    /// Stage summary persisted on completion; returned verbatim on skip.
    pub summary: Option<Value>,
    /// Attempt counter, incremented by retry resets.
    pub attempt: u32,
}

impl StageRun {
    /// Creates a fresh not-started marker.
    #[must_use]
    pub const fn new(workflow_id: WorkflowId, document_id: DocumentId, stage: Stage) -> Self {
        Self {
            workflow_id,
            document_id,
            stage,
            status: StageStatus::NotStarted,
            summary: None,
            attempt: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_dependencies_are_linear() {
        assert_eq!(Stage::Processed.dependency(), None);
        assert_eq!(Stage::Extracted.dependency(), Some(Stage::Processed));
        assert_eq!(Stage::Summarized.dependency(), Some(Stage::Enriched));
    }

    #[test]
    fn completed_is_terminal() {
        assert!(!StageStatus::Completed.can_transition_to(StageStatus::Running));
        assert!(!StageStatus::Completed.can_transition_to(StageStatus::Failed));
    }

    #[test]
    fn retry_resets_failed_to_running() {
        assert!(StageStatus::Failed.can_transition_to(StageStatus::Running));
        assert!(!StageStatus::Failed.can_transition_to(StageStatus::Completed));
    }
}
