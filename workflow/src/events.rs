//! Status queries and the workflow event stream.

use std::sync::Arc;

use async_channel::{Receiver, Sender};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Snapshot answered by the synchronous `get_status()` query.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct WorkflowStatus {
    /// Lifecycle status: `initialized`, `processing`, `completed`, `failed`.
    pub status: String,
    /// Current phase (stage name), when processing.
    pub current_phase: Option<String>,
    /// Progress in `[0, 1]`.
    pub progress: f32,
    /// Document type, once the profile is known.
    pub document_type: Option<String>,
    /// Error message after a failure.
    pub error: Option<String>,
}

/// Shared, queryable workflow status.
#[derive(Clone, Debug, Default)]
pub struct StatusHandle {
    inner: Arc<RwLock<WorkflowStatus>>,
}

impl StatusHandle {
    /// Creates a handle in the `initialized` state.
    #[must_use]
    pub fn new() -> Self {
        let handle = Self::default();
        handle.inner.write().status = "initialized".to_owned();
        handle
    }

    /// The current snapshot.
    #[must_use]
    pub fn get_status(&self) -> WorkflowStatus {
        self.inner.read().clone()
    }

    /// Moves to `processing` with the given phase and progress.
    pub fn set_phase(&self, phase: &str, progress: f32) {
        let mut inner = self.inner.write();
        inner.status = "processing".to_owned();
        inner.current_phase = Some(phase.to_owned());
        inner.progress = progress.clamp(0.0, 1.0);
    }

    /// Records the document type once known.
    pub fn set_document_type(&self, document_type: &str) {
        self.inner.write().document_type = Some(document_type.to_owned());
    }

    /// Marks completion.
    pub fn set_completed(&self) {
        let mut inner = self.inner.write();
        inner.status = "completed".to_owned();
        inner.progress = 1.0;
    }

    /// Marks failure with a message. Previously completed stage markers
    /// remain valid; a retry will skip them.
    pub fn set_failed(&self, error: &str) {
        let mut inner = self.inner.write();
        inner.status = "failed".to_owned();
        inner.error = Some(error.to_owned());
    }
}

/// Events emitted for downstream UIs.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WorkflowEvent {
    /// `workflow:progress`.
    Progress {
        /// Current phase.
        phase: String,
        /// Progress in `[0, 1]`.
        progress: f32,
        /// Human-readable detail.
        message: String,
    },
    /// `workflow:warning`.
    Warning {
        /// What went sideways (non-fatally).
        message: String,
    },
}

/// Event emitter. Sending never blocks and never fails the workflow: a
/// full or closed channel drops the event.
#[derive(Clone, Debug)]
pub struct EventSink {
    sender: Option<Sender<WorkflowEvent>>,
}

impl EventSink {
    /// A sink wired to a channel.
    #[must_use]
    pub fn channel() -> (Self, Receiver<WorkflowEvent>) {
        let (sender, receiver) = async_channel::unbounded();
        (Self { sender: Some(sender) }, receiver)
    }

    /// A sink that discards events.
    #[must_use]
    pub const fn disabled() -> Self {
        Self { sender: None }
    }

    /// Emits a progress event.
    pub fn progress(&self, phase: &str, progress: f32, message: impl Into<String>) {
        self.emit(WorkflowEvent::Progress {
            phase: phase.to_owned(),
            progress,
            message: message.into(),
        });
    }

    /// Emits a warning event.
    pub fn warning(&self, message: impl Into<String>) {
        self.emit(WorkflowEvent::Warning { message: message.into() });
    }

    fn emit(&self, event: WorkflowEvent) {
        if let Some(sender) = &self.sender {
            if sender.try_send(event).is_err() {
                debug!("event channel closed, dropping event");
            }
        }
    }
}
