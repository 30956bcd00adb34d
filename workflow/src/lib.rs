//! # Bindery Workflow
//!
//! Durable orchestration of the four-stage document pipeline:
//! processed → extracted → enriched → summarized.
//!
//! The shape follows a durable-workflow engine discipline even though the
//! executor here is in-process: workflow code only sequences activities
//! and persists markers; every side effect lives in an activity that is
//! retried with bounded exponential backoff and owns its own store
//! session. Completed stages are skipped by marker, so a re-run after a
//! crash resumes where the previous run stopped. The ENRICHED stage
//! threads an explicit saga log through its activities and compensates —
//! shielded from cancellation — when a later step fails.
//!
//! Product workflows (single document, policy comparison, quote
//! comparison, proposal generation) share the processing core and add
//! product-specific post-processing.

pub mod engine;
pub mod events;
pub mod payload;
pub mod pipeline;
pub mod process_document;
pub mod product;
pub mod stages;

pub use engine::{ActivityOptions, Heartbeat, RetryPolicy};
pub use events::{EventSink, StatusHandle, WorkflowEvent, WorkflowStatus};
pub use payload::{DocumentRef, WorkflowPayload};
pub use pipeline::Pipeline;
pub use process_document::{ProcessDocumentWorkflow, StageResults};
pub use product::{
    PolicyComparisonWorkflow, ProposalGenerationWorkflow, QuoteComparisonWorkflow,
    SingleDocumentWorkflow,
};
