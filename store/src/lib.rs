//! # Bindery Store
//!
//! Repositories for every table the pipeline persists, behind the
//! [`Store`] trait so backends are swappable: [`MemoryStore`] for tests
//! and workers that keep state externally, [`RedbStore`] for embedded
//! durability.
//!
//! Write conventions the pipeline relies on:
//!
//! - Document-scoped collections (pages, tables, chunks) are replaced
//!   atomically (delete-then-insert), so retried activities are safe.
//! - Stage-run transitions are monotone (`not_started → running →
//!   completed | failed`), except that a retry resets `failed` back to
//!   `running`. A completed stage never moves.
//! - Canonical-entity deletion is idempotent: deleting an absent id
//!   reports `false` instead of failing, which the saga rollback needs.

pub mod memory;
pub mod redb_backend;
pub mod rows;

use bindery_core::{
    CanonicalEntity, CanonicalEntityId, Document, DocumentId, EntityType, HybridChunk,
    LossRunClaim, Page, PageManifest, ProcessingStatus, Relationship, Result, SectionExtraction,
    SectionSuperChunk, SovItem, Stage, StageRun, StageStatus, TableClassification, TableJson,
    VectorEmbeddingRow, WorkflowId,
};
use core::future::Future;
use serde_json::Value;

pub use memory::MemoryStore;
pub use redb_backend::RedbStore;
pub use rows::{StepEntityOutput, StepSectionOutput};

/// The relational store: single source of truth for the pipeline.
///
/// Every activity opens its own logical session (a method call here),
/// commits at the end, and is safely retryable.
pub trait Store: Send + Sync {
    /// Inserts or replaces a document row.
    fn upsert_document(&self, document: Document) -> impl Future<Output = Result<()>> + Send;

    /// Fetches a document; `NotFound` when absent.
    fn document(&self, id: DocumentId) -> impl Future<Output = Result<Document>> + Send;

    /// Updates a document's processing status.
    fn set_document_status(
        &self,
        id: DocumentId,
        status: ProcessingStatus,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Atomically replaces all pages of a document.
    fn replace_pages(
        &self,
        document_id: DocumentId,
        pages: Vec<Page>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// All pages of a document, in page order.
    fn pages(&self, document_id: DocumentId) -> impl Future<Output = Result<Vec<Page>>> + Send;

    /// Saves (or supersedes) the page manifest.
    fn save_manifest(&self, manifest: PageManifest) -> impl Future<Output = Result<()>> + Send;

    /// The current manifest, when one exists.
    fn manifest(
        &self,
        document_id: DocumentId,
    ) -> impl Future<Output = Result<Option<PageManifest>>> + Send;

    /// Atomically replaces the captured tables of a document.
    fn replace_tables(
        &self,
        document_id: DocumentId,
        tables: Vec<TableJson>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// All captured tables of a document.
    fn tables(
        &self,
        document_id: DocumentId,
    ) -> impl Future<Output = Result<Vec<TableJson>>> + Send;

    /// Replaces table classifications for a document.
    fn replace_table_classifications(
        &self,
        document_id: DocumentId,
        classifications: Vec<TableClassification>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Table classifications for a document.
    fn table_classifications(
        &self,
        document_id: DocumentId,
    ) -> impl Future<Output = Result<Vec<TableClassification>>> + Send;

    /// Replaces normalised SOV items.
    fn replace_sov_items(
        &self,
        document_id: DocumentId,
        items: Vec<SovItem>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// SOV items of a document.
    fn sov_items(
        &self,
        document_id: DocumentId,
    ) -> impl Future<Output = Result<Vec<SovItem>>> + Send;

    /// Replaces normalised loss-run claims.
    fn replace_loss_run_claims(
        &self,
        document_id: DocumentId,
        claims: Vec<LossRunClaim>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Loss-run claims of a document.
    fn loss_run_claims(
        &self,
        document_id: DocumentId,
    ) -> impl Future<Output = Result<Vec<LossRunClaim>>> + Send;

    /// Replaces chunks of a document.
    fn replace_chunks(
        &self,
        document_id: DocumentId,
        chunks: Vec<HybridChunk>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Chunks of a document, in document order.
    fn chunks(
        &self,
        document_id: DocumentId,
    ) -> impl Future<Output = Result<Vec<HybridChunk>>> + Send;

    /// Replaces super-chunks of a document.
    fn replace_super_chunks(
        &self,
        document_id: DocumentId,
        super_chunks: Vec<SectionSuperChunk>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Super-chunks of a document.
    fn super_chunks(
        &self,
        document_id: DocumentId,
    ) -> impl Future<Output = Result<Vec<SectionSuperChunk>>> + Send;

    /// Appends a section extraction row.
    fn add_section_extraction(
        &self,
        row: SectionExtraction,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Section extractions of a document.
    fn section_extractions(
        &self,
        document_id: DocumentId,
    ) -> impl Future<Output = Result<Vec<SectionExtraction>>> + Send;

    /// Appends a step section output.
    fn add_step_section_output(
        &self,
        row: StepSectionOutput,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Appends a step entity output.
    fn add_step_entity_output(
        &self,
        row: StepEntityOutput,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Step section outputs for a workflow run.
    fn step_section_outputs(
        &self,
        workflow_id: WorkflowId,
    ) -> impl Future<Output = Result<Vec<StepSectionOutput>>> + Send;

    /// Inserts or replaces a canonical entity.
    fn upsert_canonical_entity(
        &self,
        entity: CanonicalEntity,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Canonical entities of the given types (all when `types` is empty).
    fn canonical_entities_by_type(
        &self,
        types: &[EntityType],
    ) -> impl Future<Output = Result<Vec<CanonicalEntity>>> + Send;

    /// Canonical entities by id; missing ids are skipped.
    fn canonical_entities(
        &self,
        ids: &[CanonicalEntityId],
    ) -> impl Future<Output = Result<Vec<CanonicalEntity>>> + Send;

    /// Deletes a canonical entity. Idempotent: `false` when absent.
    fn delete_canonical_entity(
        &self,
        id: CanonicalEntityId,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Replaces the document → canonical-entity links.
    fn replace_document_entity_links(
        &self,
        document_id: DocumentId,
        ids: Vec<CanonicalEntityId>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Canonical-entity ids linked to a document.
    fn document_entity_ids(
        &self,
        document_id: DocumentId,
    ) -> impl Future<Output = Result<Vec<CanonicalEntityId>>> + Send;

    /// Appends relationships. Fails when an endpoint does not exist.
    fn add_relationships(
        &self,
        relationships: Vec<Relationship>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Relationships of a document.
    fn relationships(
        &self,
        document_id: DocumentId,
    ) -> impl Future<Output = Result<Vec<Relationship>>> + Send;

    /// The stage-run marker for `(workflow, document, stage)`.
    fn stage_run(
        &self,
        workflow_id: WorkflowId,
        document_id: DocumentId,
        stage: Stage,
    ) -> impl Future<Output = Result<Option<StageRun>>> + Send;

    /// Transitions a stage marker, enforcing monotonicity. Same-status
    /// transitions are no-ops; `failed → running` increments the attempt
    /// counter; anything else invalid is an invariant violation.
    fn transition_stage(
        &self,
        workflow_id: WorkflowId,
        document_id: DocumentId,
        stage: Stage,
        status: StageStatus,
        summary: Option<Value>,
    ) -> impl Future<Output = Result<StageRun>> + Send;

    /// Appends embedding rows.
    fn add_embeddings(
        &self,
        rows: Vec<VectorEmbeddingRow>,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Embedding rows of a document.
    fn embeddings(
        &self,
        document_id: DocumentId,
    ) -> impl Future<Output = Result<Vec<VectorEmbeddingRow>>> + Send;
}

/// Applies the stage transition rules to an optional existing run.
/// Shared by both backends so their semantics cannot drift.
pub(crate) fn apply_stage_transition(
    existing: Option<StageRun>,
    workflow_id: WorkflowId,
    document_id: DocumentId,
    stage: Stage,
    status: StageStatus,
    summary: Option<Value>,
) -> Result<StageRun> {
    let mut run =
        existing.unwrap_or_else(|| StageRun::new(workflow_id, document_id, stage));

    if run.status == status {
        if let Some(summary) = summary {
            run.summary = Some(summary);
        }
        return Ok(run);
    }

    if !run.status.can_transition_to(status) {
        return Err(bindery_core::BinderyError::InvariantViolation(format!(
            "stage {} cannot move {} -> {}",
            stage.as_str(),
            run.status.as_str(),
            status.as_str()
        )));
    }

    if run.status == StageStatus::Failed && status == StageStatus::Running {
        run.attempt += 1;
    } else if run.status == StageStatus::NotStarted && status == StageStatus::Running {
        run.attempt += 1;
    }
    run.status = status;
    if let Some(summary) = summary {
        run.summary = Some(summary);
    }
    Ok(run)
}
