//! In-memory backend on `parking_lot` maps.

use std::collections::BTreeMap;

use bindery_core::{
    BinderyError, CanonicalEntity, CanonicalEntityId, Document, DocumentId, EntityType,
    HybridChunk, LossRunClaim, Page, PageManifest, ProcessingStatus, Relationship, Result,
    SectionExtraction, SectionSuperChunk, SovItem, Stage, StageRun, StageStatus,
    TableClassification, TableJson, VectorEmbeddingRow, WorkflowId,
};
use parking_lot::RwLock;
use serde_json::Value;

use crate::rows::{StepEntityOutput, StepSectionOutput};
use crate::{apply_stage_transition, Store};

#[derive(Default)]
struct Inner {
    documents: BTreeMap<DocumentId, Document>,
    pages: BTreeMap<DocumentId, Vec<Page>>,
    manifests: BTreeMap<DocumentId, PageManifest>,
    tables: BTreeMap<DocumentId, Vec<TableJson>>,
    table_classifications: BTreeMap<DocumentId, Vec<TableClassification>>,
    sov_items: BTreeMap<DocumentId, Vec<SovItem>>,
    loss_run_claims: BTreeMap<DocumentId, Vec<LossRunClaim>>,
    chunks: BTreeMap<DocumentId, Vec<HybridChunk>>,
    super_chunks: BTreeMap<DocumentId, Vec<SectionSuperChunk>>,
    section_extractions: BTreeMap<DocumentId, Vec<SectionExtraction>>,
    step_section_outputs: Vec<StepSectionOutput>,
    step_entity_outputs: Vec<StepEntityOutput>,
    canonical_entities: BTreeMap<CanonicalEntityId, CanonicalEntity>,
    document_entity_links: BTreeMap<DocumentId, Vec<CanonicalEntityId>>,
    relationships: BTreeMap<DocumentId, Vec<Relationship>>,
    stage_runs: BTreeMap<(WorkflowId, DocumentId, Stage), StageRun>,
    embeddings: BTreeMap<DocumentId, Vec<VectorEmbeddingRow>>,
}

/// In-memory store, the reference backend for tests and workers.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("MemoryStore")
            .field("documents", &inner.documents.len())
            .field("canonical_entities", &inner.canonical_entities.len())
            .finish_non_exhaustive()
    }
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total canonical-entity count, for rollback assertions.
    #[must_use]
    pub fn canonical_entity_count(&self) -> usize {
        self.inner.read().canonical_entities.len()
    }
}

impl Store for MemoryStore {
    async fn upsert_document(&self, document: Document) -> Result<()> {
        self.inner.write().documents.insert(document.id, document);
        Ok(())
    }

    async fn document(&self, id: DocumentId) -> Result<Document> {
        self.inner
            .read()
            .documents
            .get(&id)
            .cloned()
            .ok_or_else(|| BinderyError::NotFound(format!("document {id}")))
    }

    async fn set_document_status(&self, id: DocumentId, status: ProcessingStatus) -> Result<()> {
        let mut inner = self.inner.write();
        let document = inner
            .documents
            .get_mut(&id)
            .ok_or_else(|| BinderyError::NotFound(format!("document {id}")))?;
        document.status = status;
        Ok(())
    }

    async fn replace_pages(&self, document_id: DocumentId, mut pages: Vec<Page>) -> Result<()> {
        pages.sort_by_key(|p| p.page_number);
        self.inner.write().pages.insert(document_id, pages);
        Ok(())
    }

    async fn pages(&self, document_id: DocumentId) -> Result<Vec<Page>> {
        Ok(self.inner.read().pages.get(&document_id).cloned().unwrap_or_default())
    }

    async fn save_manifest(&self, manifest: PageManifest) -> Result<()> {
        self.inner.write().manifests.insert(manifest.document_id, manifest);
        Ok(())
    }

    async fn manifest(&self, document_id: DocumentId) -> Result<Option<PageManifest>> {
        Ok(self.inner.read().manifests.get(&document_id).cloned())
    }

    async fn replace_tables(&self, document_id: DocumentId, tables: Vec<TableJson>) -> Result<()> {
        self.inner.write().tables.insert(document_id, tables);
        Ok(())
    }

    async fn tables(&self, document_id: DocumentId) -> Result<Vec<TableJson>> {
        Ok(self.inner.read().tables.get(&document_id).cloned().unwrap_or_default())
    }

    async fn replace_table_classifications(
        &self,
        document_id: DocumentId,
        classifications: Vec<TableClassification>,
    ) -> Result<()> {
        self.inner
            .write()
            .table_classifications
            .insert(document_id, classifications);
        Ok(())
    }

    async fn table_classifications(
        &self,
        document_id: DocumentId,
    ) -> Result<Vec<TableClassification>> {
        Ok(self
            .inner
            .read()
            .table_classifications
            .get(&document_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn replace_sov_items(&self, document_id: DocumentId, items: Vec<SovItem>) -> Result<()> {
        self.inner.write().sov_items.insert(document_id, items);
        Ok(())
    }

    async fn sov_items(&self, document_id: DocumentId) -> Result<Vec<SovItem>> {
        Ok(self.inner.read().sov_items.get(&document_id).cloned().unwrap_or_default())
    }

    async fn replace_loss_run_claims(
        &self,
        document_id: DocumentId,
        claims: Vec<LossRunClaim>,
    ) -> Result<()> {
        self.inner.write().loss_run_claims.insert(document_id, claims);
        Ok(())
    }

    async fn loss_run_claims(&self, document_id: DocumentId) -> Result<Vec<LossRunClaim>> {
        Ok(self
            .inner
            .read()
            .loss_run_claims
            .get(&document_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn replace_chunks(
        &self,
        document_id: DocumentId,
        chunks: Vec<HybridChunk>,
    ) -> Result<()> {
        self.inner.write().chunks.insert(document_id, chunks);
        Ok(())
    }

    async fn chunks(&self, document_id: DocumentId) -> Result<Vec<HybridChunk>> {
        Ok(self.inner.read().chunks.get(&document_id).cloned().unwrap_or_default())
    }

    async fn replace_super_chunks(
        &self,
        document_id: DocumentId,
        super_chunks: Vec<SectionSuperChunk>,
    ) -> Result<()> {
        self.inner.write().super_chunks.insert(document_id, super_chunks);
        Ok(())
    }

    async fn super_chunks(&self, document_id: DocumentId) -> Result<Vec<SectionSuperChunk>> {
        Ok(self
            .inner
            .read()
            .super_chunks
            .get(&document_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn add_section_extraction(&self, row: SectionExtraction) -> Result<()> {
        self.inner
            .write()
            .section_extractions
            .entry(row.document_id)
            .or_default()
            .push(row);
        Ok(())
    }

    async fn section_extractions(&self, document_id: DocumentId) -> Result<Vec<SectionExtraction>> {
        Ok(self
            .inner
            .read()
            .section_extractions
            .get(&document_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn add_step_section_output(&self, row: StepSectionOutput) -> Result<()> {
        self.inner.write().step_section_outputs.push(row);
        Ok(())
    }

    async fn add_step_entity_output(&self, row: StepEntityOutput) -> Result<()> {
        self.inner.write().step_entity_outputs.push(row);
        Ok(())
    }

    async fn step_section_outputs(&self, workflow_id: WorkflowId) -> Result<Vec<StepSectionOutput>> {
        Ok(self
            .inner
            .read()
            .step_section_outputs
            .iter()
            .filter(|row| row.workflow_id == workflow_id)
            .cloned()
            .collect())
    }

    async fn upsert_canonical_entity(&self, entity: CanonicalEntity) -> Result<()> {
        self.inner.write().canonical_entities.insert(entity.id, entity);
        Ok(())
    }

    async fn canonical_entities_by_type(
        &self,
        types: &[EntityType],
    ) -> Result<Vec<CanonicalEntity>> {
        Ok(self
            .inner
            .read()
            .canonical_entities
            .values()
            .filter(|e| types.is_empty() || types.contains(&e.entity_type))
            .cloned()
            .collect())
    }

    async fn canonical_entities(&self, ids: &[CanonicalEntityId]) -> Result<Vec<CanonicalEntity>> {
        let inner = self.inner.read();
        Ok(ids
            .iter()
            .filter_map(|id| inner.canonical_entities.get(id).cloned())
            .collect())
    }

    async fn delete_canonical_entity(&self, id: CanonicalEntityId) -> Result<bool> {
        Ok(self.inner.write().canonical_entities.remove(&id).is_some())
    }

    async fn replace_document_entity_links(
        &self,
        document_id: DocumentId,
        ids: Vec<CanonicalEntityId>,
    ) -> Result<()> {
        self.inner.write().document_entity_links.insert(document_id, ids);
        Ok(())
    }

    async fn document_entity_ids(&self, document_id: DocumentId) -> Result<Vec<CanonicalEntityId>> {
        Ok(self
            .inner
            .read()
            .document_entity_links
            .get(&document_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn add_relationships(&self, relationships: Vec<Relationship>) -> Result<()> {
        let mut inner = self.inner.write();
        for relationship in &relationships {
            for endpoint in [relationship.source_id, relationship.target_id] {
                if !inner.canonical_entities.contains_key(&endpoint) {
                    return Err(BinderyError::InvariantViolation(format!(
                        "relationship {} references missing entity {endpoint}",
                        relationship.id
                    )));
                }
            }
        }
        for relationship in relationships {
            inner
                .relationships
                .entry(relationship.document_id)
                .or_default()
                .push(relationship);
        }
        Ok(())
    }

    async fn relationships(&self, document_id: DocumentId) -> Result<Vec<Relationship>> {
        Ok(self
            .inner
            .read()
            .relationships
            .get(&document_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn stage_run(
        &self,
        workflow_id: WorkflowId,
        document_id: DocumentId,
        stage: Stage,
    ) -> Result<Option<StageRun>> {
        Ok(self
            .inner
            .read()
            .stage_runs
            .get(&(workflow_id, document_id, stage))
            .cloned())
    }

    async fn transition_stage(
        &self,
        workflow_id: WorkflowId,
        document_id: DocumentId,
        stage: Stage,
        status: StageStatus,
        summary: Option<Value>,
    ) -> Result<StageRun> {
        let mut inner = self.inner.write();
        let key = (workflow_id, document_id, stage);
        let existing = inner.stage_runs.get(&key).cloned();
        let run = apply_stage_transition(existing, workflow_id, document_id, stage, status, summary)?;
        inner.stage_runs.insert(key, run.clone());
        Ok(run)
    }

    async fn add_embeddings(&self, rows: Vec<VectorEmbeddingRow>) -> Result<()> {
        let mut inner = self.inner.write();
        for row in rows {
            inner.embeddings.entry(row.document_id).or_default().push(row);
        }
        Ok(())
    }

    async fn embeddings(&self, document_id: DocumentId) -> Result<Vec<VectorEmbeddingRow>> {
        Ok(self
            .inner
            .read()
            .embeddings
            .get(&document_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn page_replacement_is_atomic() {
        let store = MemoryStore::new();
        let doc = DocumentId::generate();
        store
            .replace_pages(doc, vec![Page::new(doc, 2, "b", "b"), Page::new(doc, 1, "a", "a")])
            .await
            .unwrap();
        let pages = store.pages(doc).await.unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].page_number, 1);

        store
            .replace_pages(doc, vec![Page::new(doc, 5, "e", "e")])
            .await
            .unwrap();
        let pages = store.pages(doc).await.unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].page_number, 5);
    }

    #[tokio::test]
    async fn stage_transitions_are_monotone_with_retry_reset() {
        let store = MemoryStore::new();
        let (wf, doc) = (WorkflowId::generate(), DocumentId::generate());

        store
            .transition_stage(wf, doc, Stage::Processed, StageStatus::Running, None)
            .await
            .unwrap();
        let run = store
            .transition_stage(wf, doc, Stage::Processed, StageStatus::Failed, None)
            .await
            .unwrap();
        assert_eq!(run.attempt, 1);

        // Retry resets to running and bumps the attempt counter.
        let run = store
            .transition_stage(wf, doc, Stage::Processed, StageStatus::Running, None)
            .await
            .unwrap();
        assert_eq!(run.attempt, 2);

        let run = store
            .transition_stage(
                wf,
                doc,
                Stage::Processed,
                StageStatus::Completed,
                Some(serde_json::json!({"pages": 3})),
            )
            .await
            .unwrap();
        assert_eq!(run.status, StageStatus::Completed);

        // Completed is terminal.
        let err = store
            .transition_stage(wf, doc, Stage::Processed, StageStatus::Running, None)
            .await
            .unwrap_err();
        assert!(matches!(err, BinderyError::InvariantViolation(_)));
    }

    #[tokio::test]
    async fn relationship_endpoints_must_exist() {
        let store = MemoryStore::new();
        let relationship = Relationship {
            id: bindery_core::RelationshipId::generate(),
            workflow_id: WorkflowId::generate(),
            document_id: DocumentId::generate(),
            source_id: CanonicalEntityId::generate(),
            target_id: CanonicalEntityId::generate(),
            relationship_type: bindery_core::RelationshipType::HasCoverage,
            attributes: BTreeMap::new(),
            confidence: 0.8,
        };
        let err = store.add_relationships(vec![relationship]).await.unwrap_err();
        assert!(matches!(err, BinderyError::InvariantViolation(_)));
    }

    #[tokio::test]
    async fn canonical_delete_is_idempotent() {
        let store = MemoryStore::new();
        let id = CanonicalEntityId::generate();
        assert!(!store.delete_canonical_entity(id).await.unwrap());

        let entity = CanonicalEntity {
            id,
            entity_type: EntityType::Policy,
            name: "POL-1".to_owned(),
            fingerprint: "policy:pol 1:".to_owned(),
            attributes: BTreeMap::new(),
            confidence: 0.8,
            mention_count: 1,
        };
        store.upsert_canonical_entity(entity).await.unwrap();
        assert!(store.delete_canonical_entity(id).await.unwrap());
        assert!(!store.delete_canonical_entity(id).await.unwrap());
    }
}
