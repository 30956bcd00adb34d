//! redb-based embedded backend.

use std::fs;
use std::path::PathBuf;

use bindery_core::{
    BinderyError, CanonicalEntity, CanonicalEntityId, Document, DocumentId, EntityType,
    HybridChunk, LossRunClaim, Page, PageManifest, ProcessingStatus, Relationship, Result,
    SectionExtraction, SectionSuperChunk, SovItem, Stage, StageRun, StageStatus,
    TableClassification, TableJson, VectorEmbeddingRow, WorkflowId,
};
use redb::{Database, ReadableTable, TableDefinition};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::rows::{StepEntityOutput, StepSectionOutput};
use crate::{apply_stage_transition, Store};

type Table = TableDefinition<'static, &'static str, &'static [u8]>;

const DOCUMENTS: Table = TableDefinition::new("documents");
const PAGES: Table = TableDefinition::new("document_pages");
const MANIFESTS: Table = TableDefinition::new("page_manifest");
const TABLES: Table = TableDefinition::new("document_tables");
const TABLE_CLASSIFICATIONS: Table = TableDefinition::new("table_classifications");
const SOV_ITEMS: Table = TableDefinition::new("sov_items");
const LOSS_RUN_CLAIMS: Table = TableDefinition::new("loss_run_claims");
const SECTION_CHUNKS: Table = TableDefinition::new("section_chunks");
const SECTION_SUPER_CHUNKS: Table = TableDefinition::new("section_super_chunks");
const SECTION_EXTRACTIONS: Table = TableDefinition::new("section_extractions");
const STEP_SECTION_OUTPUTS: Table = TableDefinition::new("step_section_outputs");
const STEP_ENTITY_OUTPUTS: Table = TableDefinition::new("step_entity_outputs");
const CANONICAL_ENTITIES: Table = TableDefinition::new("canonical_entities");
const DOCUMENT_ENTITY_LINKS: Table = TableDefinition::new("document_entity_links");
const RELATIONSHIPS: Table = TableDefinition::new("entity_relationships");
const STAGE_RUNS: Table = TableDefinition::new("workflow_document_stage_runs");
const EMBEDDINGS: Table = TableDefinition::new("vector_embeddings");

fn db_err(err: impl std::fmt::Display) -> BinderyError {
    BinderyError::Storage(err.to_string())
}

/// Embedded store on redb, one table per repository, serde_json values.
pub struct RedbStore {
    path: PathBuf,
    db: Database,
}

impl std::fmt::Debug for RedbStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbStore").field("path", &self.path).finish_non_exhaustive()
    }
}

impl RedbStore {
    /// Creates or opens a store at `path`.
    ///
    /// # Errors
    ///
    /// Returns a storage error when the database cannot be opened.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(db_err)?;
        }
        let db = Database::create(&path).map_err(db_err)?;
        Ok(Self { path, db })
    }

    fn put<T: Serialize>(
        &self,
        table: Table,
        key: &str,
        value: &T,
    ) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        let txn = self.db.begin_write().map_err(db_err)?;
        {
            let mut handle = txn.open_table(table).map_err(db_err)?;
            handle.insert(key, bytes.as_slice()).map_err(db_err)?;
        }
        txn.commit().map_err(db_err)?;
        Ok(())
    }

    fn get<T: DeserializeOwned>(
        &self,
        table: Table,
        key: &str,
    ) -> Result<Option<T>> {
        let txn = self.db.begin_read().map_err(db_err)?;
        let handle = match txn.open_table(table) {
            Ok(handle) => handle,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(err) => return Err(db_err(err)),
        };
        let Some(guard) = handle.get(key).map_err(db_err)? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_slice(guard.value())?))
    }

    fn get_vec<T: DeserializeOwned>(
        &self,
        table: Table,
        key: &str,
    ) -> Result<Vec<T>> {
        Ok(self.get::<Vec<T>>(table, key)?.unwrap_or_default())
    }

    fn remove(&self, table: Table, key: &str) -> Result<bool> {
        let txn = self.db.begin_write().map_err(db_err)?;
        let removed;
        {
            let mut handle = txn.open_table(table).map_err(db_err)?;
            removed = handle.remove(key).map_err(db_err)?.is_some();
        }
        txn.commit().map_err(db_err)?;
        Ok(removed)
    }

    fn append<T: Serialize + DeserializeOwned>(
        &self,
        table: Table,
        key: &str,
        items: Vec<T>,
    ) -> Result<()> {
        let mut existing: Vec<T> = self.get_vec(table, key)?;
        existing.extend(items);
        self.put(table, key, &existing)
    }

    fn scan_prefix<T: DeserializeOwned>(
        &self,
        table: Table,
        prefix: &str,
    ) -> Result<Vec<T>> {
        let txn = self.db.begin_read().map_err(db_err)?;
        let handle = match txn.open_table(table) {
            Ok(handle) => handle,
            Err(redb::TableError::TableDoesNotExist(_)) => return Ok(Vec::new()),
            Err(err) => return Err(db_err(err)),
        };
        let mut out = Vec::new();
        for row in handle.iter().map_err(db_err)? {
            let (key, value) = row.map_err(db_err)?;
            if key.value().starts_with(prefix) {
                out.push(serde_json::from_slice(value.value())?);
            }
        }
        Ok(out)
    }

    fn scan_all<T: DeserializeOwned>(
        &self,
        table: Table,
    ) -> Result<Vec<T>> {
        self.scan_prefix(table, "")
    }
}

fn doc_key(id: DocumentId) -> String {
    id.to_string()
}

fn stage_key(workflow_id: WorkflowId, document_id: DocumentId, stage: Stage) -> String {
    format!("{workflow_id}/{document_id}/{}", stage.as_str())
}

impl Store for RedbStore {
    async fn upsert_document(&self, document: Document) -> Result<()> {
        self.put(DOCUMENTS, &doc_key(document.id), &document)
    }

    async fn document(&self, id: DocumentId) -> Result<Document> {
        self.get(DOCUMENTS, &doc_key(id))?
            .ok_or_else(|| BinderyError::NotFound(format!("document {id}")))
    }

    async fn set_document_status(&self, id: DocumentId, status: ProcessingStatus) -> Result<()> {
        let mut document: Document = self
            .get(DOCUMENTS, &doc_key(id))?
            .ok_or_else(|| BinderyError::NotFound(format!("document {id}")))?;
        document.status = status;
        self.put(DOCUMENTS, &doc_key(id), &document)
    }

    async fn replace_pages(&self, document_id: DocumentId, mut pages: Vec<Page>) -> Result<()> {
        pages.sort_by_key(|p| p.page_number);
        self.put(PAGES, &doc_key(document_id), &pages)
    }

    async fn pages(&self, document_id: DocumentId) -> Result<Vec<Page>> {
        self.get_vec(PAGES, &doc_key(document_id))
    }

    async fn save_manifest(&self, manifest: PageManifest) -> Result<()> {
        self.put(MANIFESTS, &doc_key(manifest.document_id), &manifest)
    }

    async fn manifest(&self, document_id: DocumentId) -> Result<Option<PageManifest>> {
        self.get(MANIFESTS, &doc_key(document_id))
    }

    async fn replace_tables(&self, document_id: DocumentId, tables: Vec<TableJson>) -> Result<()> {
        self.put(TABLES, &doc_key(document_id), &tables)
    }

    async fn tables(&self, document_id: DocumentId) -> Result<Vec<TableJson>> {
        self.get_vec(TABLES, &doc_key(document_id))
    }

    async fn replace_table_classifications(
        &self,
        document_id: DocumentId,
        classifications: Vec<TableClassification>,
    ) -> Result<()> {
        self.put(TABLE_CLASSIFICATIONS, &doc_key(document_id), &classifications)
    }

    async fn table_classifications(
        &self,
        document_id: DocumentId,
    ) -> Result<Vec<TableClassification>> {
        self.get_vec(TABLE_CLASSIFICATIONS, &doc_key(document_id))
    }

    async fn replace_sov_items(&self, document_id: DocumentId, items: Vec<SovItem>) -> Result<()> {
        self.put(SOV_ITEMS, &doc_key(document_id), &items)
    }

    async fn sov_items(&self, document_id: DocumentId) -> Result<Vec<SovItem>> {
        self.get_vec(SOV_ITEMS, &doc_key(document_id))
    }

    async fn replace_loss_run_claims(
        &self,
        document_id: DocumentId,
        claims: Vec<LossRunClaim>,
    ) -> Result<()> {
        self.put(LOSS_RUN_CLAIMS, &doc_key(document_id), &claims)
    }

    async fn loss_run_claims(&self, document_id: DocumentId) -> Result<Vec<LossRunClaim>> {
        self.get_vec(LOSS_RUN_CLAIMS, &doc_key(document_id))
    }

    async fn replace_chunks(
        &self,
        document_id: DocumentId,
        chunks: Vec<HybridChunk>,
    ) -> Result<()> {
        self.put(SECTION_CHUNKS, &doc_key(document_id), &chunks)
    }

    async fn chunks(&self, document_id: DocumentId) -> Result<Vec<HybridChunk>> {
        self.get_vec(SECTION_CHUNKS, &doc_key(document_id))
    }

    async fn replace_super_chunks(
        &self,
        document_id: DocumentId,
        super_chunks: Vec<SectionSuperChunk>,
    ) -> Result<()> {
        self.put(SECTION_SUPER_CHUNKS, &doc_key(document_id), &super_chunks)
    }

    async fn super_chunks(&self, document_id: DocumentId) -> Result<Vec<SectionSuperChunk>> {
        self.get_vec(SECTION_SUPER_CHUNKS, &doc_key(document_id))
    }

    async fn add_section_extraction(&self, row: SectionExtraction) -> Result<()> {
        self.append(SECTION_EXTRACTIONS, &doc_key(row.document_id), vec![row])
    }

    async fn section_extractions(&self, document_id: DocumentId) -> Result<Vec<SectionExtraction>> {
        self.get_vec(SECTION_EXTRACTIONS, &doc_key(document_id))
    }

    async fn add_step_section_output(&self, row: StepSectionOutput) -> Result<()> {
        self.put(
            STEP_SECTION_OUTPUTS,
            &format!("{}/{}", row.workflow_id, row.id),
            &row,
        )
    }

    async fn add_step_entity_output(&self, row: StepEntityOutput) -> Result<()> {
        self.put(
            STEP_ENTITY_OUTPUTS,
            &format!("{}/{}", row.workflow_id, row.id),
            &row,
        )
    }

    async fn step_section_outputs(&self, workflow_id: WorkflowId) -> Result<Vec<StepSectionOutput>> {
        self.scan_prefix(STEP_SECTION_OUTPUTS, &format!("{workflow_id}/"))
    }

    async fn upsert_canonical_entity(&self, entity: CanonicalEntity) -> Result<()> {
        self.put(CANONICAL_ENTITIES, &entity.id.to_string(), &entity)
    }

    async fn canonical_entities_by_type(
        &self,
        types: &[EntityType],
    ) -> Result<Vec<CanonicalEntity>> {
        let all: Vec<CanonicalEntity> = self.scan_all(CANONICAL_ENTITIES)?;
        Ok(all
            .into_iter()
            .filter(|e| types.is_empty() || types.contains(&e.entity_type))
            .collect())
    }

    async fn canonical_entities(&self, ids: &[CanonicalEntityId]) -> Result<Vec<CanonicalEntity>> {
        let mut out = Vec::new();
        for id in ids {
            if let Some(entity) = self.get(CANONICAL_ENTITIES, &id.to_string())? {
                out.push(entity);
            }
        }
        Ok(out)
    }

    async fn delete_canonical_entity(&self, id: CanonicalEntityId) -> Result<bool> {
        self.remove(CANONICAL_ENTITIES, &id.to_string())
    }

    async fn replace_document_entity_links(
        &self,
        document_id: DocumentId,
        ids: Vec<CanonicalEntityId>,
    ) -> Result<()> {
        self.put(DOCUMENT_ENTITY_LINKS, &doc_key(document_id), &ids)
    }

    async fn document_entity_ids(&self, document_id: DocumentId) -> Result<Vec<CanonicalEntityId>> {
        self.get_vec(DOCUMENT_ENTITY_LINKS, &doc_key(document_id))
    }

    async fn add_relationships(&self, relationships: Vec<Relationship>) -> Result<()> {
        for relationship in &relationships {
            for endpoint in [relationship.source_id, relationship.target_id] {
                if self
                    .get::<CanonicalEntity>(CANONICAL_ENTITIES, &endpoint.to_string())?
                    .is_none()
                {
                    return Err(BinderyError::InvariantViolation(format!(
                        "relationship {} references missing entity {endpoint}",
                        relationship.id
                    )));
                }
            }
        }
        for relationship in relationships {
            self.append(
                RELATIONSHIPS,
                &doc_key(relationship.document_id),
                vec![relationship],
            )?;
        }
        Ok(())
    }

    async fn relationships(&self, document_id: DocumentId) -> Result<Vec<Relationship>> {
        self.get_vec(RELATIONSHIPS, &doc_key(document_id))
    }

    async fn stage_run(
        &self,
        workflow_id: WorkflowId,
        document_id: DocumentId,
        stage: Stage,
    ) -> Result<Option<StageRun>> {
        self.get(STAGE_RUNS, &stage_key(workflow_id, document_id, stage))
    }

    async fn transition_stage(
        &self,
        workflow_id: WorkflowId,
        document_id: DocumentId,
        stage: Stage,
        status: StageStatus,
        summary: Option<Value>,
    ) -> Result<StageRun> {
        let key = stage_key(workflow_id, document_id, stage);
        let existing = self.get(STAGE_RUNS, &key)?;
        let run = apply_stage_transition(existing, workflow_id, document_id, stage, status, summary)?;
        self.put(STAGE_RUNS, &key, &run)?;
        Ok(run)
    }

    async fn add_embeddings(&self, rows: Vec<VectorEmbeddingRow>) -> Result<()> {
        let mut by_document: std::collections::BTreeMap<DocumentId, Vec<VectorEmbeddingRow>> =
            std::collections::BTreeMap::new();
        for row in rows {
            by_document.entry(row.document_id).or_default().push(row);
        }
        for (document_id, rows) in by_document {
            self.append(EMBEDDINGS, &doc_key(document_id), rows)?;
        }
        Ok(())
    }

    async fn embeddings(&self, document_id: DocumentId) -> Result<Vec<VectorEmbeddingRow>> {
        self.get_vec(EMBEDDINGS, &doc_key(document_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn documents_round_trip() {
        let dir = tempdir().unwrap();
        let store = RedbStore::new(dir.path().join("test.redb")).unwrap();
        let doc = Document::new(DocumentId::generate(), "policy.pdf", 12);
        store.upsert_document(doc.clone()).await.unwrap();

        let loaded = store.document(doc.id).await.unwrap();
        assert_eq!(loaded.file_name, "policy.pdf");
        assert_eq!(loaded.page_count, 12);

        store
            .set_document_status(doc.id, ProcessingStatus::Completed)
            .await
            .unwrap();
        assert_eq!(
            store.document(doc.id).await.unwrap().status,
            ProcessingStatus::Completed
        );
    }

    #[tokio::test]
    async fn missing_document_is_not_found() {
        let dir = tempdir().unwrap();
        let store = RedbStore::new(dir.path().join("test.redb")).unwrap();
        let err = store.document(DocumentId::generate()).await.unwrap_err();
        assert!(matches!(err, BinderyError::NotFound(_)));
    }

    #[tokio::test]
    async fn page_replacement_supersedes_previous_rows() {
        let dir = tempdir().unwrap();
        let store = RedbStore::new(dir.path().join("test.redb")).unwrap();
        let doc = DocumentId::generate();

        store
            .replace_pages(doc, vec![Page::new(doc, 1, "a", "a"), Page::new(doc, 2, "b", "b")])
            .await
            .unwrap();
        store
            .replace_pages(doc, vec![Page::new(doc, 3, "c", "c")])
            .await
            .unwrap();

        let pages = store.pages(doc).await.unwrap();
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].page_number, 3);
    }

    #[tokio::test]
    async fn stage_runs_persist_across_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.redb");
        let (wf, doc) = (WorkflowId::generate(), DocumentId::generate());

        {
            let store = RedbStore::new(&path).unwrap();
            store
                .transition_stage(wf, doc, Stage::Processed, StageStatus::Running, None)
                .await
                .unwrap();
            store
                .transition_stage(
                    wf,
                    doc,
                    Stage::Processed,
                    StageStatus::Completed,
                    Some(serde_json::json!({"pages": 2})),
                )
                .await
                .unwrap();
        }

        // A new process sees the completed marker and its summary.
        let store = RedbStore::new(&path).unwrap();
        let run = store
            .stage_run(wf, doc, Stage::Processed)
            .await
            .unwrap()
            .expect("marker persisted");
        assert_eq!(run.status, StageStatus::Completed);
        assert_eq!(run.summary, Some(serde_json::json!({"pages": 2})));
    }

    #[tokio::test]
    async fn step_outputs_scan_by_workflow() {
        let dir = tempdir().unwrap();
        let store = RedbStore::new(dir.path().join("test.redb")).unwrap();
        let wf_a = WorkflowId::generate();
        let wf_b = WorkflowId::generate();
        let doc = DocumentId::generate();

        for wf in [wf_a, wf_b] {
            store
                .add_step_section_output(StepSectionOutput {
                    id: uuid::Uuid::new_v4(),
                    document_id: doc,
                    workflow_id: wf,
                    section_type: bindery_core::SectionType::Declarations,
                    display_payload: serde_json::json!({}),
                    confidence: 0.8,
                    page_range: None,
                    source_extraction_id: None,
                })
                .await
                .unwrap();
        }

        let outputs = store.step_section_outputs(wf_a).await.unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].workflow_id, wf_a);
    }
}
