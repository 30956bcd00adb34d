//! Test doubles for the workflow integration tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use bindery_core::{
    BinderyError, CanonicalEntity, CanonicalEntityId, Document, DocumentId, EntityType,
    GenerationRequest, HybridChunk, LlmClient, LossRunClaim, OcrService, Page, PageManifest,
    ProcessingStatus, Relationship, Result, SectionExtraction, SectionSuperChunk, SovItem, Stage,
    StageRun, StageStatus, StorageService, TableClassification, TableJson, VectorEmbeddingRow,
    WorkflowId,
};
use bindery_core::EmbeddingClient;
use bindery_store::{MemoryStore, StepEntityOutput, StepSectionOutput, Store};
use serde_json::Value;
use url::Url;

/// OCR fake serving canned pages, filtering on `pages_to_process` the way
/// the real service does (parse once, filter after).
pub struct FakeOcr {
    pages_by_doc: HashMap<DocumentId, Vec<Page>>,
    pub calls: AtomicUsize,
}

impl FakeOcr {
    pub fn new(pages_by_doc: HashMap<DocumentId, Vec<Page>>) -> Self {
        Self {
            pages_by_doc,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl OcrService for FakeOcr {
    async fn extract_pages(
        &self,
        _url: &Url,
        document_id: DocumentId,
        pages_to_process: Option<&[u32]>,
    ) -> Result<Vec<Page>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let all = self.pages_by_doc.get(&document_id).cloned().unwrap_or_default();
        Ok(match pages_to_process {
            Some(selected) => all
                .into_iter()
                .filter(|p| selected.contains(&p.page_number))
                .collect(),
            None => all,
        })
    }
}

/// Storage fake issuing a constant URL.
pub struct FakeStorage;

impl StorageService for FakeStorage {
    async fn create_download_url(&self, bucket: &str, path: &str, _ttl: Duration) -> Result<Url> {
        Url::parse(&format!("https://storage.test/{bucket}/{path}"))
            .map_err(|e| BinderyError::Storage(e.to_string()))
    }
}

/// Recorded-response LLM fake keyed on prompt markers.
pub struct FakeLlm {
    responses: Vec<(&'static str, String)>,
}

impl FakeLlm {
    pub fn new(entries: &[(&'static str, &str)]) -> Self {
        Self {
            responses: entries
                .iter()
                .map(|(marker, response)| (*marker, (*response).to_owned()))
                .collect(),
        }
    }

    /// A fake that answers every extraction with an empty object and every
    /// relationship pass with an empty array.
    pub fn empty() -> Self {
        Self::new(&[("ENTITIES:", "[]")])
    }
}

impl LlmClient for FakeLlm {
    fn model(&self) -> &str {
        "fake-recorder"
    }

    async fn generate_content(&self, request: GenerationRequest) -> Result<String> {
        for (marker, response) in &self.responses {
            if request.contents.contains(marker) {
                return Ok(response.clone());
            }
        }
        Ok("{}".to_owned())
    }
}

/// Deterministic embedding fake.
pub struct HashEmbedder;

impl EmbeddingClient for HashEmbedder {
    fn dim(&self) -> usize {
        8
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![0.0f32; 8];
                for (i, b) in t.bytes().enumerate() {
                    v[i % 8] += f32::from(b) / 255.0;
                }
                v
            })
            .collect())
    }
}

/// Store wrapper injecting failures into specific repositories.
pub struct FailingStore {
    pub inner: MemoryStore,
    pub fail_add_relationships: AtomicBool,
    pub fail_add_section_extraction: AtomicBool,
}

impl FailingStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_add_relationships: AtomicBool::new(false),
            fail_add_section_extraction: AtomicBool::new(false),
        }
    }
}

impl Store for FailingStore {
    async fn upsert_document(&self, document: Document) -> Result<()> {
        self.inner.upsert_document(document).await
    }
    async fn document(&self, id: DocumentId) -> Result<Document> {
        self.inner.document(id).await
    }
    async fn set_document_status(&self, id: DocumentId, status: ProcessingStatus) -> Result<()> {
        self.inner.set_document_status(id, status).await
    }
    async fn replace_pages(&self, document_id: DocumentId, pages: Vec<Page>) -> Result<()> {
        self.inner.replace_pages(document_id, pages).await
    }
    async fn pages(&self, document_id: DocumentId) -> Result<Vec<Page>> {
        self.inner.pages(document_id).await
    }
    async fn save_manifest(&self, manifest: PageManifest) -> Result<()> {
        self.inner.save_manifest(manifest).await
    }
    async fn manifest(&self, document_id: DocumentId) -> Result<Option<PageManifest>> {
        self.inner.manifest(document_id).await
    }
    async fn replace_tables(&self, document_id: DocumentId, tables: Vec<TableJson>) -> Result<()> {
        self.inner.replace_tables(document_id, tables).await
    }
    async fn tables(&self, document_id: DocumentId) -> Result<Vec<TableJson>> {
        self.inner.tables(document_id).await
    }
    async fn replace_table_classifications(
        &self,
        document_id: DocumentId,
        classifications: Vec<TableClassification>,
    ) -> Result<()> {
        self.inner
            .replace_table_classifications(document_id, classifications)
            .await
    }
    async fn table_classifications(
        &self,
        document_id: DocumentId,
    ) -> Result<Vec<TableClassification>> {
        self.inner.table_classifications(document_id).await
    }
    async fn replace_sov_items(&self, document_id: DocumentId, items: Vec<SovItem>) -> Result<()> {
        self.inner.replace_sov_items(document_id, items).await
    }
    async fn sov_items(&self, document_id: DocumentId) -> Result<Vec<SovItem>> {
        self.inner.sov_items(document_id).await
    }
    async fn replace_loss_run_claims(
        &self,
        document_id: DocumentId,
        claims: Vec<LossRunClaim>,
    ) -> Result<()> {
        self.inner.replace_loss_run_claims(document_id, claims).await
    }
    async fn loss_run_claims(&self, document_id: DocumentId) -> Result<Vec<LossRunClaim>> {
        self.inner.loss_run_claims(document_id).await
    }
    async fn replace_chunks(
        &self,
        document_id: DocumentId,
        chunks: Vec<HybridChunk>,
    ) -> Result<()> {
        self.inner.replace_chunks(document_id, chunks).await
    }
    async fn chunks(&self, document_id: DocumentId) -> Result<Vec<HybridChunk>> {
        self.inner.chunks(document_id).await
    }
    async fn replace_super_chunks(
        &self,
        document_id: DocumentId,
        super_chunks: Vec<SectionSuperChunk>,
    ) -> Result<()> {
        self.inner.replace_super_chunks(document_id, super_chunks).await
    }
    async fn super_chunks(&self, document_id: DocumentId) -> Result<Vec<SectionSuperChunk>> {
        self.inner.super_chunks(document_id).await
    }
    async fn add_section_extraction(&self, row: SectionExtraction) -> Result<()> {
        if self.fail_add_section_extraction.load(Ordering::SeqCst) {
            return Err(BinderyError::Storage("injected extraction failure".into()));
        }
        self.inner.add_section_extraction(row).await
    }
    async fn section_extractions(&self, document_id: DocumentId) -> Result<Vec<SectionExtraction>> {
        self.inner.section_extractions(document_id).await
    }
    async fn add_step_section_output(&self, row: StepSectionOutput) -> Result<()> {
        self.inner.add_step_section_output(row).await
    }
    async fn add_step_entity_output(&self, row: StepEntityOutput) -> Result<()> {
        self.inner.add_step_entity_output(row).await
    }
    async fn step_section_outputs(&self, workflow_id: WorkflowId) -> Result<Vec<StepSectionOutput>> {
        self.inner.step_section_outputs(workflow_id).await
    }
    async fn upsert_canonical_entity(&self, entity: CanonicalEntity) -> Result<()> {
        self.inner.upsert_canonical_entity(entity).await
    }
    async fn canonical_entities_by_type(
        &self,
        types: &[EntityType],
    ) -> Result<Vec<CanonicalEntity>> {
        self.inner.canonical_entities_by_type(types).await
    }
    async fn canonical_entities(&self, ids: &[CanonicalEntityId]) -> Result<Vec<CanonicalEntity>> {
        self.inner.canonical_entities(ids).await
    }
    async fn delete_canonical_entity(&self, id: CanonicalEntityId) -> Result<bool> {
        self.inner.delete_canonical_entity(id).await
    }
    async fn replace_document_entity_links(
        &self,
        document_id: DocumentId,
        ids: Vec<CanonicalEntityId>,
    ) -> Result<()> {
        self.inner.replace_document_entity_links(document_id, ids).await
    }
    async fn document_entity_ids(&self, document_id: DocumentId) -> Result<Vec<CanonicalEntityId>> {
        self.inner.document_entity_ids(document_id).await
    }
    async fn add_relationships(&self, relationships: Vec<Relationship>) -> Result<()> {
        if self.fail_add_relationships.load(Ordering::SeqCst) {
            return Err(BinderyError::Storage("injected relationship failure".into()));
        }
        self.inner.add_relationships(relationships).await
    }
    async fn relationships(&self, document_id: DocumentId) -> Result<Vec<Relationship>> {
        self.inner.relationships(document_id).await
    }
    async fn stage_run(
        &self,
        workflow_id: WorkflowId,
        document_id: DocumentId,
        stage: Stage,
    ) -> Result<Option<StageRun>> {
        self.inner.stage_run(workflow_id, document_id, stage).await
    }
    async fn transition_stage(
        &self,
        workflow_id: WorkflowId,
        document_id: DocumentId,
        stage: Stage,
        status: StageStatus,
        summary: Option<Value>,
    ) -> Result<StageRun> {
        self.inner
            .transition_stage(workflow_id, document_id, stage, status, summary)
            .await
    }
    async fn add_embeddings(&self, rows: Vec<VectorEmbeddingRow>) -> Result<()> {
        self.inner.add_embeddings(rows).await
    }
    async fn embeddings(&self, document_id: DocumentId) -> Result<Vec<VectorEmbeddingRow>> {
        self.inner.embeddings(document_id).await
    }
}
