//! End-to-end pipeline scenarios over the in-memory backends.

mod support;

use std::collections::HashMap;
use std::sync::atomic::Ordering;

use bindery_core::{
    CanonicalEntity, CanonicalEntityId, Document, DocumentId, EffectiveState, EntityType, Page,
    PipelineConfig, Stage, StageStatus, WorkflowId,
};
use bindery_index::MemoryGraphStore;
use bindery_store::{MemoryStore, Store};
use bindery_workflow::{Pipeline, ProcessDocumentWorkflow, WorkflowPayload};
use support::{FailingStore, FakeLlm, FakeOcr, FakeStorage, HashEmbedder};

const DECLARATIONS_TEXT: &str = "COMMON POLICY DECLARATIONS\n\
Policy No: POL-123\nNamed Insured: Acme LLC\nEffective: 2024-01-01\n\
Total premium and coverage details are shown on the following pages.";

const DECLARATIONS_RESPONSE: &str = r#"{"policy_number": "POL-123", "named_insured": "Acme LLC",
  "effective_date": "2024-01-01", "confidence": 0.9}"#;

fn page(doc: DocumentId, number: u32, text: &str) -> Page {
    Page::new(doc, number, text, text)
}

fn pipeline_for(
    store: MemoryStore,
    pages: HashMap<DocumentId, Vec<Page>>,
    llm: FakeLlm,
) -> Pipeline<MemoryStore, FakeOcr, FakeLlm, HashEmbedder, MemoryGraphStore, FakeStorage> {
    Pipeline::new(
        store,
        FakeOcr::new(pages),
        llm,
        HashEmbedder,
        MemoryGraphStore::new(),
        FakeStorage,
        PipelineConfig::default(),
    )
}

async fn seed_document(store: &MemoryStore, doc: DocumentId, page_count: u32) {
    store
        .upsert_document(Document::new(doc, "policy.pdf", page_count).with_file_path("tenant/policy.pdf"))
        .await
        .unwrap();
}

#[tokio::test]
async fn single_page_declarations_produces_canonical_policy_and_insured() {
    let doc = DocumentId::generate();
    let store = MemoryStore::new();
    seed_document(&store, doc, 1).await;

    let llm = FakeLlm::new(&[
        ("declarations-page fields", DECLARATIONS_RESPONSE),
        ("ENTITIES:", "[]"),
    ]);
    let pages = HashMap::from([(doc, vec![page(doc, 1, DECLARATIONS_TEXT)])]);
    let pipeline = pipeline_for(store, pages, llm);

    let workflow = ProcessDocumentWorkflow::new(&pipeline);
    let payload = WorkflowPayload::single(WorkflowId::generate(), doc);
    let results = workflow.run(&payload).await.unwrap();

    assert_eq!(results.len(), 4);
    assert_eq!(
        results[&Stage::Processed]["document_type"].as_str(),
        Some("policy")
    );

    let entity_ids = pipeline.store.document_entity_ids(doc).await.unwrap();
    let entities = pipeline.store.canonical_entities(&entity_ids).await.unwrap();

    let policy = entities
        .iter()
        .find(|e| e.entity_type == EntityType::Policy)
        .expect("canonical policy");
    assert_eq!(
        policy.attributes.get("policy_number").and_then(|v| v.as_str()),
        Some("POL-123")
    );
    assert_eq!(
        policy.attributes.get("effective_date").and_then(|v| v.as_str()),
        Some("2024-01-01")
    );

    let insured = entities
        .iter()
        .find(|e| e.entity_type == EntityType::Organization)
        .expect("canonical insured");
    assert_eq!(insured.name, "Acme LLC");
    assert_eq!(
        insured.attributes.get("role").and_then(|v| v.as_str()),
        Some("insured")
    );

    // Structural fallback produced the HAS_INSURED edge.
    let relationships = pipeline.store.relationships(doc).await.unwrap();
    assert!(!relationships.is_empty());

    // SUMMARIZED wrote scoped graph nodes and embeddings.
    assert!(!pipeline.graph.nodes_for_workflow(payload.workflow_id).is_empty());
    assert!(!pipeline.store.embeddings(doc).await.unwrap().is_empty());

    let status = workflow.status_handle().get_status();
    assert_eq!(status.status, "completed");
    assert!((status.progress - 1.0).abs() < f32::EPSILON);
}

#[tokio::test]
async fn selective_ocr_persists_only_manifest_pages() {
    let doc = DocumentId::generate();
    let store = MemoryStore::new();
    seed_document(&store, doc, 50).await;

    // Pages 1, 3, 5 carry distinct real content; the other 47 are blank
    // boilerplate the manifest skips.
    let mut all_pages = Vec::new();
    for number in 1..=50u32 {
        let text = match number {
            1 => DECLARATIONS_TEXT.to_owned(),
            3 => "EXCLUSIONS\nThis insurance does not apply to expected or intended injury \
                  from the standpoint of the insured party."
                .to_owned(),
            5 => "CONDITIONS\nDuties in the event of accident, claim, suit or loss, and \
                  cancellation terms for this policy."
                .to_owned(),
            _ => String::new(),
        };
        all_pages.push(page(doc, number, &text));
    }

    let pipeline = pipeline_for(store, HashMap::from([(doc, all_pages)]), FakeLlm::empty());
    let workflow = ProcessDocumentWorkflow::new(&pipeline);
    workflow
        .run(&WorkflowPayload::single(WorkflowId::generate(), doc))
        .await
        .unwrap();

    let persisted = pipeline.store.pages(doc).await.unwrap();
    let numbers: Vec<u32> = persisted.iter().map(|p| p.page_number).collect();
    assert_eq!(numbers, vec![1, 3, 5]);

    // Chunks reference only the persisted pages.
    let chunks = pipeline.store.chunks(doc).await.unwrap();
    assert!(!chunks.is_empty());
    for chunk in &chunks {
        for page_number in &chunk.pages {
            assert!(numbers.contains(page_number));
        }
    }

    let manifest = pipeline.store.manifest(doc).await.unwrap().unwrap();
    assert_eq!(manifest.pages_to_process, vec![1, 3, 5]);
    for skipped in &manifest.pages_skipped {
        assert!(!manifest.pages_to_process.contains(skipped));
    }
}

#[tokio::test]
async fn empty_document_completes_with_zero_counts() {
    let doc = DocumentId::generate();
    let store = MemoryStore::new();
    seed_document(&store, doc, 0).await;

    let pipeline = pipeline_for(store, HashMap::from([(doc, Vec::new())]), FakeLlm::empty());
    let workflow = ProcessDocumentWorkflow::new(&pipeline);
    let results = workflow
        .run(&WorkflowPayload::single(WorkflowId::generate(), doc))
        .await
        .unwrap();

    assert_eq!(results[&Stage::Processed]["pages_processed"], 0);
    assert_eq!(results[&Stage::Processed]["chunks_created"], 0);
    assert_eq!(results[&Stage::Extracted]["sections_extracted"], 0);
    assert_eq!(results[&Stage::Enriched]["entities_resolved"], 0);
    assert_eq!(results[&Stage::Summarized]["embeddings_written"], 0);
}

#[tokio::test]
async fn boilerplate_only_document_skips_everything() {
    let doc = DocumentId::generate();
    let store = MemoryStore::new();
    seed_document(&store, doc, 3).await;

    let pages = vec![page(doc, 1, ""), page(doc, 2, "  "), page(doc, 3, "")];
    let pipeline = pipeline_for(store, HashMap::from([(doc, pages)]), FakeLlm::empty());
    let workflow = ProcessDocumentWorkflow::new(&pipeline);
    let results = workflow
        .run(&WorkflowPayload::single(WorkflowId::generate(), doc))
        .await
        .unwrap();

    let manifest = pipeline.store.manifest(doc).await.unwrap().unwrap();
    assert!(manifest.pages_to_process.is_empty());
    assert!(pipeline.store.pages(doc).await.unwrap().is_empty());
    assert!(pipeline.store.chunks(doc).await.unwrap().is_empty());
    assert_eq!(results[&Stage::Extracted]["sections_extracted"], 0);
    assert_eq!(results[&Stage::Enriched]["effective_coverages"], 0);
}

#[tokio::test]
async fn endorsement_projections_flow_into_the_enriched_summary() {
    let doc = DocumentId::generate();
    let store = MemoryStore::new();
    seed_document(&store, doc, 2).await;

    let endorsement_text = "THIS ENDORSEMENT CHANGES THE POLICY. PLEASE READ IT CAREFULLY.\n\
        COMMERCIAL AUTOMOBILE BROAD FORM ENDORSEMENT CA T3 53\n\
        A. Blanket Additional Insured. B. Blanket Waiver of Subrogation.";
    let projection_response = r#"{"endorsements": [{
        "endorsement_name": "COMMERCIAL AUTOMOBILE BROAD FORM ENDORSEMENT",
        "endorsement_number": "CA T3 53",
        "modifications": [
            {"impacted_coverage": "Covered Autos Liability",
             "effect_category": "expands_coverage",
             "verbatim_language": "blanket additional insured status granted",
             "severity": "Major", "page_numbers": [2]},
            {"impacted_exclusion": "Transfer of Rights of Recovery",
             "effect_category": "narrows_exclusion",
             "exception_conditions": "Waived when required by written contract",
             "severity": "Material", "page_numbers": [2]}
        ]}], "confidence": 0.85}"#;

    let llm = FakeLlm::new(&[
        ("declarations-page fields", DECLARATIONS_RESPONSE),
        ("Extract every endorsement", projection_response),
        ("ENTITIES:", "[]"),
    ]);
    let pages = HashMap::from([(doc, vec![
        page(doc, 1, DECLARATIONS_TEXT),
        page(doc, 2, endorsement_text),
    ])]);
    let pipeline = pipeline_for(store, pages, llm);

    let payload = WorkflowPayload::single(WorkflowId::generate(), doc);
    ProcessDocumentWorkflow::new(&pipeline).run(&payload).await.unwrap();

    let run = pipeline
        .store
        .stage_run(payload.workflow_id, doc, Stage::Enriched)
        .await
        .unwrap()
        .unwrap();
    let synthesis = run.summary.as_ref().unwrap()["synthesis"].clone();

    let coverages = synthesis["effective_coverages"].as_array().unwrap();
    let expanded = coverages
        .iter()
        .find(|c| c["name"].as_str().unwrap_or_default().contains("Covered Autos"))
        .expect("expanded coverage");
    assert_eq!(
        expanded["effective_state"].as_str(),
        Some(serde_json::to_value(EffectiveState::ExpandedCoverage).unwrap().as_str().unwrap())
    );
    assert!(expanded["sources"].as_array().unwrap().iter().any(|s| s == "CA T3 53"));
    assert!(expanded["confidence"].as_f64().unwrap() >= 0.7);

    let exclusions = synthesis["effective_exclusions"].as_array().unwrap();
    let narrowed = exclusions
        .iter()
        .find(|e| e["name"].as_str().unwrap_or_default().contains("Transfer Of Rights"))
        .expect("narrowed exclusion");
    assert!(!narrowed["carve_backs"].as_array().unwrap().is_empty());
    assert!(narrowed["sources"].as_array().unwrap().iter().any(|s| s == "CA T3 53"));
    assert!(narrowed["confidence"].as_f64().unwrap() >= 0.7);
}

#[tokio::test]
async fn saga_rollback_removes_exactly_this_runs_entities() {
    let doc = DocumentId::generate();
    let store = FailingStore::new();

    // Another document's canonical entity, created by an earlier run,
    // must survive the rollback untouched.
    let bystander = CanonicalEntity {
        id: CanonicalEntityId::generate(),
        entity_type: EntityType::Organization,
        name: "Bystander Corp".to_owned(),
        fingerprint: "organization:bystander corp:".to_owned(),
        attributes: Default::default(),
        confidence: 0.9,
        mention_count: 1,
    };
    store.upsert_canonical_entity(bystander.clone()).await.unwrap();
    store
        .upsert_document(Document::new(doc, "policy.pdf", 1).with_file_path("tenant/policy.pdf"))
        .await
        .unwrap();
    store.fail_add_relationships.store(true, Ordering::SeqCst);

    let llm = FakeLlm::new(&[
        ("declarations-page fields", DECLARATIONS_RESPONSE),
        ("ENTITIES:", "[]"),
    ]);
    let pipeline = Pipeline::new(
        store,
        FakeOcr::new(HashMap::from([(doc, vec![page(doc, 1, DECLARATIONS_TEXT)])])),
        llm,
        HashEmbedder,
        MemoryGraphStore::new(),
        FakeStorage,
        PipelineConfig::default(),
    );

    let payload = WorkflowPayload::single(WorkflowId::generate(), doc);
    let workflow = ProcessDocumentWorkflow::new(&pipeline);
    let err = workflow.run(&payload).await.unwrap_err();
    assert!(err.to_string().contains("injected relationship failure"));

    // Exactly the entities created this run are gone; the bystander and
    // earlier stage markers remain.
    assert_eq!(pipeline.store.inner.canonical_entity_count(), 1);
    let survivors = pipeline
        .store
        .canonical_entities(&[bystander.id])
        .await
        .unwrap();
    assert_eq!(survivors.len(), 1);
    assert_eq!(survivors[0].name, "Bystander Corp");

    let processed = pipeline
        .store
        .stage_run(payload.workflow_id, doc, Stage::Processed)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(processed.status, StageStatus::Completed);
    let enriched = pipeline
        .store
        .stage_run(payload.workflow_id, doc, Stage::Enriched)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(enriched.status, StageStatus::Failed);

    assert_eq!(workflow.status_handle().get_status().status, "failed");
}

#[tokio::test]
async fn resumption_skips_completed_stages_and_reuses_summaries() {
    let doc = DocumentId::generate();
    let store = FailingStore::new();
    store
        .upsert_document(Document::new(doc, "policy.pdf", 1).with_file_path("tenant/policy.pdf"))
        .await
        .unwrap();
    // First run dies inside EXTRACTED, after PROCESSED committed.
    store.fail_add_section_extraction.store(true, Ordering::SeqCst);

    let llm = FakeLlm::new(&[
        ("declarations-page fields", DECLARATIONS_RESPONSE),
        ("ENTITIES:", "[]"),
    ]);
    let pipeline = Pipeline::new(
        store,
        FakeOcr::new(HashMap::from([(doc, vec![page(doc, 1, DECLARATIONS_TEXT)])])),
        llm,
        HashEmbedder,
        MemoryGraphStore::new(),
        FakeStorage,
        PipelineConfig::default(),
    );

    let workflow_id = WorkflowId::generate();
    let payload = WorkflowPayload::single(workflow_id, doc);
    ProcessDocumentWorkflow::new(&pipeline)
        .run(&payload)
        .await
        .unwrap_err();

    let processed_run = pipeline
        .store
        .stage_run(workflow_id, doc, Stage::Processed)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(processed_run.status, StageStatus::Completed);
    let first_summary = processed_run.summary.clone().unwrap();
    let ocr_calls_before = pipeline.ocr.call_count();

    // The worker restarts; the failure is gone.
    pipeline
        .store
        .fail_add_section_extraction
        .store(false, Ordering::SeqCst);
    let results = ProcessDocumentWorkflow::new(&pipeline)
        .run(&payload)
        .await
        .unwrap();

    // PROCESSED was skipped by marker: same summary, no further OCR calls.
    assert_eq!(results[&Stage::Processed], first_summary);
    assert_eq!(pipeline.ocr.call_count(), ocr_calls_before);
    assert_eq!(
        pipeline
            .store
            .stage_run(workflow_id, doc, Stage::Summarized)
            .await
            .unwrap()
            .unwrap()
            .status,
        StageStatus::Completed
    );
}

#[tokio::test]
async fn rerunning_a_completed_workflow_changes_nothing() {
    let doc = DocumentId::generate();
    let store = MemoryStore::new();
    seed_document(&store, doc, 1).await;

    let llm = FakeLlm::new(&[
        ("declarations-page fields", DECLARATIONS_RESPONSE),
        ("ENTITIES:", "[]"),
    ]);
    let pages = HashMap::from([(doc, vec![page(doc, 1, DECLARATIONS_TEXT)])]);
    let pipeline = pipeline_for(store, pages, llm);

    let payload = WorkflowPayload::single(WorkflowId::generate(), doc);
    let first = ProcessDocumentWorkflow::new(&pipeline).run(&payload).await.unwrap();
    let entity_count_before = pipeline.store.canonical_entity_count();
    let embeddings_before = pipeline.store.embeddings(doc).await.unwrap().len();
    let ocr_calls_before = pipeline.ocr.call_count();

    let second = ProcessDocumentWorkflow::new(&pipeline).run(&payload).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(pipeline.store.canonical_entity_count(), entity_count_before);
    assert_eq!(pipeline.store.embeddings(doc).await.unwrap().len(), embeddings_before);
    assert_eq!(pipeline.ocr.call_count(), ocr_calls_before);
}

#[tokio::test]
async fn payload_must_reference_exactly_one_document() {
    let store = MemoryStore::new();
    let pipeline = pipeline_for(store, HashMap::new(), FakeLlm::empty());
    let workflow = ProcessDocumentWorkflow::new(&pipeline);

    let payload = WorkflowPayload::new(WorkflowId::generate(), Vec::new());
    assert!(workflow.run(&payload).await.is_err());
}
