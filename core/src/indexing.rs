//! Rows written by the SUMMARIZED stage: embeddings and graph specs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::chunk::SectionType;
use crate::id::{CanonicalEntityId, ChunkId, DocumentId};
use crate::mention::EntityType;

/// One embedding row in the vector store.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VectorEmbeddingRow {
    /// Row identifier.
    pub id: Uuid,
    /// Owning document.
    pub document_id: DocumentId,
    /// Source chunk, for chunk embeddings.
    pub chunk_id: Option<ChunkId>,
    /// Source canonical entity, for entity embeddings.
    pub canonical_entity_id: Option<CanonicalEntityId>,
    /// Section provenance.
    pub section_type: Option<SectionType>,
    /// Entity-type provenance, for entity embeddings.
    pub entity_type: Option<EntityType>,
    /// The embedded content.
    pub content: String,
    /// The embedding vector.
    pub embedding: Vec<f32>,
    /// Page-number provenance.
    pub page_numbers: Vec<u32>,
}

/// A node to be written to the graph store.
///
/// Properties always carry `canonical_entity_id` and `workflow_id` so
/// per-workflow queries are fenced.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GraphNodeSpec {
    /// Unique key within the graph (typically the canonical entity id).
    pub key: String,
    /// Node labels.
    pub labels: Vec<String>,
    /// Node properties.
    pub properties: BTreeMap<String, Value>,
}

/// An edge to be written to the graph store.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GraphEdgeSpec {
    /// Source node key.
    pub source_key: String,
    /// Target node key.
    pub target_key: String,
    /// Edge type, from the closed relationship vocabulary.
    pub relationship: String,
    /// Edge properties.
    pub properties: BTreeMap<String, Value>,
}
