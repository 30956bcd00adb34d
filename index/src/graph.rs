//! Graph projection of canonical entities and relationships.

use std::collections::{BTreeMap, HashMap};

use bindery_core::{
    BinderyError, CanonicalEntity, EffectiveCoverage, EffectiveExclusion, GraphEdgeSpec,
    GraphNodeSpec, GraphStore, Relationship, RelationshipType, Result, WorkflowId,
};
use parking_lot::RwLock;
use petgraph::graph::{DiGraph, NodeIndex};
use serde_json::{json, Value};
use tracing::info;

/// Projects the canonical set into a graph store, fencing every node with
/// the producing `workflow_id`.
#[derive(Debug, Clone, Default)]
pub struct GraphProjector;

impl GraphProjector {
    /// Creates a projector.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Writes entity nodes and relationship edges.
    ///
    /// # Errors
    ///
    /// Propagates graph-store failures; returns an invariant violation
    /// when a relationship references an entity outside the set.
    pub async fn project<G: GraphStore>(
        &self,
        store: &G,
        workflow_id: WorkflowId,
        entities: &[CanonicalEntity],
        relationships: &[Relationship],
    ) -> Result<()> {
        for entity in entities {
            store.write_node(entity_node(workflow_id, entity)).await?;
        }

        for relationship in relationships {
            let known = |id| entities.iter().any(|e| e.id == id);
            if !known(relationship.source_id) || !known(relationship.target_id) {
                return Err(BinderyError::InvariantViolation(format!(
                    "relationship {} references an entity outside the canonical set",
                    relationship.id
                )));
            }
            let mut properties: BTreeMap<String, Value> = relationship
                .attributes
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            properties.insert("workflow_id".to_owned(), json!(relationship.workflow_id.to_string()));
            properties.insert("confidence".to_owned(), json!(relationship.confidence));
            store
                .write_edge(GraphEdgeSpec {
                    source_key: relationship.source_id.to_string(),
                    target_key: relationship.target_id.to_string(),
                    relationship: relationship.relationship_type.as_str().to_owned(),
                    properties,
                })
                .await?;
        }

        info!(
            workflow_id = %workflow_id,
            nodes = entities.len(),
            edges = relationships.len(),
            "graph projection written"
        );
        Ok(())
    }

    /// Writes `SUPPORTED_BY` evidence edges from effective provisions to
    /// their source text nodes, keeping explanations queryable.
    ///
    /// # Errors
    ///
    /// Propagates graph-store failures.
    pub async fn project_evidence<G: GraphStore>(
        &self,
        store: &G,
        workflow_id: WorkflowId,
        coverages: &[EffectiveCoverage],
        exclusions: &[EffectiveExclusion],
    ) -> Result<()> {
        let mut written = 0usize;

        for coverage in coverages {
            write_provision(
                store,
                workflow_id,
                &coverage.canonical_id,
                &coverage.name,
                coverage.effective_state.as_str(),
                coverage.source_text.as_deref(),
                &coverage.page_numbers,
                "EffectiveCoverage",
            )
            .await?;
            written += 1;
        }
        for exclusion in exclusions {
            write_provision(
                store,
                workflow_id,
                &exclusion.canonical_id,
                &exclusion.name,
                exclusion.effective_state.as_str(),
                exclusion.source_text.as_deref(),
                &exclusion.page_numbers,
                "EffectiveExclusion",
            )
            .await?;
            written += 1;
        }

        info!(workflow_id = %workflow_id, provisions = written, "evidence projection written");
        Ok(())
    }
}

#[allow(clippy::too_many_arguments)]
async fn write_provision<G: GraphStore>(
    store: &G,
    workflow_id: WorkflowId,
    canonical_id: &str,
    name: &str,
    state: &str,
    source_text: Option<&str>,
    pages: &[u32],
    label: &str,
) -> Result<()> {
    let mut properties = BTreeMap::new();
    properties.insert("canonical_entity_id".to_owned(), json!(canonical_id));
    properties.insert("workflow_id".to_owned(), json!(workflow_id.to_string()));
    properties.insert("name".to_owned(), json!(name));
    properties.insert("effective_state".to_owned(), json!(state));
    store
        .write_node(GraphNodeSpec {
            key: format!("{workflow_id}:{canonical_id}"),
            labels: vec![label.to_owned()],
            properties,
        })
        .await?;

    if let Some(text) = source_text {
        let evidence_key = format!("{workflow_id}:{canonical_id}:evidence");
        let mut evidence_props = BTreeMap::new();
        evidence_props.insert("workflow_id".to_owned(), json!(workflow_id.to_string()));
        evidence_props.insert("text".to_owned(), json!(text));
        evidence_props.insert("page_numbers".to_owned(), json!(pages));
        store
            .write_node(GraphNodeSpec {
                key: evidence_key.clone(),
                labels: vec!["Evidence".to_owned()],
                properties: evidence_props,
            })
            .await?;
        store
            .write_edge(GraphEdgeSpec {
                source_key: format!("{workflow_id}:{canonical_id}"),
                target_key: evidence_key,
                relationship: RelationshipType::SupportedBy.as_str().to_owned(),
                properties: BTreeMap::new(),
            })
            .await?;
    }
    Ok(())
}

fn entity_node(workflow_id: WorkflowId, entity: &CanonicalEntity) -> GraphNodeSpec {
    let mut properties: BTreeMap<String, Value> = entity
        .attributes
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    properties.insert("canonical_entity_id".to_owned(), json!(entity.id.to_string()));
    properties.insert("workflow_id".to_owned(), json!(workflow_id.to_string()));
    properties.insert("name".to_owned(), json!(entity.name));
    properties.insert("confidence".to_owned(), json!(entity.confidence));
    GraphNodeSpec {
        key: entity.id.to_string(),
        labels: vec![pascal_label(entity.entity_type.as_str())],
        properties,
    }
}

fn pascal_label(tag: &str) -> String {
    tag.split('_')
        .map(|part| {
            let mut chars = part.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().collect::<String>() + chars.as_str()
            })
        })
        .collect()
}

/// In-memory graph store on petgraph, used as the reference implementation
/// and in tests.
#[derive(Debug, Default)]
pub struct MemoryGraphStore {
    inner: RwLock<MemoryGraphInner>,
}

#[derive(Debug, Default)]
struct MemoryGraphInner {
    graph: DiGraph<GraphNodeSpec, GraphEdgeSpec>,
    keys: HashMap<String, NodeIndex>,
}

impl MemoryGraphStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.inner.read().graph.node_count()
    }

    /// Number of edges.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.inner.read().graph.edge_count()
    }

    /// Nodes whose `workflow_id` property matches.
    #[must_use]
    pub fn nodes_for_workflow(&self, workflow_id: WorkflowId) -> Vec<GraphNodeSpec> {
        let wanted = json!(workflow_id.to_string());
        self.inner
            .read()
            .graph
            .node_weights()
            .filter(|node| node.properties.get("workflow_id") == Some(&wanted))
            .cloned()
            .collect()
    }
}

impl GraphStore for MemoryGraphStore {
    async fn write_node(&self, node: GraphNodeSpec) -> Result<()> {
        let mut inner = self.inner.write();
        if let Some(&index) = inner.keys.get(&node.key) {
            inner.graph[index] = node;
        } else {
            let key = node.key.clone();
            let index = inner.graph.add_node(node);
            inner.keys.insert(key, index);
        }
        Ok(())
    }

    async fn write_edge(&self, edge: GraphEdgeSpec) -> Result<()> {
        let mut inner = self.inner.write();
        let source = inner.keys.get(&edge.source_key).copied().ok_or_else(|| {
            BinderyError::NotFound(format!("graph node {}", edge.source_key))
        })?;
        let target = inner.keys.get(&edge.target_key).copied().ok_or_else(|| {
            BinderyError::NotFound(format!("graph node {}", edge.target_key))
        })?;
        inner.graph.add_edge(source, target, edge);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bindery_core::{CanonicalEntityId, DocumentId, EntityType, RelationshipId};
    use std::collections::BTreeMap;

    fn entity(entity_type: EntityType, name: &str) -> CanonicalEntity {
        CanonicalEntity {
            id: CanonicalEntityId::generate(),
            entity_type,
            name: name.to_owned(),
            fingerprint: format!("{}:{name}:", entity_type.as_str()),
            attributes: BTreeMap::new(),
            confidence: 0.8,
            mention_count: 1,
        }
    }

    #[tokio::test]
    async fn projection_writes_scoped_nodes_and_edges() {
        let store = MemoryGraphStore::new();
        let workflow = WorkflowId::generate();
        let policy = entity(EntityType::Policy, "POL-1");
        let org = entity(EntityType::Organization, "Acme LLC");
        let relationship = Relationship {
            id: RelationshipId::generate(),
            workflow_id: workflow,
            document_id: DocumentId::generate(),
            source_id: policy.id,
            target_id: org.id,
            relationship_type: RelationshipType::HasInsured,
            attributes: BTreeMap::new(),
            confidence: 0.9,
        };

        GraphProjector::new()
            .project(&store, workflow, &[policy, org], &[relationship])
            .await
            .unwrap();

        assert_eq!(store.node_count(), 2);
        assert_eq!(store.edge_count(), 1);
        let scoped = store.nodes_for_workflow(workflow);
        assert_eq!(scoped.len(), 2);
        assert!(scoped.iter().all(|n| n.properties.contains_key("canonical_entity_id")));

        let other = store.nodes_for_workflow(WorkflowId::generate());
        assert!(other.is_empty());
    }

    #[tokio::test]
    async fn dangling_relationship_is_an_invariant_violation() {
        let store = MemoryGraphStore::new();
        let workflow = WorkflowId::generate();
        let policy = entity(EntityType::Policy, "POL-1");
        let relationship = Relationship {
            id: RelationshipId::generate(),
            workflow_id: workflow,
            document_id: DocumentId::generate(),
            source_id: policy.id,
            target_id: CanonicalEntityId::generate(),
            relationship_type: RelationshipType::HasCoverage,
            attributes: BTreeMap::new(),
            confidence: 0.9,
        };
        let err = GraphProjector::new()
            .project(&store, workflow, &[policy], &[relationship])
            .await
            .unwrap_err();
        assert!(matches!(err, BinderyError::InvariantViolation(_)));
    }

    #[tokio::test]
    async fn evidence_edges_link_provisions_to_source_text() {
        let store = MemoryGraphStore::new();
        let workflow = WorkflowId::generate();
        let coverage = EffectiveCoverage {
            canonical_id: "CA_LIABILITY".to_owned(),
            name: "Covered Autos Liability Coverage".to_owned(),
            effective_state: bindery_core::EffectiveState::ExpandedCoverage,
            scope: None,
            conditions: Vec::new(),
            impacted_coverages: Vec::new(),
            sources: vec!["CA T3 53".to_owned()],
            confidence: 0.9,
            severity: None,
            description: None,
            page_numbers: vec![14],
            source_text: Some("blanket additional insured".to_owned()),
            clause_reference: None,
            is_standard_provision: false,
            is_modified: true,
        };

        GraphProjector::new()
            .project_evidence(&store, workflow, &[coverage], &[])
            .await
            .unwrap();

        // Provision node + evidence node, linked by SUPPORTED_BY.
        assert_eq!(store.node_count(), 2);
        assert_eq!(store.edge_count(), 1);
    }
}
