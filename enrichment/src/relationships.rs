//! Pass-2 relationship extraction over the canonical set.

use std::collections::{BTreeMap, HashSet};

use bindery_core::{
    CanonicalEntity, CanonicalEntityId, DocumentId, EntityType, GenerationRequest, LlmClient,
    Relationship, RelationshipId, RelationshipType, WorkflowId,
};
use serde_json::Value;
use tracing::{debug, info, warn};

const RELATIONSHIP_INSTRUCTION: &str = "You are an insurance knowledge-graph builder. \
Given a numbered list of entities from one policy document, emit the relationships between \
them as a JSON array. Each item: {\"source\": <index>, \"target\": <index>, \"type\": one of \
HAS_INSURED, HAS_COVERAGE, HAS_EXCLUSION, HAS_CONDITION, HAS_LOCATION, HAS_CLAIM, \
MODIFIED_BY, ISSUED_BY, SAME_AS, \"confidence\": 0..1, \"attributes\": {}}. \
Respond with the JSON array only.";

/// Extracts typed relationships between canonical entities.
///
/// The LLM proposes edges against a closed vocabulary; anything outside it,
/// or referencing unknown endpoints, is dropped. When the model yields
/// nothing usable, deterministic structural edges (policy to its parties
/// and provisions) keep the graph connected.
#[derive(Debug, Clone, Default)]
pub struct RelationshipExtractor;

impl RelationshipExtractor {
    /// Creates an extractor.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Extracts relationships among `entities`, which must all exist at
    /// commit time (the caller persists them before calling).
    pub async fn extract<L: LlmClient>(
        &self,
        client: &L,
        workflow_id: WorkflowId,
        document_id: DocumentId,
        entities: &[CanonicalEntity],
    ) -> Vec<Relationship> {
        if entities.len() < 2 {
            return Vec::new();
        }

        let mut relationships = self
            .extract_with_llm(client, workflow_id, document_id, entities)
            .await;

        if relationships.is_empty() {
            debug!("no usable model edges, falling back to structural pass");
            relationships = structural_edges(workflow_id, document_id, entities);
        }

        info!(
            document_id = %document_id,
            count = relationships.len(),
            "relationship extraction complete"
        );
        relationships
    }

    async fn extract_with_llm<L: LlmClient>(
        &self,
        client: &L,
        workflow_id: WorkflowId,
        document_id: DocumentId,
        entities: &[CanonicalEntity],
    ) -> Vec<Relationship> {
        let listing = entities
            .iter()
            .enumerate()
            .map(|(i, e)| {
                format!(
                    "{i}: [{}] {} {}",
                    e.entity_type.as_str(),
                    e.name,
                    serde_json::to_string(&e.attributes).unwrap_or_default()
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        let request = GenerationRequest::new(format!("ENTITIES:\n{listing}"))
            .with_system_instruction(RELATIONSHIP_INSTRUCTION)
            .json_mode();

        let response = match client.generate_content(request).await {
            Ok(response) => response,
            Err(err) => {
                warn!(%err, "relationship model call failed, using structural fallback");
                return Vec::new();
            }
        };

        let Ok(value) = serde_json::from_str::<Value>(response.trim()) else {
            return Vec::new();
        };
        let Some(items) = value.as_array() else {
            return Vec::new();
        };

        let known: HashSet<CanonicalEntityId> = entities.iter().map(|e| e.id).collect();
        let mut out = Vec::new();
        for item in items {
            let Some(edge) = parse_edge(item, entities) else {
                continue;
            };
            if !known.contains(&edge.0) || !known.contains(&edge.1) || edge.0 == edge.1 {
                continue;
            }
            out.push(Relationship {
                id: RelationshipId::generate(),
                workflow_id,
                document_id,
                source_id: edge.0,
                target_id: edge.1,
                relationship_type: edge.2,
                attributes: edge.3,
                confidence: edge.4,
            });
        }
        out
    }
}

type ParsedEdge = (
    CanonicalEntityId,
    CanonicalEntityId,
    RelationshipType,
    BTreeMap<String, Value>,
    f32,
);

fn parse_edge(item: &Value, entities: &[CanonicalEntity]) -> Option<ParsedEdge> {
    let source = item.get("source")?.as_u64()? as usize;
    let target = item.get("target")?.as_u64()? as usize;
    let relationship_type = RelationshipType::parse(item.get("type")?.as_str()?)?;
    let confidence = item
        .get("confidence")
        .and_then(Value::as_f64)
        .map_or(0.7, |c| c as f32)
        .clamp(0.0, 1.0);
    let attributes = item
        .get("attributes")
        .and_then(Value::as_object)
        .map(|map| map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default();
    Some((
        entities.get(source)?.id,
        entities.get(target)?.id,
        relationship_type,
        attributes,
        confidence,
    ))
}

/// Deterministic skeleton edges from the policy to its parties and
/// provisions.
fn structural_edges(
    workflow_id: WorkflowId,
    document_id: DocumentId,
    entities: &[CanonicalEntity],
) -> Vec<Relationship> {
    let Some(policy) = entities.iter().find(|e| e.entity_type == EntityType::Policy) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    let mut push = |source: CanonicalEntityId, target: CanonicalEntityId, rel: RelationshipType| {
        out.push(Relationship {
            id: RelationshipId::generate(),
            workflow_id,
            document_id,
            source_id: source,
            target_id: target,
            relationship_type: rel,
            attributes: BTreeMap::new(),
            confidence: 0.6,
        });
    };

    for entity in entities {
        if entity.id == policy.id {
            continue;
        }
        match entity.entity_type {
            EntityType::Organization => {
                let role = entity
                    .attributes
                    .get("role")
                    .and_then(Value::as_str)
                    .unwrap_or("insured");
                if role == "carrier" {
                    push(policy.id, entity.id, RelationshipType::IssuedBy);
                } else {
                    push(policy.id, entity.id, RelationshipType::HasInsured);
                }
            }
            EntityType::Coverage => push(policy.id, entity.id, RelationshipType::HasCoverage),
            EntityType::Exclusion => push(policy.id, entity.id, RelationshipType::HasExclusion),
            EntityType::Condition => push(policy.id, entity.id, RelationshipType::HasCondition),
            EntityType::Location => push(policy.id, entity.id, RelationshipType::HasLocation),
            EntityType::Claim => push(policy.id, entity.id, RelationshipType::HasClaim),
            EntityType::Endorsement => push(policy.id, entity.id, RelationshipType::ModifiedBy),
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use bindery_core::Result;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn entity(entity_type: EntityType, name: &str, attrs: &[(&str, Value)]) -> CanonicalEntity {
        let attributes: BTreeMap<String, Value> =
            attrs.iter().map(|(k, v)| ((*k).to_owned(), v.clone())).collect();
        CanonicalEntity {
            id: CanonicalEntityId::generate(),
            entity_type,
            name: name.to_owned(),
            fingerprint: CanonicalEntity::fingerprint_for(entity_type, name, &attributes),
            attributes,
            confidence: 0.8,
            mention_count: 1,
        }
    }

    struct ScriptedLlm(&'static str);

    impl LlmClient for ScriptedLlm {
        fn model(&self) -> &str {
            "scripted"
        }
        async fn generate_content(&self, _request: GenerationRequest) -> Result<String> {
            Ok(self.0.to_owned())
        }
    }

    #[tokio::test]
    async fn model_edges_are_validated_against_the_vocabulary() {
        let entities = vec![
            entity(EntityType::Policy, "POL-1", &[]),
            entity(EntityType::Organization, "Acme LLC", &[("role", json!("insured"))]),
        ];
        let llm = ScriptedLlm(
            r#"[{"source": 0, "target": 1, "type": "HAS_INSURED", "confidence": 0.9},
                {"source": 0, "target": 1, "type": "INVENTED_EDGE"},
                {"source": 0, "target": 9, "type": "HAS_COVERAGE"}]"#,
        );
        let relationships = RelationshipExtractor::new()
            .extract(&llm, WorkflowId::generate(), DocumentId::generate(), &entities)
            .await;
        assert_eq!(relationships.len(), 1);
        assert_eq!(relationships[0].relationship_type, RelationshipType::HasInsured);
        assert_eq!(relationships[0].source_id, entities[0].id);
        assert_eq!(relationships[0].target_id, entities[1].id);
    }

    #[tokio::test]
    async fn unusable_model_output_falls_back_to_structural_edges() {
        let entities = vec![
            entity(EntityType::Policy, "POL-1", &[]),
            entity(EntityType::Organization, "Chubb", &[("role", json!("carrier"))]),
            entity(EntityType::Coverage, "Collision", &[]),
            entity(EntityType::Endorsement, "CA T3 53", &[]),
        ];
        let llm = ScriptedLlm("I could not find any relationships.");
        let relationships = RelationshipExtractor::new()
            .extract(&llm, WorkflowId::generate(), DocumentId::generate(), &entities)
            .await;

        let types: Vec<RelationshipType> =
            relationships.iter().map(|r| r.relationship_type).collect();
        assert!(types.contains(&RelationshipType::IssuedBy));
        assert!(types.contains(&RelationshipType::HasCoverage));
        assert!(types.contains(&RelationshipType::ModifiedBy));
    }

    #[tokio::test]
    async fn fewer_than_two_entities_yields_nothing() {
        let entities = vec![entity(EntityType::Policy, "POL-1", &[])];
        let llm = ScriptedLlm("[]");
        let relationships = RelationshipExtractor::new()
            .extract(&llm, WorkflowId::generate(), DocumentId::generate(), &entities)
            .await;
        assert!(relationships.is_empty());
    }
}
