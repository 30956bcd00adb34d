//! Canonical entities and relationships.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id::{CanonicalEntityId, DocumentId, RelationshipId, WorkflowId};
use crate::mention::EntityType;
use crate::text::normalize_key;

/// A document-agnostic identity for a thing mentioned possibly many times.
///
/// Created or merged by the canonical resolver; referenced by
/// relationships; removed by the saga rollback when the owning run fails.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CanonicalEntity {
    /// Stable identifier.
    pub id: CanonicalEntityId,
    /// Entity kind.
    pub entity_type: EntityType,
    /// Display name.
    pub name: String,
    /// Deterministic match fingerprint.
    pub fingerprint: String,
    /// Merged attributes; highest-confidence value wins per attribute.
    pub attributes: BTreeMap<String, Value>,
    /// Aggregate confidence in `[0, 1]`.
    pub confidence: f32,
    /// How many mentions merged into this entity.
    pub mention_count: u32,
}

impl CanonicalEntity {
    /// Builds the deterministic fingerprint used for canonical matching:
    /// entity type, normalised name, and the strongest key identifier
    /// available (policy number, address, VIN, or license).
    #[must_use]
    pub fn fingerprint_for(
        entity_type: EntityType,
        name: &str,
        attributes: &BTreeMap<String, Value>,
    ) -> String {
        let key_identifier = ["policy_number", "address", "vin", "license_number"]
            .iter()
            .find_map(|key| attributes.get(*key).and_then(Value::as_str))
            .map(normalize_key)
            .unwrap_or_default();
        format!(
            "{}:{}:{}",
            entity_type.as_str(),
            normalize_key(name),
            key_identifier
        )
    }
}

/// Closed vocabulary of relationship types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipType {
    /// Policy → insured organization.
    HasInsured,
    /// Policy → coverage.
    HasCoverage,
    /// Policy → exclusion.
    HasExclusion,
    /// Policy → condition.
    HasCondition,
    /// Policy → insured location.
    HasLocation,
    /// Policy → claim.
    HasClaim,
    /// Provision or policy → modifying endorsement.
    ModifiedBy,
    /// Policy → issuing carrier.
    IssuedBy,
    /// Two canonical entities denote the same thing.
    SameAs,
    /// Provision → evidencing source text.
    SupportedBy,
}

impl RelationshipType {
    /// Stable string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::HasInsured => "HAS_INSURED",
            Self::HasCoverage => "HAS_COVERAGE",
            Self::HasExclusion => "HAS_EXCLUSION",
            Self::HasCondition => "HAS_CONDITION",
            Self::HasLocation => "HAS_LOCATION",
            Self::HasClaim => "HAS_CLAIM",
            Self::ModifiedBy => "MODIFIED_BY",
            Self::IssuedBy => "ISSUED_BY",
            Self::SameAs => "SAME_AS",
            Self::SupportedBy => "SUPPORTED_BY",
        }
    }

    /// Parses the stable string form.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_uppercase().as_str() {
            "HAS_INSURED" => Some(Self::HasInsured),
            "HAS_COVERAGE" => Some(Self::HasCoverage),
            "HAS_EXCLUSION" => Some(Self::HasExclusion),
            "HAS_CONDITION" => Some(Self::HasCondition),
            "HAS_LOCATION" => Some(Self::HasLocation),
            "HAS_CLAIM" => Some(Self::HasClaim),
            "MODIFIED_BY" => Some(Self::ModifiedBy),
            "ISSUED_BY" => Some(Self::IssuedBy),
            "SAME_AS" => Some(Self::SameAs),
            "SUPPORTED_BY" => Some(Self::SupportedBy),
            _ => None,
        }
    }
}

/// A typed edge between two canonical entities.
///
/// Both endpoints must exist at commit time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Relationship {
    /// Row identifier.
    pub id: RelationshipId,
    /// Producing workflow run.
    pub workflow_id: WorkflowId,
    /// Document the evidence came from.
    pub document_id: DocumentId,
    /// Source entity.
    pub source_id: CanonicalEntityId,
    /// Target entity.
    pub target_id: CanonicalEntityId,
    /// Edge type.
    pub relationship_type: RelationshipType,
    /// Optional attributes (e.g. contractual condition on an
    /// additional-insured link).
    pub attributes: BTreeMap<String, Value>,
    /// Extraction confidence in `[0, 1]`.
    pub confidence: f32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fingerprint_prefers_policy_number() {
        let mut attrs = BTreeMap::new();
        attrs.insert("policy_number".to_owned(), json!("POL-123"));
        let fp = CanonicalEntity::fingerprint_for(EntityType::Policy, "Acme Policy", &attrs);
        assert_eq!(fp, "policy:acme policy:pol 123");
    }

    #[test]
    fn fingerprint_without_identifier_still_deterministic() {
        let attrs = BTreeMap::new();
        let a = CanonicalEntity::fingerprint_for(EntityType::Coverage, "Collision", &attrs);
        let b = CanonicalEntity::fingerprint_for(EntityType::Coverage, "COLLISION", &attrs);
        assert_eq!(a, b);
    }

    #[test]
    fn relationship_type_round_trips() {
        for rel in [
            RelationshipType::HasInsured,
            RelationshipType::ModifiedBy,
            RelationshipType::SupportedBy,
        ] {
            assert_eq!(RelationshipType::parse(rel.as_str()), Some(rel));
        }
    }
}
