//! Canonical entity resolution.

use bindery_core::{CanonicalEntity, CanonicalEntityId};
use tracing::{debug, info};

use crate::aggregate::AggregatedEntity;
use crate::saga::SagaLog;

/// The resolver's output: rows to create, rows to update, and the saga log
/// of created ids.
#[derive(Clone, Debug, Default)]
pub struct ResolutionPlan {
    /// New canonical entities.
    pub created: Vec<CanonicalEntity>,
    /// Existing entities with merged attributes and raised confidence.
    pub merged: Vec<CanonicalEntity>,
    /// Saga log covering exactly the created ids, in creation order.
    pub saga: SagaLog,
}

impl ResolutionPlan {
    /// Ids of every entity the document now references.
    #[must_use]
    pub fn all_ids(&self) -> Vec<CanonicalEntityId> {
        self.created
            .iter()
            .chain(self.merged.iter())
            .map(|e| e.id)
            .collect()
    }
}

/// Matches aggregated mentions against existing canonical entities by
/// deterministic fingerprint; merges on hit, creates on miss.
#[derive(Debug, Clone, Default)]
pub struct CanonicalResolver;

impl CanonicalResolver {
    /// Creates a resolver.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Resolves aggregates against the `existing` canonical set.
    ///
    /// `existing` must contain the candidate entities of the same types
    /// (the caller fetches them from the store); entities absent from it
    /// are treated as misses and created.
    #[must_use]
    pub fn resolve(
        &self,
        existing: &[CanonicalEntity],
        aggregates: Vec<AggregatedEntity>,
    ) -> ResolutionPlan {
        let mut plan = ResolutionPlan::default();

        for aggregate in aggregates {
            let fingerprint = CanonicalEntity::fingerprint_for(
                aggregate.entity_type,
                &aggregate.name,
                &aggregate.attributes,
            );

            let existing_match = existing
                .iter()
                .find(|e| e.fingerprint == fingerprint)
                // A same-run create can also be the match target for a
                // later aggregate of the same thing.
                .or_else(|| plan.created.iter().find(|e| e.fingerprint == fingerprint));

            if let Some(found) = existing_match {
                let mut updated = found.clone();
                for (key, value) in aggregate.attributes {
                    updated.attributes.entry(key).or_insert(value);
                }
                updated.confidence = updated.confidence.max(aggregate.confidence);
                updated.mention_count += aggregate.mention_count;
                debug!(fingerprint, "canonical match merged");
                // If the match was a same-run create, update it in place.
                if let Some(created) = plan
                    .created
                    .iter_mut()
                    .find(|e| e.fingerprint == fingerprint)
                {
                    *created = updated;
                } else {
                    plan.merged.push(updated);
                }
                continue;
            }

            let entity = CanonicalEntity {
                id: CanonicalEntityId::generate(),
                entity_type: aggregate.entity_type,
                name: aggregate.name,
                fingerprint,
                attributes: aggregate.attributes,
                confidence: aggregate.confidence,
                mention_count: aggregate.mention_count,
            };
            plan.saga.record(entity.id);
            plan.created.push(entity);
        }

        info!(
            created = plan.created.len(),
            merged = plan.merged.len(),
            "canonical resolution planned"
        );
        plan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bindery_core::EntityType;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn aggregate(entity_type: EntityType, name: &str, attrs: &[(&str, serde_json::Value)]) -> AggregatedEntity {
        AggregatedEntity {
            entity_type,
            name: name.to_owned(),
            key: bindery_core::text::normalize_key(name),
            attributes: attrs.iter().map(|(k, v)| ((*k).to_owned(), v.clone())).collect(),
            confidence: 0.8,
            mention_count: 1,
            chunk_ids: Vec::new(),
        }
    }

    fn existing(entity_type: EntityType, name: &str) -> CanonicalEntity {
        let attributes = BTreeMap::new();
        CanonicalEntity {
            id: CanonicalEntityId::generate(),
            entity_type,
            name: name.to_owned(),
            fingerprint: CanonicalEntity::fingerprint_for(entity_type, name, &attributes),
            attributes,
            confidence: 0.5,
            mention_count: 1,
        }
    }

    #[test]
    fn miss_creates_and_records_in_saga() {
        let plan = CanonicalResolver::new().resolve(
            &[],
            vec![aggregate(EntityType::Policy, "POL-1", &[("policy_number", json!("POL-1"))])],
        );
        assert_eq!(plan.created.len(), 1);
        assert!(plan.merged.is_empty());
        assert_eq!(plan.saga.created_ids(), vec![plan.created[0].id]);
    }

    #[test]
    fn hit_merges_without_new_row() {
        let prior = existing(EntityType::Organization, "Acme LLC");
        let prior_id = prior.id;
        let plan = CanonicalResolver::new().resolve(
            &[prior],
            vec![aggregate(EntityType::Organization, "ACME LLC", &[("role", json!("insured"))])],
        );
        assert!(plan.created.is_empty());
        assert_eq!(plan.merged.len(), 1);
        assert_eq!(plan.merged[0].id, prior_id);
        assert!((plan.merged[0].confidence - 0.8).abs() < f32::EPSILON);
        assert_eq!(plan.merged[0].mention_count, 2);
        assert!(plan.saga.is_empty());
    }

    #[test]
    fn same_run_duplicates_collapse_into_one_create() {
        let plan = CanonicalResolver::new().resolve(
            &[],
            vec![
                aggregate(EntityType::Coverage, "Collision", &[]),
                aggregate(EntityType::Coverage, "COLLISION", &[]),
            ],
        );
        assert_eq!(plan.created.len(), 1);
        assert_eq!(plan.created[0].mention_count, 2);
        assert_eq!(plan.saga.created_ids().len(), 1);
    }
}
