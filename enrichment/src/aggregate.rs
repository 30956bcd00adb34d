//! Cross-chunk entity aggregation.

use std::collections::BTreeMap;

use bindery_core::{ChunkId, EntityMention, EntityType};
use serde_json::Value;
use tracing::debug;

/// All mentions of one entity within a document, merged.
#[derive(Clone, Debug)]
pub struct AggregatedEntity {
    /// Entity kind.
    pub entity_type: EntityType,
    /// Display name from the highest-confidence mention.
    pub name: String,
    /// Normalised grouping key.
    pub key: String,
    /// Merged attributes.
    pub attributes: BTreeMap<String, Value>,
    /// Highest mention confidence.
    pub confidence: f32,
    /// Number of merged mentions.
    pub mention_count: u32,
    /// Chunks the mentions came from.
    pub chunk_ids: Vec<ChunkId>,
}

/// Per-attribute provenance used during the merge.
struct AttributeSlot {
    value: Value,
    confidence: f32,
}

/// Groups mentions by `(type, normalised key)` and merges attribute sets.
///
/// Merge policy: the highest-confidence mention wins each scalar
/// attribute; list attributes are unioned. Date mentions are folded into
/// the document's policy aggregate (as `effective_date` /
/// `expiration_date`) rather than standing alone.
#[must_use]
pub fn aggregate_mentions(mentions: &[EntityMention]) -> Vec<AggregatedEntity> {
    let mut groups: BTreeMap<(EntityType, String), Vec<&EntityMention>> = BTreeMap::new();
    let mut date_mentions: Vec<&EntityMention> = Vec::new();

    for mention in mentions {
        if mention.entity_type.is_canonicalizable() {
            groups.entry(mention.merge_key()).or_default().push(mention);
        } else {
            date_mentions.push(mention);
        }
    }

    let mut aggregates: Vec<AggregatedEntity> = groups
        .into_values()
        .map(|group| merge_group(&group))
        .collect();

    fold_dates_into_policy(&mut aggregates, &date_mentions);

    debug!(
        mentions = mentions.len(),
        unique_entities = aggregates.len(),
        "aggregation complete"
    );
    aggregates
}

fn merge_group(group: &[&EntityMention]) -> AggregatedEntity {
    let best = group
        .iter()
        .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
        .unwrap_or_else(|| unreachable!());

    let mut slots: BTreeMap<String, AttributeSlot> = BTreeMap::new();
    for mention in group {
        for (key, value) in &mention.attributes {
            match slots.get_mut(key) {
                Some(slot) if slot.value.is_array() && value.is_array() => {
                    union_arrays(&mut slot.value, value);
                    slot.confidence = slot.confidence.max(mention.confidence);
                }
                Some(slot) if mention.confidence > slot.confidence => {
                    *slot = AttributeSlot {
                        value: value.clone(),
                        confidence: mention.confidence,
                    };
                }
                Some(_) => {}
                None => {
                    slots.insert(
                        key.clone(),
                        AttributeSlot {
                            value: value.clone(),
                            confidence: mention.confidence,
                        },
                    );
                }
            }
        }
    }

    let mut chunk_ids: Vec<ChunkId> = group.iter().filter_map(|m| m.chunk_id.clone()).collect();
    chunk_ids.sort();
    chunk_ids.dedup();

    AggregatedEntity {
        entity_type: best.entity_type,
        name: best.normalized_value.clone(),
        key: best.merge_key().1,
        attributes: slots.into_iter().map(|(k, s)| (k, s.value)).collect(),
        confidence: best.confidence,
        mention_count: group.len() as u32,
        chunk_ids,
    }
}

fn union_arrays(target: &mut Value, incoming: &Value) {
    let (Some(target_items), Some(incoming_items)) = (target.as_array_mut(), incoming.as_array())
    else {
        return;
    };
    for item in incoming_items {
        if !target_items.contains(item) {
            target_items.push(item.clone());
        }
    }
}

fn fold_dates_into_policy(aggregates: &mut [AggregatedEntity], dates: &[&EntityMention]) {
    let Some(policy) = aggregates
        .iter_mut()
        .find(|a| a.entity_type == EntityType::Policy)
    else {
        return;
    };
    for mention in dates {
        let attr = match mention.entity_type {
            EntityType::EffectiveDate => "effective_date",
            EntityType::ExpirationDate => "expiration_date",
            _ => continue,
        };
        policy
            .attributes
            .entry(attr.to_owned())
            .or_insert_with(|| Value::String(mention.normalized_value.clone()));
    }
}
