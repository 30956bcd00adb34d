//! Reconciliation of LLM and deterministic entity mentions.

use std::collections::{BTreeMap, HashSet};

use bindery_core::{EntityMention, EntityType};
use tracing::debug;

/// Counts of parser mentions that filled gaps in the LLM output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    /// Backstop count per entity type.
    pub backstopped: BTreeMap<EntityType, usize>,
}

impl ReconcileStats {
    /// Total mentions contributed by the deterministic parser.
    #[must_use]
    pub fn total_backstopped(&self) -> usize {
        self.backstopped.values().sum()
    }
}

/// Merges LLM mentions with deterministic mentions for one chunk.
///
/// The merge key is `(type, case-folded punctuation-stripped value)`. LLM
/// mentions win duplicates; parser mentions fill gaps and are counted in
/// the returned stats.
#[must_use]
pub fn reconcile_mentions(
    llm: Vec<EntityMention>,
    deterministic: Vec<EntityMention>,
) -> (Vec<EntityMention>, ReconcileStats) {
    let mut seen: HashSet<(EntityType, String)> = llm.iter().map(EntityMention::merge_key).collect();
    let mut merged = llm;
    let mut stats = ReconcileStats::default();

    for mention in deterministic {
        let key = mention.merge_key();
        if seen.insert(key) {
            *stats.backstopped.entry(mention.entity_type).or_default() += 1;
            merged.push(mention);
        }
    }

    if stats.total_backstopped() > 0 {
        debug!(backstopped = stats.total_backstopped(), "parser backstop filled gaps");
    }

    (merged, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bindery_core::MentionSource;

    fn mention(entity_type: EntityType, value: &str, source: MentionSource) -> EntityMention {
        EntityMention::new(entity_type, value, value, 0.8, source)
    }

    #[test]
    fn llm_wins_duplicates() {
        let llm = vec![mention(EntityType::Policy, "POL-123", MentionSource::Llm)];
        let parsed = vec![mention(EntityType::Policy, "pol 123", MentionSource::Deterministic)];
        let (merged, stats) = reconcile_mentions(llm, parsed);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].source, MentionSource::Llm);
        assert_eq!(stats.total_backstopped(), 0);
    }

    #[test]
    fn parser_fills_gaps_and_is_counted() {
        let llm = vec![mention(EntityType::Policy, "POL-123", MentionSource::Llm)];
        let parsed = vec![
            mention(EntityType::Organization, "Acme LLC", MentionSource::Deterministic),
            mention(EntityType::Policy, "POL-123", MentionSource::Deterministic),
        ];
        let (merged, stats) = reconcile_mentions(llm, parsed);
        assert_eq!(merged.len(), 2);
        assert_eq!(stats.backstopped.get(&EntityType::Organization), Some(&1));
        assert_eq!(stats.backstopped.get(&EntityType::Policy), None);
    }

    #[test]
    fn same_value_different_type_is_not_a_duplicate() {
        let llm = vec![mention(EntityType::Coverage, "Collision", MentionSource::Llm)];
        let parsed = vec![mention(EntityType::Exclusion, "Collision", MentionSource::Deterministic)];
        let (merged, _) = reconcile_mentions(llm, parsed);
        assert_eq!(merged.len(), 2);
    }
}
