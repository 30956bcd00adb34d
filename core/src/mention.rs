//! Entity mentions observed inside chunks.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::id::ChunkId;

/// Typed domain entity kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    /// An insurance policy.
    Policy,
    /// A company or person (insured, carrier, broker, claimant).
    Organization,
    /// A coverage grant.
    Coverage,
    /// A policy condition.
    Condition,
    /// An exclusion.
    Exclusion,
    /// An endorsement.
    Endorsement,
    /// An insured location.
    Location,
    /// A claim.
    Claim,
    /// A defined term.
    Definition,
    /// A policy form (e.g. CA 00 01).
    Form,
    /// A scheduled vehicle.
    Vehicle,
    /// A scheduled driver.
    Driver,
    /// A coverage limit.
    Limit,
    /// A deductible.
    Deductible,
    /// An effective date mention; folded into its policy at resolution.
    EffectiveDate,
    /// An expiration date mention; folded into its policy at resolution.
    ExpirationDate,
}

impl EntityType {
    /// Stable string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Policy => "policy",
            Self::Organization => "organization",
            Self::Coverage => "coverage",
            Self::Condition => "condition",
            Self::Exclusion => "exclusion",
            Self::Endorsement => "endorsement",
            Self::Location => "location",
            Self::Claim => "claim",
            Self::Definition => "definition",
            Self::Form => "form",
            Self::Vehicle => "vehicle",
            Self::Driver => "driver",
            Self::Limit => "limit",
            Self::Deductible => "deductible",
            Self::EffectiveDate => "effective_date",
            Self::ExpirationDate => "expiration_date",
        }
    }

    /// Whether mentions of this type stand alone as canonical entities.
    /// Date mentions are attributes of their policy, not entities.
    #[must_use]
    pub const fn is_canonicalizable(self) -> bool {
        !matches!(self, Self::EffectiveDate | Self::ExpirationDate)
    }

    /// Parses the stable string form.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "policy" => Some(Self::Policy),
            "organization" | "company" | "insured" | "carrier" => Some(Self::Organization),
            "coverage" => Some(Self::Coverage),
            "condition" => Some(Self::Condition),
            "exclusion" => Some(Self::Exclusion),
            "endorsement" => Some(Self::Endorsement),
            "location" => Some(Self::Location),
            "claim" => Some(Self::Claim),
            "definition" => Some(Self::Definition),
            "form" => Some(Self::Form),
            "vehicle" => Some(Self::Vehicle),
            "driver" => Some(Self::Driver),
            "limit" => Some(Self::Limit),
            "deductible" => Some(Self::Deductible),
            "effective_date" => Some(Self::EffectiveDate),
            "expiration_date" => Some(Self::ExpirationDate),
            _ => None,
        }
    }
}

/// Where a mention came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MentionSource {
    /// Produced by an LLM extractor.
    Llm,
    /// Produced by the deterministic regex parser.
    Deterministic,
}

/// One observation of an entity inside a chunk.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EntityMention {
    /// Entity kind.
    pub entity_type: EntityType,
    /// Text as it appeared.
    pub raw_value: String,
    /// Normalised value used for merge keys.
    pub normalized_value: String,
    /// Document-local slug identifier, when minted by a synthesis strategy.
    pub identifier: Option<String>,
    /// Extraction confidence in `[0, 1]`.
    pub confidence: f32,
    /// Byte span within the source text, when known.
    pub span: Option<(usize, usize)>,
    /// Source chunk, when known.
    pub chunk_id: Option<ChunkId>,
    /// Producing extractor class.
    pub source: MentionSource,
    /// Validated attributes.
    pub attributes: BTreeMap<String, Value>,
}

impl EntityMention {
    /// Creates a mention with empty attributes.
    #[must_use]
    pub fn new(
        entity_type: EntityType,
        raw_value: impl Into<String>,
        normalized_value: impl Into<String>,
        confidence: f32,
        source: MentionSource,
    ) -> Self {
        Self {
            entity_type,
            raw_value: raw_value.into(),
            normalized_value: normalized_value.into(),
            identifier: None,
            confidence,
            span: None,
            chunk_id: None,
            source,
            attributes: BTreeMap::new(),
        }
    }

    /// Key used for reconciliation and aggregation: type plus the
    /// case-folded, punctuation-stripped normalised value.
    #[must_use]
    pub fn merge_key(&self) -> (EntityType, String) {
        (
            self.entity_type,
            crate::text::normalize_key(&self.normalized_value),
        )
    }

    /// Attaches an attribute.
    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_key_folds_case_and_punctuation() {
        let a = EntityMention::new(
            EntityType::Organization,
            "ACME, LLC.",
            "ACME, LLC.",
            0.9,
            MentionSource::Llm,
        );
        let b = EntityMention::new(
            EntityType::Organization,
            "acme llc",
            "acme llc",
            0.7,
            MentionSource::Deterministic,
        );
        assert_eq!(a.merge_key(), b.merge_key());
    }

    #[test]
    fn date_mentions_are_not_canonicalizable() {
        assert!(!EntityType::EffectiveDate.is_canonicalizable());
        assert!(EntityType::Policy.is_canonicalizable());
    }
}
