//! Synthesis input and output shapes.

use bindery_core::{EffectiveCoverage, EffectiveExclusion, SynthesisMethod};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One provision-level modification from an endorsement projection.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Modification {
    /// Coverage the modification impacts.
    pub impacted_coverage: Option<String>,
    /// Exclusion the modification impacts.
    pub impacted_exclusion: Option<String>,
    /// Effect category from the projection extractor.
    pub effect_category: Option<String>,
    /// Free-text effect.
    pub effect: Option<String>,
    /// Scope or limit change.
    #[serde(alias = "exclusion_scope", alias = "coverage_scope")]
    pub scope: Option<String>,
    /// Conditions attached to the modification.
    pub exception_conditions: Option<String>,
    /// Verbatim endorsement language.
    pub verbatim_language: Option<String>,
    /// Severity of the modification.
    pub severity: Option<String>,
    /// Pages the modification appears on.
    pub page_numbers: Vec<u32>,
    /// Verbatim source text.
    pub source_text: Option<String>,
    /// Endorsement reference, filled in during grouping.
    #[serde(skip)]
    pub source: String,
    /// Endorsement name, kept for fallback naming.
    #[serde(skip)]
    pub endorsement_name: Option<String>,
}

/// One endorsement record from the endorsements section.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EndorsementRecord {
    /// Endorsement name.
    #[serde(alias = "name")]
    pub endorsement_name: Option<String>,
    /// Endorsement form number.
    #[serde(alias = "form_number")]
    pub endorsement_number: Option<String>,
    /// Endorsement type: Add, Modify, Restrict, or Delete.
    pub endorsement_type: Option<String>,
    /// Coverage the endorsement impacts.
    pub impacted_coverage: Option<String>,
    /// Materiality: high, medium, or low.
    pub materiality: Option<String>,
    /// Pages the endorsement appears on.
    pub page_numbers: Vec<u32>,
    /// Verbatim source text.
    pub source_text: Option<String>,
    /// Provision projections, when the projection extractor ran.
    pub modifications: Vec<Modification>,
}

impl EndorsementRecord {
    /// Reference used in `sources` lists: form number first, name second.
    #[must_use]
    pub fn reference(&self) -> String {
        self.endorsement_number
            .clone()
            .or_else(|| self.endorsement_name.clone())
            .unwrap_or_else(|| "Unknown".to_owned())
    }
}

/// The endorsements-section payload, as persisted in `extracted_data`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EndorsementsData {
    /// Endorsement records.
    pub endorsements: Vec<EndorsementRecord>,
}

impl EndorsementsData {
    /// Parses the section's `extracted_data` value; tolerates absence.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        serde_json::from_value(value.clone()).unwrap_or_default()
    }

    /// Whether any endorsement carries provision projections.
    #[must_use]
    pub fn has_projections(&self) -> bool {
        self.endorsements.iter().any(|e| !e.modifications.is_empty())
    }
}

/// The merged synthesis output.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SynthesisOutcome {
    /// Effective coverages, provision-centric.
    pub effective_coverages: Vec<EffectiveCoverage>,
    /// Effective exclusions, provision-centric.
    pub effective_exclusions: Vec<EffectiveExclusion>,
    /// Mean confidence across produced provisions.
    pub overall_confidence: f32,
    /// How the outcome was produced.
    pub synthesis_method: SynthesisMethod,
    /// Distinct endorsements contributing.
    pub source_endorsement_count: usize,
    /// Whether confidence fell below the product threshold.
    pub fallback_recommended: bool,
    /// Whether LLM inference actually ran and contributed.
    pub fallback_used: bool,
}

impl Default for SynthesisOutcome {
    fn default() -> Self {
        Self {
            effective_coverages: Vec::new(),
            effective_exclusions: Vec::new(),
            overall_confidence: 0.0,
            synthesis_method: SynthesisMethod::EndorsementOnly,
            source_endorsement_count: 0,
            fallback_recommended: false,
            fallback_used: false,
        }
    }
}

/// Shared confidence ladder for synthesised provisions: base 0.7, boosted
/// for detail, severity, and complete categorisation, capped at 0.98.
#[must_use]
pub fn modification_confidence(modifications: &[Modification]) -> f32 {
    if modifications.is_empty() {
        return 0.0;
    }
    let mut confidence = 0.7f32;
    if modifications
        .iter()
        .any(|m| m.scope.is_some() || m.verbatim_language.is_some())
    {
        confidence += 0.1;
    }
    if modifications.iter().any(|m| m.severity.is_some()) {
        confidence += 0.05;
    }
    if modifications.iter().all(|m| m.effect_category.is_some()) {
        confidence += 0.1;
    }
    confidence.min(0.98)
}

/// Union of page numbers across modifications, sorted and deduplicated.
#[must_use]
pub fn union_page_numbers(modifications: &[Modification]) -> Vec<u32> {
    let mut pages: Vec<u32> = modifications
        .iter()
        .flat_map(|m| m.page_numbers.iter().copied())
        .collect();
    pages.sort_unstable();
    pages.dedup();
    pages
}

/// First non-empty source text: `source_text`, then `verbatim_language`,
/// then `scope`.
#[must_use]
pub fn first_source_text(modifications: &[Modification]) -> Option<String> {
    modifications
        .iter()
        .find_map(|m| {
            m.source_text
                .clone()
                .or_else(|| m.verbatim_language.clone())
                .or_else(|| m.scope.clone())
        })
        .filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn confidence_ladder_caps_at_098() {
        let mods = vec![Modification {
            scope: Some("all scheduled autos".into()),
            verbatim_language: Some("verbatim".into()),
            severity: Some("Major".into()),
            effect_category: Some("expands_coverage".into()),
            ..Modification::default()
        }];
        let confidence = modification_confidence(&mods);
        assert!((confidence - 0.95).abs() < 1e-6);

        let many: Vec<Modification> = (0..5).map(|_| mods[0].clone()).collect();
        assert!(modification_confidence(&many) <= 0.98);
    }

    #[test]
    fn partially_categorised_mods_lose_the_category_boost() {
        let mods = vec![
            Modification {
                effect_category: Some("narrows_exclusion".into()),
                ..Modification::default()
            },
            Modification::default(),
        ];
        assert!((modification_confidence(&mods) - 0.7).abs() < 1e-6);
    }

    #[test]
    fn projection_detection_reads_modifications() {
        let with = EndorsementsData::from_value(&json!({
            "endorsements": [{"endorsement_number": "CA T3 53",
                              "modifications": [{"impacted_coverage": "Auto Liability"}]}]
        }));
        assert!(with.has_projections());

        let without = EndorsementsData::from_value(&json!({
            "endorsements": [{"endorsement_number": "CA T3 53"}]
        }));
        assert!(!without.has_projections());
    }

    #[test]
    fn page_union_sorts_and_dedups() {
        let mods = vec![
            Modification { page_numbers: vec![4, 2], ..Modification::default() },
            Modification { page_numbers: vec![2, 7], ..Modification::default() },
        ];
        assert_eq!(union_page_numbers(&mods), vec![2, 4, 7]);
    }
}
