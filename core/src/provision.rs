//! Effective coverages and exclusions: the provision-centric view after
//! applying endorsement modifications to a base form.

use serde::{Deserialize, Serialize};

/// Effective state of a provision after all modifications are applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectiveState {
    /// Base provision in force, unmodified.
    Covered,
    /// Coverage added by endorsement.
    Added,
    /// Coverage broadened by endorsement.
    ExpandedCoverage,
    /// Coverage narrowed by endorsement.
    Limited,
    /// Exclusion in force.
    Excluded,
    /// Exclusion narrowed; carve-backs restore part of the coverage.
    PartiallyExcluded,
    /// Provision removed entirely by endorsement.
    Removed,
}

impl EffectiveState {
    /// Display string used in rows and product output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Covered => "Covered",
            Self::Added => "Added",
            Self::ExpandedCoverage => "Expanded Coverage",
            Self::Limited => "Limited",
            Self::Excluded => "Excluded",
            Self::PartiallyExcluded => "Partially Excluded",
            Self::Removed => "Removed",
        }
    }
}

/// Severity of a provision's impact, highest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    /// Critical impact on coverage.
    Critical,
    /// Major impact.
    Major,
    /// Material impact.
    Material,
    /// Minor impact.
    Minor,
    /// Administrative only.
    Administrative,
}

impl Severity {
    /// Numeric rank, higher is more severe.
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Critical => 5,
            Self::Major => 4,
            Self::Material => 3,
            Self::Minor => 2,
            Self::Administrative => 1,
        }
    }

    /// Parses common severity spellings.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "critical" | "high" => Some(Self::Critical),
            "major" | "medium" => Some(Self::Major),
            "material" => Some(Self::Material),
            "minor" | "low" => Some(Self::Minor),
            "administrative" => Some(Self::Administrative),
            _ => None,
        }
    }
}

/// How a synthesis result was produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SynthesisMethod {
    /// Built from endorsement modifications only.
    EndorsementOnly,
    /// Base provisions converted directly (no endorsements present).
    BaseCoverageMerge,
    /// Supplemented by LLM inference over detected form references.
    LlmInference,
}

impl SynthesisMethod {
    /// Stable string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EndorsementOnly => "endorsement_only",
            Self::BaseCoverageMerge => "base_coverage_merge",
            Self::LlmInference => "llm_inference",
        }
    }
}

/// An effective coverage: one provision with all endorsement effects
/// applied, plus citation provenance. Immutable within a run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EffectiveCoverage {
    /// Taxonomy canonical id, or a slug when no taxonomy entry matches.
    pub canonical_id: String,
    /// Coverage name.
    pub name: String,
    /// Effective state.
    pub effective_state: EffectiveState,
    /// Scope or limit description.
    pub scope: Option<String>,
    /// Conditions attached by modifications.
    pub conditions: Vec<String>,
    /// Coverages impacted alongside this one.
    pub impacted_coverages: Vec<String>,
    /// Endorsement references or base-form markers. Never empty.
    pub sources: Vec<String>,
    /// Synthesis confidence in `[0, 1]`.
    pub confidence: f32,
    /// Severity of the modification, when known.
    pub severity: Option<Severity>,
    /// Human-readable description.
    pub description: Option<String>,
    /// Union of source page numbers.
    pub page_numbers: Vec<u32>,
    /// First non-empty verbatim source text.
    pub source_text: Option<String>,
    /// Clause reference (form section + provision number), when known.
    pub clause_reference: Option<String>,
    /// Whether this is an unmodified standard provision.
    pub is_standard_provision: bool,
    /// Whether any endorsement modified this provision.
    pub is_modified: bool,
}

/// An effective exclusion, mirror of [`EffectiveCoverage`] with
/// carve-backs tracked explicitly.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EffectiveExclusion {
    /// Taxonomy canonical id, or a slug when no taxonomy entry matches.
    pub canonical_id: String,
    /// Exclusion name.
    pub name: String,
    /// Effective state.
    pub effective_state: EffectiveState,
    /// Scope description.
    pub scope: Option<String>,
    /// Exceptions that restore coverage.
    pub carve_backs: Vec<String>,
    /// Conditions attached by modifications.
    pub conditions: Vec<String>,
    /// Coverages this exclusion impacts.
    pub impacted_coverages: Vec<String>,
    /// Endorsement references or base-form markers. Never empty.
    pub sources: Vec<String>,
    /// Synthesis confidence in `[0, 1]`.
    pub confidence: f32,
    /// Severity, when known.
    pub severity: Option<Severity>,
    /// Human-readable description.
    pub description: Option<String>,
    /// Union of source page numbers.
    pub page_numbers: Vec<u32>,
    /// First non-empty verbatim source text.
    pub source_text: Option<String>,
    /// Clause reference, when known.
    pub clause_reference: Option<String>,
    /// Whether this is an unmodified standard provision.
    pub is_standard_provision: bool,
    /// Whether any endorsement modified this provision.
    pub is_modified: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ranks_descend() {
        assert!(Severity::Critical.rank() > Severity::Major.rank());
        assert!(Severity::Minor.rank() > Severity::Administrative.rank());
    }

    #[test]
    fn severity_parses_materiality_spellings() {
        assert_eq!(Severity::parse("High"), Some(Severity::Critical));
        assert_eq!(Severity::parse("medium"), Some(Severity::Major));
        assert_eq!(Severity::parse("low"), Some(Severity::Minor));
    }

    #[test]
    fn state_display_matches_product_output() {
        assert_eq!(EffectiveState::ExpandedCoverage.as_str(), "Expanded Coverage");
        assert_eq!(EffectiveState::PartiallyExcluded.as_str(), "Partially Excluded");
    }
}
