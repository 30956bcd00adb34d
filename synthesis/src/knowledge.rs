//! Static knowledge base of standard ISO base-form provisions.
//!
//! When a base form is detected, these provisions seed the effective
//! coverages and exclusions without spending an LLM pass on boilerplate
//! every carrier prints identically.

use std::sync::LazyLock;

use bindery_core::{EffectiveCoverage, EffectiveExclusion, EffectiveState, Severity};
use regex::Regex;

use crate::taxonomy::{coverage_category, generate_canonical_id};

/// One standard provision of a known form.
#[derive(Clone, Debug)]
pub struct StandardProvision {
    /// Provision number (e.g. "B.1", "II.A").
    pub provision_number: &'static str,
    /// Provision name.
    pub provision_name: &'static str,
    /// What the provision does.
    pub description: &'static str,
    /// Form section.
    pub form_section: &'static str,
}

/// Provisions of one known form.
#[derive(Clone, Debug)]
pub struct FormEntry {
    /// Form identifier (e.g. "CA 00 01").
    pub form_id: &'static str,
    /// Form name.
    pub form_name: &'static str,
    /// Standard coverages.
    pub coverages: &'static [StandardProvision],
    /// Standard exclusions.
    pub exclusions: &'static [StandardProvision],
    /// Standard conditions.
    pub conditions: &'static [StandardProvision],
}

const CA_00_01_COVERAGES: &[StandardProvision] = &[
    StandardProvision {
        provision_number: "II.A",
        provision_name: "Covered Autos Liability Coverage",
        description: "Pays all sums the insured legally must pay as damages because of bodily \
                      injury or property damage caused by an accident resulting from ownership, \
                      maintenance, or use of a covered auto.",
        form_section: "SECTION II - COVERED AUTOS LIABILITY COVERAGE",
    },
    StandardProvision {
        provision_number: "III.A",
        provision_name: "Physical Damage Coverage - Comprehensive",
        description: "Covers loss to a covered auto or its equipment from any cause except \
                      collision or overturn.",
        form_section: "SECTION III - PHYSICAL DAMAGE COVERAGE",
    },
    StandardProvision {
        provision_number: "III.B",
        provision_name: "Physical Damage Coverage - Collision",
        description: "Covers loss to a covered auto or its equipment caused by collision with \
                      another object or by overturn.",
        form_section: "SECTION III - PHYSICAL DAMAGE COVERAGE",
    },
    StandardProvision {
        provision_number: "III.C",
        provision_name: "Physical Damage Coverage - Specified Causes of Loss",
        description: "Covers loss from fire, lightning, explosion, theft, windstorm, hail, \
                      earthquake, flood, mischief, vandalism, or sinking of a vessel.",
        form_section: "SECTION III - PHYSICAL DAMAGE COVERAGE",
    },
    StandardProvision {
        provision_number: "III.D",
        provision_name: "Towing",
        description: "Covers towing and labor costs incurred each time a covered auto is \
                      disabled, subject to the specified limit.",
        form_section: "SECTION III - PHYSICAL DAMAGE COVERAGE",
    },
];

const CA_00_01_EXCLUSIONS: &[StandardProvision] = &[
    StandardProvision {
        provision_number: "B.1",
        provision_name: "Expected Or Intended Injury",
        description: "No coverage for bodily injury or property damage expected or intended \
                      from the standpoint of the insured.",
        form_section: "SECTION II - LIABILITY COVERAGE",
    },
    StandardProvision {
        provision_number: "B.2",
        provision_name: "Contractual Liability",
        description: "No coverage for liability assumed under any contract or agreement, \
                      except an insured contract.",
        form_section: "SECTION II - LIABILITY COVERAGE",
    },
    StandardProvision {
        provision_number: "B.3",
        provision_name: "Workers Compensation",
        description: "No coverage for any obligation under a workers compensation, disability \
                      benefits, or unemployment compensation law.",
        form_section: "SECTION II - LIABILITY COVERAGE",
    },
    StandardProvision {
        provision_number: "B.5",
        provision_name: "Fellow Employee",
        description: "No coverage for bodily injury to a fellow employee of the insured \
                      arising out of employment.",
        form_section: "SECTION II - LIABILITY COVERAGE",
    },
    StandardProvision {
        provision_number: "B.6",
        provision_name: "Care Custody Or Control",
        description: "No coverage for property damage to property owned by, transported by, or \
                      in the care, custody, or control of the insured.",
        form_section: "SECTION II - LIABILITY COVERAGE",
    },
    StandardProvision {
        provision_number: "B.12",
        provision_name: "War",
        description: "No coverage for bodily injury or property damage arising from war, \
                      insurrection, rebellion, or revolution.",
        form_section: "SECTION II - LIABILITY COVERAGE",
    },
    StandardProvision {
        provision_number: "B.13",
        provision_name: "Racing",
        description: "No coverage for covered autos while used in any professional or organized \
                      racing or demolition contest.",
        form_section: "SECTION II - LIABILITY COVERAGE",
    },
];

const CA_00_01_CONDITIONS: &[StandardProvision] = &[
    StandardProvision {
        provision_number: "IV.A",
        provision_name: "Loss Conditions",
        description: "Appraisal, duties after accident or loss, legal action requirements, \
                      loss payment provisions, and transfer of rights.",
        form_section: "SECTION IV - CONDITIONS",
    },
    StandardProvision {
        provision_number: "IV.B",
        provision_name: "General Conditions",
        description: "Bankruptcy, concealment or fraud, liberalization, other insurance, \
                      premium audit, policy period and coverage territory.",
        form_section: "SECTION IV - CONDITIONS",
    },
];

const FORMS: &[FormEntry] = &[FormEntry {
    form_id: "CA 00 01",
    form_name: "Business Auto Coverage Form",
    coverages: CA_00_01_COVERAGES,
    exclusions: CA_00_01_EXCLUSIONS,
    conditions: CA_00_01_CONDITIONS,
}];

static FORM_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b([A-Z]{2})\s?([0-9T][0-9])\s?(\d{2})\b").unwrap_or_else(|_| unreachable!())
});

/// Lookup into the static form knowledge base.
#[derive(Debug, Clone, Default)]
pub struct BaseFormKnowledgeBase;

impl BaseFormKnowledgeBase {
    /// Creates the knowledge base.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// The entry for a form id, when known. Matching is
    /// whitespace-insensitive.
    #[must_use]
    pub fn form(&self, form_id: &str) -> Option<&'static FormEntry> {
        let wanted = form_id.replace(' ', "");
        FORMS.iter().find(|f| f.form_id.replace(' ', "") == wanted)
    }

    /// All ISO form references detected in the text, normalised to the
    /// spaced spelling.
    #[must_use]
    pub fn detect_form_ids(&self, text: &str) -> Vec<String> {
        let mut out: Vec<String> = FORM_ID_RE
            .captures_iter(text)
            .map(|c| format!("{} {} {}", &c[1], &c[2], &c[3]))
            .collect();
        out.sort();
        out.dedup();
        out
    }

    /// Seeds effective provisions from a known form: every standard
    /// coverage as `Covered`, every standard exclusion as `Excluded`.
    #[must_use]
    pub fn seed_effective(
        &self,
        form_id: &str,
    ) -> Option<(Vec<EffectiveCoverage>, Vec<EffectiveExclusion>)> {
        let form = self.form(form_id)?;

        let coverages = form
            .coverages
            .iter()
            .map(|p| EffectiveCoverage {
                canonical_id: generate_canonical_id(
                    p.provision_name,
                    false,
                    coverage_category(p.provision_name),
                ),
                name: p.provision_name.to_owned(),
                effective_state: EffectiveState::Covered,
                scope: Some(p.description.to_owned()),
                conditions: Vec::new(),
                impacted_coverages: Vec::new(),
                sources: vec![form.form_id.to_owned()],
                confidence: 0.9,
                severity: None,
                description: Some(p.description.to_owned()),
                page_numbers: Vec::new(),
                source_text: None,
                clause_reference: Some(format!("{}, {}", p.form_section, p.provision_number)),
                is_standard_provision: true,
                is_modified: false,
            })
            .collect();

        let exclusions = form
            .exclusions
            .iter()
            .map(|p| EffectiveExclusion {
                canonical_id: generate_canonical_id(
                    p.provision_name,
                    true,
                    coverage_category(p.provision_name),
                ),
                name: p.provision_name.to_owned(),
                effective_state: EffectiveState::Excluded,
                scope: Some(p.description.to_owned()),
                carve_backs: Vec::new(),
                conditions: Vec::new(),
                impacted_coverages: Vec::new(),
                sources: vec![form.form_id.to_owned()],
                confidence: 0.9,
                severity: Some(Severity::Material),
                description: Some(p.description.to_owned()),
                page_numbers: Vec::new(),
                source_text: None,
                clause_reference: Some(format!("{}, {}", p.form_section, p.provision_number)),
                is_standard_provision: true,
                is_modified: false,
            })
            .collect();

        Some((coverages, exclusions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ca_00_01_is_known() {
        let kb = BaseFormKnowledgeBase::new();
        assert!(kb.form("CA 00 01").is_some());
        assert!(kb.form("CA0001").is_some());
        assert!(kb.form("XX 99 99").is_none());
    }

    #[test]
    fn form_ids_are_detected_in_text() {
        let kb = BaseFormKnowledgeBase::new();
        let ids = kb.detect_form_ids("Forms attached: CA 00 01, CA T3 53 and CG 20 10.");
        assert_eq!(ids, vec!["CA 00 01", "CA T3 53", "CG 20 10"]);
    }

    #[test]
    fn seeding_yields_standard_provisions_with_citations() {
        let kb = BaseFormKnowledgeBase::new();
        let (coverages, exclusions) = kb.seed_effective("CA 00 01").unwrap();
        assert!(!coverages.is_empty());
        assert!(exclusions.len() >= 5);
        for exclusion in &exclusions {
            assert!(exclusion.is_standard_provision);
            assert_eq!(exclusion.sources, vec!["CA 00 01".to_owned()]);
            assert!(exclusion.clause_reference.is_some());
        }
        let liability = coverages
            .iter()
            .find(|c| c.name.contains("Liability"))
            .unwrap();
        assert_eq!(liability.canonical_id, "CA_LIABILITY");
    }
}
