//! Effective-exclusion synthesis.

use std::collections::BTreeMap;

use bindery_core::{EffectiveExclusion, EffectiveState, Severity, SynthesisMethod};
use serde_json::Value;
use tracing::info;

use crate::taxonomy::{coverage_category, generate_canonical_id, CoverageCategory};
use crate::types::{
    first_source_text, modification_confidence, union_page_numbers, EndorsementsData, Modification,
    SynthesisOutcome,
};

/// Primary keywords that strongly indicate exclusion modifications.
const PRIMARY_EXCLUSION_KEYWORDS: &[&str] = &[
    "waiver",
    "subrogation",
    "exclusion",
    "limitation",
    "restriction",
    "carve",
    "delete",
    "remove",
    "narrow",
    "transfer of rights",
    "recovery against others",
];

/// Secondary keywords that may indicate exclusion modifications.
const SECONDARY_EXCLUSION_KEYWORDS: &[&str] = &[
    "except",
    "unless",
    "provided that",
    "subject to",
    "does not apply",
    "not covered",
    "prohibited",
    "void",
    "suspended",
    "limited to",
];

/// Double-negative phrases that carve an exclusion back.
const NARROWING_PATTERNS: &[&str] = &[
    "does not apply to",
    "shall not apply",
    "exclusion does not apply",
    "not applicable to",
    "is not excluded",
    "exception to exclusion",
];

/// Synthesises effective exclusions from endorsement modifications, with
/// basic endorsement records as a fallback when projections are absent and
/// base-section exclusions converted 1:1 when no endorsements exist.
#[derive(Debug, Clone, Default)]
pub struct ExclusionSynthesizer;

impl ExclusionSynthesizer {
    /// Creates a synthesizer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Runs exclusion synthesis.
    #[must_use]
    pub fn synthesize(
        &self,
        projections: Option<&EndorsementsData>,
        basic: Option<&EndorsementsData>,
        base_exclusions: Option<&[Value]>,
    ) -> SynthesisOutcome {
        let mut groups: BTreeMap<String, Vec<Modification>> = BTreeMap::new();
        let mut sources: BTreeMap<String, Vec<String>> = BTreeMap::new();

        if let Some(data) = projections {
            collect_projected(data, &mut groups, &mut sources);
        } else if let Some(data) = basic {
            collect_from_basic(data, &mut groups, &mut sources);
        }

        let has_endorsements = projections.is_some() || basic.is_some();

        let (effective_exclusions, synthesis_method) = if !groups.is_empty() {
            (
                build_effective(&groups, &sources),
                SynthesisMethod::EndorsementOnly,
            )
        } else if let Some(base) = base_exclusions.filter(|b| !b.is_empty()) {
            info!(
                count = base.len(),
                "no endorsements; converting base exclusions to effective exclusions"
            );
            (convert_base(base), SynthesisMethod::BaseCoverageMerge)
        } else {
            (Vec::new(), SynthesisMethod::EndorsementOnly)
        };

        let overall_confidence = if effective_exclusions.is_empty() {
            0.0
        } else {
            effective_exclusions.iter().map(|e| e.confidence).sum::<f32>()
                / effective_exclusions.len() as f32
        };

        let mut distinct_sources: Vec<&String> = sources.values().flatten().collect();
        distinct_sources.sort();
        distinct_sources.dedup();

        SynthesisOutcome {
            effective_coverages: Vec::new(),
            effective_exclusions,
            overall_confidence,
            synthesis_method,
            source_endorsement_count: if has_endorsements { distinct_sources.len() } else { 0 },
            fallback_recommended: false,
            fallback_used: false,
        }
    }
}

fn normalize_name(name: &str) -> String {
    // Title-case for stable grouping keys and display.
    name.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            chars.next().map_or_else(String::new, |first| {
                first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
            })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn collect_projected(
    data: &EndorsementsData,
    groups: &mut BTreeMap<String, Vec<Modification>>,
    sources: &mut BTreeMap<String, Vec<String>>,
) {
    for endorsement in &data.endorsements {
        let reference = endorsement.reference();
        for modification in &endorsement.modifications {
            let Some(impacted) = modification.impacted_exclusion.as_deref() else {
                continue;
            };
            let key = normalize_name(impacted);
            let mut owned = modification.clone();
            owned.source = reference.clone();
            owned.endorsement_name = endorsement.endorsement_name.clone();
            groups.entry(key.clone()).or_default().push(owned);
            let refs = sources.entry(key).or_default();
            if !refs.contains(&reference) {
                refs.push(reference.clone());
            }
        }
    }
}

/// Basic endorsement records carry no projections; exclusion effects are
/// inferred from names and types.
fn collect_from_basic(
    data: &EndorsementsData,
    groups: &mut BTreeMap<String, Vec<Modification>>,
    sources: &mut BTreeMap<String, Vec<String>>,
) {
    for endorsement in &data.endorsements {
        let name = endorsement.endorsement_name.clone().unwrap_or_default();
        let name_lower = name.to_lowercase();
        let endorsement_type = endorsement.endorsement_type.as_deref().unwrap_or("");

        let has_primary = PRIMARY_EXCLUSION_KEYWORDS.iter().any(|kw| name_lower.contains(kw));
        let has_secondary = SECONDARY_EXCLUSION_KEYWORDS.iter().any(|kw| name_lower.contains(kw));
        let is_restrictive = matches!(endorsement_type, "Restrict" | "Delete");
        let has_narrowing = NARROWING_PATTERNS.iter().any(|p| name_lower.contains(p));

        let is_exclusion_related = has_primary
            || is_restrictive
            || (has_secondary && matches!(endorsement_type, "Modify" | "Restrict"));
        if !is_exclusion_related {
            continue;
        }

        let effect_category = infer_effect_category(endorsement_type, &name_lower, has_narrowing);
        let severity = infer_severity(endorsement.materiality.as_deref(), endorsement_type, &name_lower);
        let exclusion_name =
            generate_exclusion_name(&name, endorsement.impacted_coverage.as_deref());
        let key = normalize_name(&exclusion_name);
        let reference = endorsement.reference();

        groups.entry(key.clone()).or_default().push(Modification {
            impacted_coverage: endorsement.impacted_coverage.clone(),
            impacted_exclusion: Some(exclusion_name),
            effect_category: Some(effect_category.to_owned()),
            effect: endorsement.endorsement_type.clone(),
            scope: None,
            exception_conditions: condition_hint(&name_lower),
            verbatim_language: None,
            severity: Some(severity.to_owned()),
            page_numbers: endorsement.page_numbers.clone(),
            source_text: endorsement.source_text.clone(),
            source: reference.clone(),
            endorsement_name: endorsement.endorsement_name.clone(),
        });
        let refs = sources.entry(key).or_default();
        if !refs.contains(&reference) {
            refs.push(reference);
        }
    }
}

fn infer_effect_category(
    endorsement_type: &str,
    name_lower: &str,
    has_narrowing: bool,
) -> &'static str {
    if has_narrowing
        || name_lower.contains("waiver")
        || name_lower.contains("transfer of rights")
        || name_lower.contains("recovery against others")
        || name_lower.contains("carve")
        || name_lower.contains("except")
        || name_lower.contains("does not apply")
        || name_lower.contains("shall not apply")
    {
        return "narrows_exclusion";
    }
    if name_lower.contains("not excluded")
        || name_lower.contains("is covered")
        || endorsement_type == "Delete"
        || name_lower.contains("delete")
        || name_lower.contains("remove")
    {
        return "removes_exclusion";
    }
    if name_lower.contains("extension") && endorsement_type == "Add" {
        return "narrows_exclusion";
    }
    "introduces_exclusion"
}

fn infer_severity(
    materiality: Option<&str>,
    endorsement_type: &str,
    name_lower: &str,
) -> &'static str {
    if let Some(materiality) = materiality {
        match materiality.to_lowercase().as_str() {
            "high" | "critical" => return "Critical",
            "medium" => return "Major",
            "low" => return "Minor",
            _ => {}
        }
    }
    if matches!(endorsement_type, "Restrict" | "Delete") {
        if ["liability", "bodily injury", "property damage"]
            .iter()
            .any(|term| name_lower.contains(term))
        {
            return "Critical";
        }
        return "Major";
    }
    "Material"
}

fn condition_hint(name_lower: &str) -> Option<String> {
    let patterns = [
        ("required by contract", "When required by written contract"),
        ("written contract", "Subject to written contract requirement"),
        ("scheduled", "For scheduled parties only"),
        ("blanket", "Blanket coverage for all qualifying parties"),
        ("designated", "For designated parties only"),
        ("per project", "Applied on a per-project basis"),
        ("per location", "Applied on a per-location basis"),
    ];
    patterns
        .iter()
        .find(|(pattern, _)| name_lower.contains(pattern))
        .map(|(_, description)| (*description).to_owned())
}

/// Maps endorsement naming patterns to standard exclusion names.
fn generate_exclusion_name(endorsement_name: &str, impacted_coverage: Option<&str>) -> String {
    let name_lower = endorsement_name.to_lowercase();
    let patterns: &[(&[&str], &str)] = &[
        (&["waiver", "subrogation"], "Waiver of Subrogation"),
        (
            &["transfer of rights"],
            "Transfer of Rights of Recovery Against Others",
        ),
        (
            &["recovery against others"],
            "Transfer of Rights of Recovery Against Others",
        ),
        (&["additional insured", "blanket"], "Additional Insured Coverage"),
        (
            &["additional insured", "primary"],
            "Additional Insured - Primary & Non-Contributory",
        ),
        (&["notice of cancellation"], "Notice of Cancellation"),
        (&["hired auto"], "Hired Auto Coverage"),
        (&["non-owned auto"], "Non-Owned Auto Coverage"),
    ];

    for (needles, standard) in patterns {
        if needles.iter().all(|needle| name_lower.contains(needle)) {
            return impacted_coverage.map_or_else(
                || (*standard).to_owned(),
                |coverage| format!("{standard} - {coverage}"),
            );
        }
    }

    if name_lower.contains("exclusion") {
        return endorsement_name.to_owned();
    }
    if name_lower.contains("waiver") {
        let clean = endorsement_name.replace("ENDORSEMENT", "").trim().to_owned();
        return impacted_coverage
            .map_or(clean.clone(), |coverage| format!("{clean} - {coverage}"));
    }
    impacted_coverage.map_or_else(
        || endorsement_name.to_owned(),
        |coverage| format!("{coverage} - {endorsement_name}"),
    )
}

/// Effective state by priority: removal beats narrowing beats introduction.
fn determine_state(modifications: &[Modification]) -> EffectiveState {
    let category = |needle: &str| {
        modifications
            .iter()
            .any(|m| m.effect_category.as_deref() == Some(needle))
    };
    if category("removes_exclusion") {
        EffectiveState::Removed
    } else if category("narrows_exclusion") {
        EffectiveState::PartiallyExcluded
    } else {
        EffectiveState::Excluded
    }
}

fn max_severity(modifications: &[Modification]) -> Option<Severity> {
    modifications
        .iter()
        .filter_map(|m| m.severity.as_deref().and_then(Severity::parse))
        .max_by_key(|s| s.rank())
}

fn build_effective(
    groups: &BTreeMap<String, Vec<Modification>>,
    sources: &BTreeMap<String, Vec<String>>,
) -> Vec<EffectiveExclusion> {
    let mut out = Vec::new();

    for (name, modifications) in groups {
        if modifications.is_empty() {
            continue;
        }
        let state = determine_state(modifications);

        let mut carve_backs: Vec<String> = Vec::new();
        let mut conditions: Vec<String> = Vec::new();
        let mut impacted: Vec<String> = Vec::new();
        for modification in modifications {
            let narrowing = modification.effect_category.as_deref() == Some("narrows_exclusion");
            if narrowing {
                if let Some(exception) = &modification.exception_conditions {
                    carve_backs.push(exception.clone());
                } else if let Some(endorsement_name) = &modification.endorsement_name {
                    if let Some(description) = carve_back_description(
                        endorsement_name,
                        modification.impacted_coverage.as_deref(),
                    ) {
                        carve_backs.push(description);
                    }
                }
            } else if let Some(exception) = &modification.exception_conditions {
                conditions.push(exception.clone());
            }
            if let Some(coverage) = &modification.impacted_coverage {
                if !impacted.contains(coverage) {
                    impacted.push(coverage.clone());
                }
            }
        }
        carve_backs.dedup();
        conditions.dedup();

        // A narrowed exclusion always names what it restores; the
        // endorsement itself is the carve-back when nothing more specific
        // was extracted.
        if state == EffectiveState::PartiallyExcluded && carve_backs.is_empty() {
            let source = modifications
                .first()
                .map(|m| m.source.clone())
                .unwrap_or_default();
            carve_backs.push(format!("Coverage restored per {source}"));
        }

        let confidence = modification_confidence(modifications);
        let scope = modifications.iter().find_map(|m| m.scope.clone());
        let category = impacted
            .first()
            .map_or(CoverageCategory::Unknown, |c| coverage_category(c));

        out.push(EffectiveExclusion {
            canonical_id: generate_canonical_id(name, true, category),
            name: name.clone(),
            effective_state: state,
            scope,
            carve_backs,
            conditions,
            impacted_coverages: impacted,
            sources: sources.get(name).cloned().unwrap_or_default(),
            confidence,
            severity: max_severity(modifications),
            description: Some(describe(name, state, modifications)),
            page_numbers: union_page_numbers(modifications),
            source_text: first_source_text(modifications),
            clause_reference: None,
            is_standard_provision: false,
            is_modified: true,
        });
    }

    out
}

fn carve_back_description(endorsement_name: &str, impacted_coverage: Option<&str>) -> Option<String> {
    let name_lower = endorsement_name.to_lowercase();
    if name_lower.contains("waiver") && name_lower.contains("subrogation") {
        return Some(impacted_coverage.map_or_else(
            || "Waiver of subrogation rights when required by written contract".to_owned(),
            |coverage| {
                format!("Waiver of subrogation rights for {coverage} when required by written contract")
            },
        ));
    }
    if name_lower.contains("transfer of rights") {
        return Some("Transfer of recovery rights waived for designated parties".to_owned());
    }
    if name_lower.contains("additional insured") {
        if name_lower.contains("blanket") {
            return Some(
                "Blanket additional insured status for parties required by written contract"
                    .to_owned(),
            );
        }
        return Some("Additional insured status granted per endorsement terms".to_owned());
    }
    if name_lower.contains("hired auto") {
        return Some("Coverage extended to hired autos per endorsement terms".to_owned());
    }
    None
}

fn describe(name: &str, state: EffectiveState, modifications: &[Modification]) -> String {
    if let Some(verbatim) = modifications.iter().find_map(|m| m.verbatim_language.clone()) {
        return verbatim.chars().take(500).collect();
    }
    match state {
        EffectiveState::Removed => format!("{name} has been removed by endorsement."),
        EffectiveState::PartiallyExcluded => {
            let source = modifications
                .iter()
                .find(|m| m.effect_category.as_deref() == Some("narrows_exclusion"))
                .map_or_else(|| "endorsement".to_owned(), |m| m.source.clone());
            format!("{name} has been narrowed by {source}, with exceptions that restore coverage.")
        }
        _ => format!("{name} applies as modified by endorsements."),
    }
}

/// Converts base-section exclusions 1:1 when no endorsements exist.
fn convert_base(base_exclusions: &[Value]) -> Vec<EffectiveExclusion> {
    let mut out = Vec::new();
    for exclusion in base_exclusions {
        let Some(object) = exclusion.as_object() else {
            continue;
        };
        let field = |names: &[&str]| -> Option<String> {
            names.iter().find_map(|n| {
                object
                    .get(*n)
                    .and_then(Value::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_owned)
            })
        };

        let Some(name) = field(&["name", "exclusion_name", "provision_name"]) else {
            continue;
        };
        let impacted: Vec<String> = field(&["impacted_coverage"]).into_iter().collect();
        let category = impacted
            .first()
            .map_or(CoverageCategory::Unknown, |c| coverage_category(c));

        let page_numbers: Vec<u32> = object
            .get("page_numbers")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_u64)
                    .map(|p| p as u32)
                    .collect()
            })
            .unwrap_or_default();

        let provision_number = field(&["provision_number", "reference", "exclusion_number"]);
        let form_section = field(&["form_section"]);
        let clause_reference = match (&form_section, &provision_number) {
            (Some(section), Some(number)) => Some(format!("{section}, {number}")),
            (Some(section), None) => Some(section.clone()),
            (None, Some(number)) => Some(number.clone()),
            (None, None) => None,
        };

        out.push(EffectiveExclusion {
            canonical_id: generate_canonical_id(&name, true, category),
            name: name.clone(),
            effective_state: EffectiveState::Excluded,
            scope: field(&["scope", "exclusion_scope"]),
            carve_backs: field(&["exceptions"]).into_iter().collect(),
            conditions: Vec::new(),
            impacted_coverages: impacted,
            sources: vec!["Base Form".to_owned()],
            confidence: object
                .get("confidence")
                .and_then(Value::as_f64)
                .map_or(0.95, |c| c as f32),
            severity: field(&["severity"])
                .as_deref()
                .and_then(Severity::parse)
                .or(Some(Severity::Material)),
            description: field(&["description", "source_text"]),
            page_numbers,
            source_text: field(&["source_text", "verbatim_text", "description"]),
            clause_reference,
            is_standard_provision: true,
            is_modified: false,
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EndorsementRecord;
    use serde_json::json;

    fn projection(impacted: &str, category: &str, source_ref: &str) -> EndorsementsData {
        EndorsementsData {
            endorsements: vec![EndorsementRecord {
                endorsement_number: Some(source_ref.to_owned()),
                modifications: vec![Modification {
                    impacted_exclusion: Some(impacted.to_owned()),
                    effect_category: Some(category.to_owned()),
                    scope: Some("scope text".to_owned()),
                    severity: Some("Major".to_owned()),
                    page_numbers: vec![12],
                    ..Modification::default()
                }],
                ..EndorsementRecord::default()
            }],
        }
    }

    #[test]
    fn narrowing_yields_partially_excluded_with_carve_back() {
        let data = projection(
            "Transfer of Rights of Recovery",
            "narrows_exclusion",
            "CA T3 53",
        );
        let outcome = ExclusionSynthesizer::new().synthesize(Some(&data), None, None);
        assert_eq!(outcome.effective_exclusions.len(), 1);
        let exclusion = &outcome.effective_exclusions[0];
        assert_eq!(exclusion.effective_state, EffectiveState::PartiallyExcluded);
        assert!(!exclusion.carve_backs.is_empty());
        assert_eq!(exclusion.sources, vec!["CA T3 53".to_owned()]);
        assert!(exclusion.confidence >= 0.7);
        assert_eq!(exclusion.page_numbers, vec![12]);
        assert!(exclusion.is_modified);
    }

    #[test]
    fn removal_outranks_narrowing() {
        let mut data = projection("Pollution", "narrows_exclusion", "E-1");
        data.endorsements[0].modifications.push(Modification {
            impacted_exclusion: Some("Pollution".to_owned()),
            effect_category: Some("removes_exclusion".to_owned()),
            ..Modification::default()
        });
        let outcome = ExclusionSynthesizer::new().synthesize(Some(&data), None, None);
        assert_eq!(
            outcome.effective_exclusions[0].effective_state,
            EffectiveState::Removed
        );
    }

    #[test]
    fn basic_waiver_endorsement_narrows_subrogation() {
        let basic = EndorsementsData {
            endorsements: vec![EndorsementRecord {
                endorsement_name: Some("BLANKET WAIVER OF SUBROGATION".to_owned()),
                endorsement_number: Some("CA T3 53".to_owned()),
                endorsement_type: Some("Modify".to_owned()),
                impacted_coverage: Some("Covered Autos Liability".to_owned()),
                ..EndorsementRecord::default()
            }],
        };
        let outcome = ExclusionSynthesizer::new().synthesize(None, Some(&basic), None);
        assert_eq!(outcome.effective_exclusions.len(), 1);
        let exclusion = &outcome.effective_exclusions[0];
        assert_eq!(exclusion.effective_state, EffectiveState::PartiallyExcluded);
        assert!(exclusion.name.contains("Waiver Of Subrogation"));
        assert!(!exclusion.carve_backs.is_empty());
        assert!(exclusion.sources.contains(&"CA T3 53".to_owned()));
        assert!(exclusion.confidence >= 0.7);
    }

    #[test]
    fn base_exclusions_convert_when_no_endorsements() {
        let base = vec![json!({
            "name": "Expected Or Intended Injury",
            "provision_number": "B.1",
            "form_section": "SECTION II - LIABILITY COVERAGE",
            "severity": "Material",
            "page_numbers": [6]
        })];
        let outcome = ExclusionSynthesizer::new().synthesize(None, None, Some(&base));
        assert_eq!(outcome.effective_exclusions.len(), 1);
        let exclusion = &outcome.effective_exclusions[0];
        assert_eq!(exclusion.effective_state, EffectiveState::Excluded);
        assert!(exclusion.is_standard_provision);
        assert!(!exclusion.is_modified);
        assert_eq!(exclusion.sources, vec!["Base Form".to_owned()]);
        assert_eq!(exclusion.canonical_id, "EXCL_CA_EXPECTED_INTENDED");
        assert_eq!(
            exclusion.clause_reference.as_deref(),
            Some("SECTION II - LIABILITY COVERAGE, B.1")
        );
        assert_eq!(outcome.synthesis_method, SynthesisMethod::BaseCoverageMerge);
    }

    #[test]
    fn synthesis_is_pure_given_identical_input() {
        let data = projection("Pollution", "introduces_exclusion", "E-9");
        let a = ExclusionSynthesizer::new().synthesize(Some(&data), None, None);
        let b = ExclusionSynthesizer::new().synthesize(Some(&data), None, None);
        assert_eq!(
            serde_json::to_value(&a.effective_exclusions).unwrap(),
            serde_json::to_value(&b.effective_exclusions).unwrap()
        );
    }
}
