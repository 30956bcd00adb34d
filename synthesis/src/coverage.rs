//! Effective-coverage synthesis.

use std::collections::BTreeMap;

use bindery_core::{EffectiveCoverage, EffectiveState, Severity, SynthesisMethod};
use serde_json::Value;
use tracing::info;

use crate::taxonomy::{coverage_category, generate_canonical_id, CoverageCategory};
use crate::types::{
    first_source_text, modification_confidence, union_page_numbers, EndorsementsData, Modification,
    SynthesisOutcome,
};

/// Synthesises effective coverages from endorsement modifications, with
/// basic endorsement records as a fallback and base-section coverages
/// converted 1:1 when no endorsements exist.
#[derive(Debug, Clone, Default)]
pub struct CoverageSynthesizer;

impl CoverageSynthesizer {
    /// Creates a synthesizer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Runs coverage synthesis.
    #[must_use]
    pub fn synthesize(
        &self,
        projections: Option<&EndorsementsData>,
        basic: Option<&EndorsementsData>,
        base_coverages: Option<&[Value]>,
    ) -> SynthesisOutcome {
        let mut groups: BTreeMap<String, Vec<Modification>> = BTreeMap::new();
        let mut sources: BTreeMap<String, Vec<String>> = BTreeMap::new();

        if let Some(data) = projections {
            collect_projected(data, &mut groups, &mut sources);
        } else if let Some(data) = basic {
            collect_from_basic(data, &mut groups, &mut sources);
        }

        let has_endorsements = projections.is_some() || basic.is_some();

        let (effective_coverages, synthesis_method) = if !groups.is_empty() {
            (
                build_effective(&groups, &sources),
                SynthesisMethod::EndorsementOnly,
            )
        } else if let Some(base) = base_coverages.filter(|b| !b.is_empty()) {
            info!(
                count = base.len(),
                "no endorsements; converting base coverages to effective coverages"
            );
            (convert_base(base), SynthesisMethod::BaseCoverageMerge)
        } else {
            (Vec::new(), SynthesisMethod::EndorsementOnly)
        };

        let overall_confidence = if effective_coverages.is_empty() {
            0.0
        } else {
            effective_coverages.iter().map(|c| c.confidence).sum::<f32>()
                / effective_coverages.len() as f32
        };

        let mut distinct_sources: Vec<&String> = sources.values().flatten().collect();
        distinct_sources.sort();
        distinct_sources.dedup();

        SynthesisOutcome {
            effective_coverages,
            effective_exclusions: Vec::new(),
            overall_confidence,
            synthesis_method,
            source_endorsement_count: if has_endorsements { distinct_sources.len() } else { 0 },
            fallback_recommended: false,
            fallback_used: false,
        }
    }
}

fn normalize_name(name: &str) -> String {
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
            // Exclusion projections are the exclusion synthesizer's input.
            if modification.impacted_exclusion.is_some() {
                continue;
            }
            let Some(impacted) = modification.impacted_coverage.as_deref() else {
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

fn collect_from_basic(
    data: &EndorsementsData,
    groups: &mut BTreeMap<String, Vec<Modification>>,
    sources: &mut BTreeMap<String, Vec<String>>,
) {
    for endorsement in &data.endorsements {
        let Some(impacted) = endorsement.impacted_coverage.as_deref() else {
            continue;
        };
        let endorsement_type = endorsement.endorsement_type.as_deref().unwrap_or("Modify");
        let effect_category = match endorsement_type {
            "Add" => "adds_coverage",
            "Restrict" => "limits_coverage",
            "Delete" => "removes_coverage",
            _ => "expands_coverage",
        };
        let key = normalize_name(impacted);
        let reference = endorsement.reference();

        groups.entry(key.clone()).or_default().push(Modification {
            impacted_coverage: Some(impacted.to_owned()),
            impacted_exclusion: None,
            effect_category: Some(effect_category.to_owned()),
            effect: endorsement.endorsement_type.clone(),
            scope: None,
            exception_conditions: None,
            verbatim_language: None,
            severity: endorsement.materiality.clone(),
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

/// Effective state by priority: removal beats restore/expand beats
/// narrowing beats addition.
fn determine_state(modifications: &[Modification]) -> EffectiveState {
    let category = |needle: &str| {
        modifications
            .iter()
            .any(|m| m.effect_category.as_deref() == Some(needle))
    };
    if category("removes_coverage") {
        EffectiveState::Removed
    } else if category("restores_coverage") || category("expands_coverage") {
        EffectiveState::ExpandedCoverage
    } else if category("limits_coverage") {
        EffectiveState::Limited
    } else if category("adds_coverage") {
        EffectiveState::Added
    } else {
        EffectiveState::ExpandedCoverage
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
) -> Vec<EffectiveCoverage> {
    let mut out = Vec::new();

    for (name, modifications) in groups {
        if modifications.is_empty() {
            continue;
        }
        let state = determine_state(modifications);

        let mut conditions: Vec<String> = modifications
            .iter()
            .filter_map(|m| m.exception_conditions.clone())
            .collect();
        conditions.dedup();

        let mut impacted: Vec<String> = Vec::new();
        for modification in modifications {
            if let Some(coverage) = &modification.impacted_coverage {
                if coverage != name && !impacted.contains(coverage) {
                    impacted.push(coverage.clone());
                }
            }
        }

        let confidence = modification_confidence(modifications);
        let scope = modifications.iter().find_map(|m| m.scope.clone());

        out.push(EffectiveCoverage {
            canonical_id: generate_canonical_id(name, false, coverage_category(name)),
            name: name.clone(),
            effective_state: state,
            scope,
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

fn describe(name: &str, state: EffectiveState, modifications: &[Modification]) -> String {
    if let Some(verbatim) = modifications.iter().find_map(|m| m.verbatim_language.clone()) {
        return verbatim.chars().take(500).collect();
    }
    match state {
        EffectiveState::Added => format!("{name} has been added by endorsement."),
        EffectiveState::ExpandedCoverage => {
            format!("{name} has been broadened by endorsement modifications.")
        }
        EffectiveState::Limited => {
            format!("{name} has been restricted by endorsement modifications.")
        }
        EffectiveState::Removed => format!("{name} has been removed by endorsement."),
        _ => format!("{name} applies as modified by endorsements."),
    }
}

/// Converts base-section coverages 1:1 when no endorsements exist.
fn convert_base(base_coverages: &[Value]) -> Vec<EffectiveCoverage> {
    let mut out = Vec::new();
    for coverage in base_coverages {
        let Some(object) = coverage.as_object() else {
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
        let Some(name) = field(&["name", "coverage_name", "provision_name"]) else {
            continue;
        };

        let scope = field(&["scope", "description"]);
        let limit = field(&["limit"]);
        let description = match (&scope, &limit) {
            (Some(scope), Some(limit)) => Some(format!("{scope} (limit {limit})")),
            (Some(scope), None) => Some(scope.clone()),
            (None, Some(limit)) => Some(format!("Limit {limit}")),
            (None, None) => None,
        };

        out.push(EffectiveCoverage {
            canonical_id: generate_canonical_id(&name, false, coverage_category(&name)),
            name: name.clone(),
            effective_state: EffectiveState::Covered,
            scope,
            conditions: Vec::new(),
            impacted_coverages: Vec::new(),
            sources: vec!["Base Form".to_owned()],
            confidence: object
                .get("confidence")
                .and_then(Value::as_f64)
                .map_or(0.9, |c| c as f32),
            severity: None,
            description,
            page_numbers: object
                .get("page_numbers")
                .and_then(Value::as_array)
                .map(|items| {
                    items
                        .iter()
                        .filter_map(Value::as_u64)
                        .map(|p| p as u32)
                        .collect()
                })
                .unwrap_or_default(),
            source_text: field(&["source_text", "verbatim_text"]),
            clause_reference: field(&["provision_number"]),
            is_standard_provision: true,
            is_modified: false,
        });
    }
    out
}
