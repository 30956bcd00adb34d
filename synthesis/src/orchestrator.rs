//! The synthesis run: route extraction output into both synthesisers,
//! merge, and decide whether fallback is warranted.

use bindery_core::{LlmClient, SectionExtraction, SectionType, SynthesisMethod};
use serde_json::Value;
use tracing::info;

use crate::coverage::CoverageSynthesizer;
use crate::exclusion::ExclusionSynthesizer;
use crate::inference::InferenceService;
use crate::types::{EndorsementsData, SynthesisOutcome};

/// Default confidence threshold below which LLM fallback is recommended.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.7;

/// Coordinates coverage and exclusion synthesis over one document's
/// section extractions.
///
/// This engine never fails the workflow: missing or thin input degrades to
/// empty or low-confidence output with `fallback_recommended` set.
#[derive(Debug, Clone)]
pub struct SynthesisOrchestrator {
    confidence_threshold: f32,
    enable_llm_fallback: bool,
    coverage: CoverageSynthesizer,
    exclusion: ExclusionSynthesizer,
    inference: InferenceService,
}

impl Default for SynthesisOrchestrator {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIDENCE_THRESHOLD, true)
    }
}

impl SynthesisOrchestrator {
    /// Creates an orchestrator.
    #[must_use]
    pub const fn new(confidence_threshold: f32, enable_llm_fallback: bool) -> Self {
        Self {
            confidence_threshold,
            enable_llm_fallback,
            coverage: CoverageSynthesizer::new(),
            exclusion: ExclusionSynthesizer::new(),
            inference: InferenceService::new(),
        }
    }

    /// Pure synthesis over the section extractions.
    #[must_use]
    pub fn synthesize(&self, sections: &[SectionExtraction]) -> SynthesisOutcome {
        let (projections, basic) = split_endorsement_data(sections);
        let base_coverages = base_section_items(sections, SectionType::Coverages, "coverages");
        let base_exclusions = base_section_items(sections, SectionType::Exclusions, "exclusions");

        let coverage_outcome = self.coverage.synthesize(
            projections.as_ref(),
            basic.as_ref(),
            base_coverages.as_deref(),
        );
        let exclusion_outcome = self.exclusion.synthesize(
            projections.as_ref(),
            basic.as_ref(),
            base_exclusions.as_deref(),
        );

        let mut merged = merge(coverage_outcome, exclusion_outcome);
        merged.fallback_recommended =
            merged.overall_confidence < self.confidence_threshold && self.enable_llm_fallback;

        if merged.fallback_recommended {
            info!(
                confidence = merged.overall_confidence,
                threshold = self.confidence_threshold,
                "synthesis confidence below threshold, fallback recommended"
            );
        }
        merged
    }

    /// Synthesis with automatic LLM inference when confidence is low.
    pub async fn synthesize_with_fallback<L: LlmClient>(
        &self,
        client: &L,
        sections: &[SectionExtraction],
    ) -> SynthesisOutcome {
        let outcome = self.synthesize(sections);
        if !outcome.fallback_recommended || !self.enable_llm_fallback {
            return outcome;
        }

        let (projections, basic) = split_endorsement_data(sections);
        let endorsement_data = projections.or(basic).unwrap_or_default();
        let form_references = self.inference.extract_form_references(&endorsement_data);
        if form_references.is_empty() {
            return outcome;
        }

        match self
            .inference
            .infer_and_merge(client, &form_references, outcome.clone())
            .await
        {
            Ok(merged) => merged,
            // Inference is best-effort; transport failures keep the direct
            // synthesis result.
            Err(_) => outcome,
        }
    }
}

/// Routes the endorsements section into projection vs basic data based on
/// whether any endorsement carries provision modifications.
fn split_endorsement_data(
    sections: &[SectionExtraction],
) -> (Option<EndorsementsData>, Option<EndorsementsData>) {
    let Some(section) = sections
        .iter()
        .find(|s| s.section_type == SectionType::Endorsements)
    else {
        return (None, None);
    };
    let data = EndorsementsData::from_value(&section.extracted_data);
    if data.endorsements.is_empty() {
        return (None, None);
    }
    if data.has_projections() {
        (Some(data), None)
    } else {
        (None, Some(data))
    }
}

fn base_section_items(
    sections: &[SectionExtraction],
    section_type: SectionType,
    key: &str,
) -> Option<Vec<Value>> {
    sections
        .iter()
        .find(|s| s.section_type == section_type)
        .and_then(|s| s.extracted_data.get(key))
        .and_then(Value::as_array)
        .cloned()
}

fn merge(coverage: SynthesisOutcome, exclusion: SynthesisOutcome) -> SynthesisOutcome {
    let mut confidences = Vec::new();
    if !coverage.effective_coverages.is_empty() {
        confidences.push(coverage.overall_confidence);
    }
    if !exclusion.effective_exclusions.is_empty() {
        confidences.push(exclusion.overall_confidence);
    }
    let overall_confidence = if confidences.is_empty() {
        0.0
    } else {
        confidences.iter().sum::<f32>() / confidences.len() as f32
    };

    // Method preference: a base-coverage merge on either side labels the
    // whole outcome, since it means no endorsements drove synthesis.
    let synthesis_method = if coverage.synthesis_method == SynthesisMethod::BaseCoverageMerge
        || exclusion.synthesis_method == SynthesisMethod::BaseCoverageMerge
    {
        SynthesisMethod::BaseCoverageMerge
    } else {
        SynthesisMethod::EndorsementOnly
    };

    SynthesisOutcome {
        effective_coverages: coverage.effective_coverages,
        effective_exclusions: exclusion.effective_exclusions,
        overall_confidence,
        synthesis_method,
        source_endorsement_count: coverage.source_endorsement_count
            + exclusion.source_endorsement_count,
        fallback_recommended: false,
        fallback_used: false,
    }
}
