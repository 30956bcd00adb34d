//! LLM inference fallback for low-confidence synthesis.

use bindery_core::{
    EffectiveCoverage, EffectiveState, GenerationRequest, LlmClient, Result,
};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::knowledge::BaseFormKnowledgeBase;
use crate::taxonomy::{coverage_category, generate_canonical_id};
use crate::types::{EndorsementsData, SynthesisOutcome};

const INFERENCE_INSTRUCTION: &str = "You are an insurance coverage analyst. Given ISO form \
references detected on a policy, list the coverages those forms typically provide. Respond \
with JSON only: {\"inferred_coverages\": [{\"coverage_name\", \"form_reference\", \
\"typical_terms\": {}}], \"confidence\": 0..1}.";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct InferencePayload {
    inferred_coverages: Vec<InferredCoverage>,
    confidence: Option<f32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct InferredCoverage {
    coverage_name: Option<String>,
    form_reference: Option<String>,
    typical_terms: Value,
}

/// Infers typical base coverages from detected ISO form references when
/// direct synthesis confidence is low.
#[derive(Debug, Clone, Default)]
pub struct InferenceService {
    knowledge: BaseFormKnowledgeBase,
}

impl InferenceService {
    /// Creates an inference service.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            knowledge: BaseFormKnowledgeBase::new(),
        }
    }

    /// Collects ISO form references from endorsement data.
    #[must_use]
    pub fn extract_form_references(&self, data: &EndorsementsData) -> Vec<String> {
        let mut haystack = String::new();
        for endorsement in &data.endorsements {
            if let Some(number) = &endorsement.endorsement_number {
                haystack.push_str(number);
                haystack.push('\n');
            }
            if let Some(name) = &endorsement.endorsement_name {
                haystack.push_str(name);
                haystack.push('\n');
            }
        }
        self.knowledge.detect_form_ids(&haystack)
    }

    /// Runs inference and merges the result into `outcome`. Inferred
    /// coverages join under source `"Inferred"` with reduced confidence;
    /// the outcome's method flips to `llm_inference`.
    ///
    /// # Errors
    ///
    /// Propagates transport errors from the model call; callers treat them
    /// as "no inference available" rather than failing the workflow.
    pub async fn infer_and_merge<L: LlmClient>(
        &self,
        client: &L,
        form_references: &[String],
        mut outcome: SynthesisOutcome,
    ) -> Result<SynthesisOutcome> {
        if form_references.is_empty() {
            return Ok(outcome);
        }

        let request = GenerationRequest::new(format!(
            "Detected form references: {}",
            form_references.join(", ")
        ))
        .with_system_instruction(INFERENCE_INSTRUCTION)
        .json_mode();

        let response = client.generate_content(request).await?;
        let payload: InferencePayload = match serde_json::from_str(response.trim()) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(%err, "inference output unparseable; skipping fallback");
                return Ok(outcome);
            }
        };

        let inference_confidence = payload.confidence.unwrap_or(0.7).clamp(0.0, 1.0);
        let existing: Vec<String> = outcome
            .effective_coverages
            .iter()
            .map(|c| c.name.clone())
            .collect();

        let mut added = 0usize;
        for inferred in payload.inferred_coverages {
            let Some(name) = inferred.coverage_name.filter(|n| !n.is_empty()) else {
                continue;
            };
            if existing.contains(&name) {
                continue;
            }
            let scope = if inferred.typical_terms.is_null() {
                None
            } else {
                Some(inferred.typical_terms.to_string())
            };
            outcome.effective_coverages.push(EffectiveCoverage {
                canonical_id: generate_canonical_id(&name, false, coverage_category(&name)),
                name: name.clone(),
                effective_state: EffectiveState::Covered,
                scope,
                conditions: Vec::new(),
                impacted_coverages: Vec::new(),
                sources: vec![inferred
                    .form_reference
                    .unwrap_or_else(|| "Inferred".to_owned())],
                confidence: inference_confidence * 0.9,
                severity: None,
                description: Some(format!("Inferred from standard form provisions for {name}.")),
                page_numbers: Vec::new(),
                source_text: None,
                clause_reference: None,
                is_standard_provision: true,
                is_modified: false,
            });
            added += 1;
        }

        if added > 0 {
            outcome.synthesis_method = bindery_core::SynthesisMethod::LlmInference;
            outcome.fallback_used = true;
            outcome.overall_confidence = outcome
                .overall_confidence
                .max(inference_confidence * 0.9);
            info!(added, "inference fallback contributed coverages");
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EndorsementRecord;
    use bindery_core::SynthesisMethod;

    struct ScriptedLlm(&'static str);

    impl LlmClient for ScriptedLlm {
        fn model(&self) -> &str {
            "scripted"
        }
        async fn generate_content(&self, _request: GenerationRequest) -> Result<String> {
            Ok(self.0.to_owned())
        }
    }

    #[test]
    fn form_references_come_from_numbers_and_names() {
        let data = EndorsementsData {
            endorsements: vec![EndorsementRecord {
                endorsement_number: Some("CA T3 53".to_owned()),
                endorsement_name: Some("per form CA 00 01".to_owned()),
                ..EndorsementRecord::default()
            }],
        };
        let refs = InferenceService::new().extract_form_references(&data);
        assert_eq!(refs, vec!["CA 00 01", "CA T3 53"]);
    }

    #[tokio::test]
    async fn inference_merges_under_inferred_source() {
        let llm = ScriptedLlm(
            r#"{"inferred_coverages": [{"coverage_name": "Covered Autos Liability Coverage",
                 "form_reference": "CA 00 01", "typical_terms": {"limit": "$1,000,000"}}],
                "confidence": 0.8}"#,
        );
        let outcome = InferenceService::new()
            .infer_and_merge(&llm, &["CA 00 01".to_owned()], SynthesisOutcome::default())
            .await
            .unwrap();
        assert_eq!(outcome.effective_coverages.len(), 1);
        assert_eq!(outcome.synthesis_method, SynthesisMethod::LlmInference);
        assert!(outcome.fallback_used);
        assert!((outcome.effective_coverages[0].confidence - 0.72).abs() < 1e-6);
    }

    #[tokio::test]
    async fn unparseable_inference_is_skipped() {
        let llm = ScriptedLlm("no json here");
        let outcome = InferenceService::new()
            .infer_and_merge(&llm, &["CA 00 01".to_owned()], SynthesisOutcome::default())
            .await
            .unwrap();
        assert!(outcome.effective_coverages.is_empty());
        assert!(!outcome.fallback_used);
    }
}
