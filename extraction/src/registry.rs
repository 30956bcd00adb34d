//! Section extractor registry and the extractors themselves.
//!
//! Dispatch is a tagged enum behind an alias-normalised lookup table:
//! every supported section name (and its aliases, e.g. "SOV" for
//! "Schedule of Values") resolves to an [`ExtractorKind`]; anything else
//! falls back to [`ExtractorKind::Default`].

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use bindery_core::SectionType;

/// ISO form identifiers like `CA 00 01` or `CG 20 10`.
static ISO_FORM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Z]{2}\s?[0-9T][0-9]\s?\d{2}\b").unwrap_or_else(|_| unreachable!())
});

/// The extractor implementations, dispatched by tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExtractorKind {
    /// Declarations page fields.
    Declarations,
    /// Defined terms.
    Definitions,
    /// Coverage grants.
    Coverages,
    /// Policy conditions.
    Conditions,
    /// Exclusions.
    Exclusions,
    /// Endorsement records.
    Endorsements,
    /// Endorsement provision projections (per-provision modifications).
    EndorsementProvisions,
    /// Insuring agreement language.
    InsuringAgreement,
    /// Premium breakdown.
    PremiumSummary,
    /// ISO base forms (standard provisions).
    BaseForm,
    /// Fallback for unknown sections.
    Default,
}

/// Registry mapping normalised section names to extractors.
#[derive(Debug, Clone)]
pub struct ExtractorRegistry {
    map: HashMap<String, ExtractorKind>,
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractorRegistry {
    /// Builds the registry with every supported section and its aliases.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self { map: HashMap::new() };
        registry.register(&["declarations", "declaration", "dec page"], ExtractorKind::Declarations);
        registry.register(&["definitions", "defined terms"], ExtractorKind::Definitions);
        registry.register(&["coverages", "coverage", "coverage form"], ExtractorKind::Coverages);
        registry.register(&["conditions", "policy conditions"], ExtractorKind::Conditions);
        registry.register(&["exclusions", "exclusion"], ExtractorKind::Exclusions);
        registry.register(&["endorsements", "endorsement"], ExtractorKind::Endorsements);
        registry.register(
            &["endorsement provisions", "endorsement projections"],
            ExtractorKind::EndorsementProvisions,
        );
        registry.register(&["insuring agreement"], ExtractorKind::InsuringAgreement);
        registry.register(&["premium summary", "premium schedule"], ExtractorKind::PremiumSummary);
        registry.register(&["base form", "base forms", "iso form"], ExtractorKind::BaseForm);
        // Structural sections are routed through the table pipeline, but an
        // alias lookup must still resolve; the default extractor handles
        // any stray text.
        registry.register(
            &["schedule", "sov", "schedule of values", "statement of values", "loss run"],
            ExtractorKind::Default,
        );
        registry
    }

    /// Registers an extractor under each alias.
    pub fn register(&mut self, aliases: &[&str], kind: ExtractorKind) {
        for alias in aliases {
            self.map.insert(Self::normalize(alias), kind);
        }
    }

    /// Resolves a section name; unknown names fall back to the default
    /// extractor.
    #[must_use]
    pub fn resolve(&self, section_name: &str) -> ExtractorKind {
        self.map
            .get(&Self::normalize(section_name))
            .copied()
            .unwrap_or(ExtractorKind::Default)
    }

    /// Resolves for a super-chunk. Coverage and exclusion text that carries
    /// an ISO form header is routed to the base-form extractor so standard
    /// provisions are read with the form-aware schema.
    #[must_use]
    pub fn resolve_for_chunk(&self, section: SectionType, text: &str) -> ExtractorKind {
        let base = self.resolve(section.as_str());
        if matches!(section, SectionType::Coverages | SectionType::Exclusions)
            && text.to_lowercase().contains("coverage form")
            && ISO_FORM_RE.is_match(text)
        {
            return ExtractorKind::BaseForm;
        }
        base
    }

    /// All registered (normalised) names.
    #[must_use]
    pub fn supported_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.map.keys().cloned().collect();
        names.sort();
        names
    }

    fn normalize(section_name: &str) -> String {
        section_name.to_lowercase().replace('_', " ").trim().to_owned()
    }
}

// ---------------------------------------------------------------------------
// Response payloads. Every extractor asks for strict JSON matching one of
// these shapes; `serde(default)` keeps partial model output usable.
// ---------------------------------------------------------------------------

/// Declarations page fields.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DeclarationsPayload {
    /// Policy number as printed.
    pub policy_number: Option<String>,
    /// Named insured.
    pub named_insured: Option<String>,
    /// Issuing carrier.
    pub carrier: Option<String>,
    /// Effective date, ISO preferred.
    pub effective_date: Option<String>,
    /// Expiration date, ISO preferred.
    pub expiration_date: Option<String>,
    /// Total premium as printed.
    pub total_premium: Option<String>,
    /// Line of business.
    pub line_of_business: Option<String>,
    /// Model self-assessed confidence.
    pub confidence: Option<f32>,
}

/// One coverage grant.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CoverageItem {
    /// Coverage name.
    #[serde(alias = "coverage_name")]
    pub name: Option<String>,
    /// Limit as printed.
    pub limit: Option<String>,
    /// Deductible as printed.
    pub deductible: Option<String>,
    /// Premium attributable to this coverage.
    pub premium: Option<String>,
    /// Form providing the coverage.
    pub form_reference: Option<String>,
    /// Scope notes.
    pub scope: Option<String>,
}

/// Coverages section payload.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CoveragesPayload {
    /// Coverage grants found.
    pub coverages: Vec<CoverageItem>,
    /// Model self-assessed confidence.
    pub confidence: Option<f32>,
}

/// One condition.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ConditionItem {
    /// Condition name.
    #[serde(alias = "condition_name")]
    pub name: Option<String>,
    /// What the condition applies to.
    pub applies_to: Option<String>,
    /// The obligation imposed.
    pub requirement: Option<String>,
}

/// Conditions section payload.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ConditionsPayload {
    /// Conditions found.
    pub conditions: Vec<ConditionItem>,
    /// Model self-assessed confidence.
    pub confidence: Option<f32>,
}

/// One exclusion.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ExclusionItem {
    /// Exclusion name.
    #[serde(alias = "exclusion_name")]
    pub name: Option<String>,
    /// What the exclusion removes.
    #[serde(alias = "exclusion_scope")]
    pub scope: Option<String>,
    /// Coverage the exclusion impacts.
    pub impacted_coverage: Option<String>,
    /// Exceptions that restore coverage.
    pub exceptions: Option<Value>,
    /// Severity of the exclusion.
    pub severity: Option<String>,
    /// Provision number (e.g. "B.1").
    pub provision_number: Option<String>,
    /// Form section (e.g. "SECTION II - EXCLUSIONS").
    pub form_section: Option<String>,
    /// Pages the exclusion appears on.
    pub page_numbers: Vec<u32>,
    /// Verbatim text.
    pub source_text: Option<String>,
}

/// Exclusions section payload.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ExclusionsPayload {
    /// Exclusions found.
    pub exclusions: Vec<ExclusionItem>,
    /// Model self-assessed confidence.
    pub confidence: Option<f32>,
}

/// One provision-level modification inside an endorsement projection.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ModificationItem {
    /// Coverage the modification impacts, for coverage modifications.
    pub impacted_coverage: Option<String>,
    /// Exclusion the modification impacts, for exclusion modifications.
    pub impacted_exclusion: Option<String>,
    /// Effect category: `adds_coverage`, `expands_coverage`,
    /// `limits_coverage`, `restores_coverage`, `introduces_exclusion`,
    /// `narrows_exclusion`, or `removes_exclusion`.
    pub effect_category: Option<String>,
    /// Free-text effect description.
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
}

/// One endorsement record, optionally with provision projections.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EndorsementItem {
    /// Endorsement name.
    #[serde(alias = "name")]
    pub endorsement_name: Option<String>,
    /// Endorsement form number (e.g. "CA T3 53").
    #[serde(alias = "form_number")]
    pub endorsement_number: Option<String>,
    /// Endorsement type: Add, Modify, Restrict, or Delete.
    pub endorsement_type: Option<String>,
    /// Coverage impacted by the endorsement.
    pub impacted_coverage: Option<String>,
    /// Materiality: high, medium, or low.
    pub materiality: Option<String>,
    /// Edition date.
    pub edition_date: Option<String>,
    /// Pages the endorsement appears on.
    pub page_numbers: Vec<u32>,
    /// Verbatim source text.
    pub source_text: Option<String>,
    /// Provision-level modifications, when projected.
    pub modifications: Vec<ModificationItem>,
}

/// Endorsements section payload.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EndorsementsPayload {
    /// Endorsement records found.
    pub endorsements: Vec<EndorsementItem>,
    /// Model self-assessed confidence.
    pub confidence: Option<f32>,
}

/// One defined term.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DefinitionItem {
    /// The term being defined.
    #[serde(alias = "name")]
    pub term: Option<String>,
    /// The definition text.
    pub definition: Option<String>,
}

/// Definitions section payload.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DefinitionsPayload {
    /// Defined terms found.
    pub definitions: Vec<DefinitionItem>,
    /// Model self-assessed confidence.
    pub confidence: Option<f32>,
}

/// One premium line item.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct PremiumLineItem {
    /// Coverage the premium applies to.
    #[serde(alias = "coverage")]
    pub name: Option<String>,
    /// Premium amount as printed.
    pub premium: Option<String>,
}

/// Premium summary payload.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct PremiumSummaryPayload {
    /// Per-coverage premium rows.
    pub line_items: Vec<PremiumLineItem>,
    /// Total premium as printed.
    pub total_premium: Option<String>,
    /// Model self-assessed confidence.
    pub confidence: Option<f32>,
}

/// One standard provision of a base form.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct ProvisionItem {
    /// Provision number (e.g. "B.1", "II.A").
    pub provision_number: Option<String>,
    /// Provision name.
    #[serde(alias = "name")]
    pub provision_name: Option<String>,
    /// What the provision does.
    pub description: Option<String>,
    /// Form section (e.g. "SECTION II - LIABILITY COVERAGE").
    pub form_section: Option<String>,
    /// Verbatim text.
    pub verbatim_text: Option<String>,
    /// Sub-provisions.
    pub sub_provisions: Vec<String>,
}

/// Base-form payload: the standard provisions of an ISO form.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct BaseFormPayload {
    /// Form identifier (e.g. "CA 00 01").
    pub form_id: Option<String>,
    /// Form name.
    pub form_name: Option<String>,
    /// Edition date.
    pub form_edition_date: Option<String>,
    /// Standard coverages.
    pub coverages: Vec<ProvisionItem>,
    /// Standard exclusions.
    pub exclusions: Vec<ProvisionItem>,
    /// Standard conditions.
    pub conditions: Vec<ProvisionItem>,
    /// Standard definitions.
    pub definitions: Vec<ProvisionItem>,
    /// Model self-assessed confidence.
    pub confidence: Option<f32>,
}

/// Default payload for unknown sections.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct DefaultPayload {
    /// One-paragraph summary of the section.
    pub summary: Option<String>,
    /// Entities found, each with `type` and `name`.
    pub entities: Vec<Value>,
    /// Model self-assessed confidence.
    pub confidence: Option<f32>,
}

const STRICT_JSON_INSTRUCTION: &str = "You are an insurance policy analyst. \
Respond with a single JSON object matching the requested schema exactly. \
Do not include markdown, commentary, or code fences. \
Extract only what the document states; use null for absent fields.";

impl ExtractorKind {
    /// Strict JSON-mode system instruction shared by all extractors.
    #[must_use]
    pub const fn system_instruction(self) -> &'static str {
        STRICT_JSON_INSTRUCTION
    }

    /// Default confidence when the model does not self-assess.
    #[must_use]
    pub const fn default_confidence(self) -> f32 {
        match self {
            Self::Declarations => 0.85,
            Self::Default => 0.5,
            _ => 0.75,
        }
    }

    /// JSON schema for the expected response shape.
    #[must_use]
    pub fn response_schema(self) -> Value {
        let schema = match self {
            Self::Declarations => schema_for!(DeclarationsPayload),
            Self::Definitions => schema_for!(DefinitionsPayload),
            Self::Coverages | Self::InsuringAgreement => schema_for!(CoveragesPayload),
            Self::Conditions => schema_for!(ConditionsPayload),
            Self::Exclusions => schema_for!(ExclusionsPayload),
            Self::Endorsements | Self::EndorsementProvisions => schema_for!(EndorsementsPayload),
            Self::PremiumSummary => schema_for!(PremiumSummaryPayload),
            Self::BaseForm => schema_for!(BaseFormPayload),
            Self::Default => schema_for!(DefaultPayload),
        };
        serde_json::to_value(schema).unwrap_or(Value::Null)
    }

    /// Builds the extraction prompt for a super-chunk's text.
    #[must_use]
    pub fn prompt(self, text: &str) -> String {
        let task = match self {
            Self::Declarations => {
                "Extract the declarations-page fields: policy_number, named_insured, carrier, \
                 effective_date (ISO 8601), expiration_date (ISO 8601), total_premium, \
                 line_of_business."
            }
            Self::Definitions => {
                "Extract every defined term as {\"definitions\": [{\"term\", \"definition\"}]}."
            }
            Self::Coverages => {
                "Extract every coverage grant as {\"coverages\": [{\"name\", \"limit\", \
                 \"deductible\", \"premium\", \"form_reference\", \"scope\"}]}."
            }
            Self::InsuringAgreement => {
                "Extract each insuring agreement as {\"coverages\": [{\"name\", \"scope\", \
                 \"form_reference\"}]}."
            }
            Self::Conditions => {
                "Extract every condition as {\"conditions\": [{\"name\", \"applies_to\", \
                 \"requirement\"}]}."
            }
            Self::Exclusions => {
                "Extract every exclusion as {\"exclusions\": [{\"name\", \"scope\", \
                 \"impacted_coverage\", \"exceptions\", \"severity\", \"provision_number\", \
                 \"form_section\", \"page_numbers\", \"source_text\"}]}."
            }
            Self::Endorsements => {
                "Extract every endorsement as {\"endorsements\": [{\"endorsement_name\", \
                 \"endorsement_number\", \"endorsement_type\" (Add|Modify|Restrict|Delete), \
                 \"impacted_coverage\", \"materiality\" (high|medium|low), \"page_numbers\", \
                 \"source_text\"}]}."
            }
            Self::EndorsementProvisions => {
                "For each endorsement, project its provision-level modifications as \
                 {\"endorsements\": [{\"endorsement_name\", \"endorsement_number\", \
                 \"modifications\": [{\"impacted_coverage\" or \"impacted_exclusion\", \
                 \"effect_category\" (adds_coverage|expands_coverage|limits_coverage|\
                 restores_coverage|introduces_exclusion|narrows_exclusion|removes_exclusion), \
                 \"scope\", \"exception_conditions\", \"verbatim_language\", \"severity\", \
                 \"page_numbers\", \"source_text\"}]}]}."
            }
            Self::PremiumSummary => {
                "Extract the premium breakdown as {\"line_items\": [{\"name\", \"premium\"}], \
                 \"total_premium\"}."
            }
            Self::BaseForm => {
                "This is an ISO base form. Extract ALL standard coverages, exclusions, \
                 conditions, and definitions, preserving exact provision numbers (e.g. \"B.1\", \
                 \"II.A\") and form sections. Focus especially on exclusions. Shape: \
                 {\"form_id\", \"form_name\", \"form_edition_date\", \"coverages\": [...], \
                 \"exclusions\": [...], \"conditions\": [...], \"definitions\": [...]}."
            }
            Self::Default => {
                "Summarise the section and list any insurance entities as \
                 {\"summary\", \"entities\": [{\"type\", \"name\"}]}."
            }
        };
        format!("{task}\n\nDOCUMENT SECTION:\n{text}")
    }

    /// Maps a tolerant-parsed response onto the section's field schema.
    /// Returns the normalised data plus the extraction confidence.
    #[must_use]
    pub fn map_response(self, value: Value) -> (Value, f32) {
        fn normalise<T>(value: Value, fallback_confidence: f32) -> (Value, f32)
        where
            T: Default + Serialize + for<'de> Deserialize<'de>,
        {
            let confidence = value
                .get("confidence")
                .and_then(Value::as_f64)
                .map(|c| c as f32);
            let payload: T = serde_json::from_value(value).unwrap_or_default();
            let normalised = serde_json::to_value(&payload).unwrap_or(Value::Null);
            (normalised, confidence.unwrap_or(fallback_confidence).clamp(0.0, 1.0))
        }

        let fallback = self.default_confidence();
        match self {
            Self::Declarations => normalise::<DeclarationsPayload>(value, fallback),
            Self::Definitions => normalise::<DefinitionsPayload>(value, fallback),
            Self::Coverages | Self::InsuringAgreement => {
                normalise::<CoveragesPayload>(value, fallback)
            }
            Self::Conditions => normalise::<ConditionsPayload>(value, fallback),
            Self::Exclusions => normalise::<ExclusionsPayload>(value, fallback),
            Self::Endorsements | Self::EndorsementProvisions => {
                normalise::<EndorsementsPayload>(value, fallback)
            }
            Self::PremiumSummary => normalise::<PremiumSummaryPayload>(value, fallback),
            Self::BaseForm => normalise::<BaseFormPayload>(value, fallback),
            Self::Default => normalise::<DefaultPayload>(value, fallback),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn aliases_resolve_to_one_extractor() {
        let registry = ExtractorRegistry::new();
        assert_eq!(registry.resolve("SOV"), registry.resolve("Schedule of Values"));
        assert_eq!(registry.resolve("declarations"), ExtractorKind::Declarations);
        assert_eq!(registry.resolve("DECLARATION"), ExtractorKind::Declarations);
        assert_eq!(registry.resolve("premium_summary"), ExtractorKind::PremiumSummary);
    }

    #[test]
    fn unknown_sections_fall_back_to_default() {
        let registry = ExtractorRegistry::new();
        assert_eq!(registry.resolve("mystery section"), ExtractorKind::Default);
    }

    #[test]
    fn iso_form_text_upgrades_to_base_form() {
        let registry = ExtractorRegistry::new();
        let text = "BUSINESS AUTO COVERAGE FORM CA 00 01\nSECTION I - COVERED AUTOS";
        assert_eq!(
            registry.resolve_for_chunk(SectionType::Coverages, text),
            ExtractorKind::BaseForm
        );
        assert_eq!(
            registry.resolve_for_chunk(SectionType::Coverages, "plain coverage text"),
            ExtractorKind::Coverages
        );
    }

    #[test]
    fn map_response_normalises_aliases() {
        let raw = json!({
            "exclusions": [{"exclusion_name": "Pollution", "severity": "Major"}],
            "confidence": 0.9
        });
        let (data, confidence) = ExtractorKind::Exclusions.map_response(raw);
        assert!((confidence - 0.9).abs() < 1e-6);
        assert_eq!(data["exclusions"][0]["name"], json!("Pollution"));
    }

    #[test]
    fn map_response_survives_garbage() {
        let (data, confidence) = ExtractorKind::Coverages.map_response(json!([1, 2, 3]));
        assert_eq!(data["coverages"], json!([]));
        assert!((confidence - 0.75).abs() < 1e-6);
    }

    #[test]
    fn modification_payload_round_trips() {
        let raw = json!({
            "endorsements": [{
                "endorsement_number": "CA T3 53",
                "modifications": [{
                    "impacted_coverage": "Covered Autos Liability",
                    "effect_category": "expands_coverage",
                    "verbatim_language": "blanket additional insured"
                }]
            }]
        });
        let (data, _) = ExtractorKind::EndorsementProvisions.map_response(raw);
        assert_eq!(
            data["endorsements"][0]["modifications"][0]["effect_category"],
            json!("expands_coverage")
        );
    }
}
