//! Deterministic regex parser backstopping LLM entity extraction.

use std::collections::HashSet;
use std::sync::LazyLock;

use bindery_core::{EntityMention, EntityType, MentionSource};
use chrono::NaiveDate;
use regex::Regex;
use serde_json::json;
use tracing::debug;

fn regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|_| unreachable!())
}

static POLICY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        // POL-123-456, POLICY-ABC-123, POLICY NO. X-1
        regex(r"(?i)\b(?:POL|POLICY)\b[-\s]?(?:NO\.?|NUMBER)?[-\s:]?\s*([A-Z0-9][A-Z0-9-]+)"),
        // Policy No: ABC123
        regex(r"(?i)Policy\s+(?:No\.?|Number):\s*([A-Z0-9-]+)"),
        // Conservative standalone codes: two-to-four letters then digits.
        regex(r"\b([A-Z]{2,4}[-/]?\d{4,10})\b"),
    ]
});

static INSURED_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        regex(r"(?im)(?:NAMED\s+INSURED|INSURED):\s*([A-Za-z][A-Za-z\s,\.&'\-]+?)(?:\n|$|;)"),
        regex(r"(?im)Insured\s+Name:\s*([A-Za-z][A-Za-z\s,\.&'\-]+?)(?:\n|$|;)"),
        regex(r"(?im)Name\s+of\s+Insured:\s*([A-Za-z][A-Za-z\s,\.&'\-]+?)(?:\n|$|;)"),
    ]
});

static DATE_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    vec![
        (regex(r"\b(\d{4}-\d{2}-\d{2})\b"), "%Y-%m-%d"),
        (regex(r"\b(\d{1,2}/\d{1,2}/\d{4})\b"), "%m/%d/%Y"),
        (regex(r"\b(\d{1,2}[-.]\d{1,2}[-.]\d{4})\b"), "%d-%m-%Y"),
        (
            regex(r"(?i)\b((?:January|February|March|April|May|June|July|August|September|October|November|December)\s+\d{1,2},\s+\d{4})\b"),
            "%B %d, %Y",
        ),
    ]
});

static EFFECTIVE_CONTEXT: LazyLock<Regex> =
    LazyLock::new(|| regex(r"(?i)effective|inception|from"));
static EXPIRATION_CONTEXT: LazyLock<Regex> =
    LazyLock::new(|| regex(r"(?i)expir|to|until|through"));

/// Carriers recognised by proper name. Extendable at construction.
const KNOWN_CARRIERS: &[&str] = &[
    "Travelers",
    "The Hartford",
    "Liberty Mutual",
    "Chubb",
    "Zurich North America",
    "CNA",
    "Nationwide",
    "Berkshire Hathaway",
    "AIG",
    "Great American Insurance",
    "Cincinnati Insurance",
    "Westfield Insurance",
    "Erie Insurance",
    "Auto-Owners Insurance",
];

/// Pattern-based entity parser.
///
/// Yields [`EntityMention`]s with span offsets and pattern-class-dependent
/// confidences. The reconciler fills gaps in the LLM output with these;
/// LLM mentions win ties.
#[derive(Debug, Clone)]
pub struct DeterministicParser {
    carriers: Vec<String>,
}

impl Default for DeterministicParser {
    fn default() -> Self {
        Self::new()
    }
}

impl DeterministicParser {
    /// Creates a parser with the built-in carrier list.
    #[must_use]
    pub fn new() -> Self {
        Self {
            carriers: KNOWN_CARRIERS.iter().map(|s| (*s).to_owned()).collect(),
        }
    }

    /// Adds carrier names beyond the built-in list.
    #[must_use]
    pub fn with_carriers(mut self, additional: impl IntoIterator<Item = String>) -> Self {
        self.carriers.extend(additional);
        self
    }

    /// Parses all entity kinds from the text.
    #[must_use]
    pub fn parse_all(&self, text: &str) -> Vec<EntityMention> {
        let mut out = Vec::new();
        out.extend(self.parse_policy_numbers(text));
        out.extend(self.parse_insured_names(text));
        out.extend(self.parse_dates(text, EntityType::EffectiveDate));
        out.extend(self.parse_dates(text, EntityType::ExpirationDate));
        out.extend(self.parse_carriers(text));
        debug!(count = out.len(), "deterministic parse complete");
        out
    }

    /// Parses policy numbers. Values must mix letters and digits.
    #[must_use]
    pub fn parse_policy_numbers(&self, text: &str) -> Vec<EntityMention> {
        let mut out = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for pattern in POLICY_PATTERNS.iter() {
            for captures in pattern.captures_iter(text) {
                let Some(group) = captures.get(1) else { continue };
                let value = group.as_str().trim().trim_end_matches('-');
                let normalized = value.to_uppercase().replace(' ', "");
                if normalized.is_empty() || !seen.insert(normalized.clone()) {
                    continue;
                }
                let has_alpha = normalized.chars().any(|c| c.is_ascii_alphabetic());
                let has_digit = normalized.chars().any(|c| c.is_ascii_digit());
                if !(has_alpha && has_digit) {
                    continue;
                }
                let full = captures.get(0).map_or("", |m| m.as_str());
                let confidence = policy_confidence(full, &normalized);
                let mention = EntityMention::new(
                    EntityType::Policy,
                    full.trim(),
                    normalized.clone(),
                    confidence,
                    MentionSource::Deterministic,
                )
                .with_attribute("policy_number", json!(normalized));
                out.push(EntityMention {
                    span: Some((group.start(), group.end())),
                    ..mention
                });
            }
        }
        out
    }

    /// Parses named-insured phrases.
    #[must_use]
    pub fn parse_insured_names(&self, text: &str) -> Vec<EntityMention> {
        let mut out = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for pattern in INSURED_PATTERNS.iter() {
            for captures in pattern.captures_iter(text) {
                let Some(group) = captures.get(1) else { continue };
                let mut value = group.as_str().split_whitespace().collect::<Vec<_>>().join(" ");
                while value.ends_with(['.', ',', ';']) {
                    value.pop();
                }
                if value.len() < 3 || !seen.insert(value.to_lowercase()) {
                    continue;
                }
                let full = captures.get(0).map_or("", |m| m.as_str());
                let confidence = insured_confidence(full);
                let mention = EntityMention::new(
                    EntityType::Organization,
                    full.trim(),
                    value.clone(),
                    confidence,
                    MentionSource::Deterministic,
                )
                .with_attribute("role", json!("insured"));
                out.push(EntityMention {
                    span: Some((group.start(), group.end())),
                    ..mention
                });
            }
        }
        out
    }

    /// Parses dates of the given kind. Values normalise to ISO.
    #[must_use]
    pub fn parse_dates(&self, text: &str, kind: EntityType) -> Vec<EntityMention> {
        let context = match kind {
            EntityType::ExpirationDate => &EXPIRATION_CONTEXT,
            _ => &EFFECTIVE_CONTEXT,
        };
        let mut out = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for (pattern, format) in DATE_PATTERNS.iter() {
            for captures in pattern.captures_iter(text) {
                let Some(group) = captures.get(1) else { continue };
                let normalized_input = group.as_str().replace('.', "-");
                let Ok(date) = NaiveDate::parse_from_str(&normalized_input, format) else {
                    continue;
                };
                let iso = date.format("%Y-%m-%d").to_string();
                if !seen.insert(iso.clone()) {
                    continue;
                }
                // Only emit when nearby text supports the date kind; a bare
                // date is ambiguous between effective and expiration.
                let mut window_start = group.start().saturating_sub(40);
                while !text.is_char_boundary(window_start) {
                    window_start += 1;
                }
                let window = &text[window_start..group.start()];
                if !context.is_match(window) {
                    continue;
                }
                let confidence = if *format == "%Y-%m-%d" { 0.8 } else { 0.7 };
                let mention = EntityMention::new(
                    kind,
                    group.as_str(),
                    iso,
                    confidence,
                    MentionSource::Deterministic,
                );
                out.push(EntityMention {
                    span: Some((group.start(), group.end())),
                    ..mention
                });
            }
        }
        out
    }

    /// Matches known carrier proper names, case-insensitively.
    #[must_use]
    pub fn parse_carriers(&self, text: &str) -> Vec<EntityMention> {
        let mut out = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for carrier in &self.carriers {
            let pattern = regex(&format!(r"(?i)\b{}\b", regex::escape(carrier)));
            for found in pattern.find_iter(text) {
                if !seen.insert(carrier.to_lowercase()) {
                    continue;
                }
                let mention = EntityMention::new(
                    EntityType::Organization,
                    found.as_str(),
                    carrier.clone(),
                    0.9,
                    MentionSource::Deterministic,
                )
                .with_attribute("role", json!("carrier"));
                out.push(EntityMention {
                    span: Some((found.start(), found.end())),
                    ..mention
                });
            }
        }
        out
    }
}

fn policy_confidence(full_match: &str, value: &str) -> f32 {
    static LABELLED: LazyLock<Regex> =
        LazyLock::new(|| regex(r"(?i)policy\s+(?:no|number)"));
    if LABELLED.is_match(full_match) {
        0.9
    } else if value.starts_with("POL") {
        0.8
    } else {
        0.6
    }
}

fn insured_confidence(full_match: &str) -> f32 {
    let lower = full_match.to_lowercase();
    if lower.contains("named insured") {
        0.9
    } else if lower.contains("insured name") {
        0.85
    } else {
        0.8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labelled_policy_number_scores_high() {
        let parser = DeterministicParser::new();
        let mentions = parser.parse_policy_numbers("Policy Number: POL-123-456");
        assert_eq!(mentions.len(), 1);
        assert_eq!(mentions[0].normalized_value, "POL-123-456");
        assert!((mentions[0].confidence - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn numeric_only_codes_are_rejected() {
        let parser = DeterministicParser::new();
        let mentions = parser.parse_policy_numbers("Policy Number: 1234567");
        assert!(mentions.is_empty());
    }

    #[test]
    fn named_insured_parses_and_cleans() {
        let parser = DeterministicParser::new();
        let mentions = parser.parse_insured_names("NAMED INSURED: Acme Widgets,  LLC.\nAddress: ...");
        assert_eq!(mentions.len(), 1);
        assert_eq!(mentions[0].normalized_value, "Acme Widgets, LLC");
        assert!((mentions[0].confidence - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn effective_date_needs_supporting_context() {
        let parser = DeterministicParser::new();
        let with_context = parser.parse_dates("Effective Date: 2024-01-01", EntityType::EffectiveDate);
        assert_eq!(with_context.len(), 1);
        assert_eq!(with_context[0].normalized_value, "2024-01-01");

        let bare = parser.parse_dates("Issued 2024-01-01", EntityType::EffectiveDate);
        assert!(bare.is_empty());
    }

    #[test]
    fn us_dates_normalise_to_iso() {
        let parser = DeterministicParser::new();
        let mentions = parser.parse_dates("Effective 01/15/2024", EntityType::EffectiveDate);
        assert_eq!(mentions[0].normalized_value, "2024-01-15");
    }

    #[test]
    fn known_carrier_matches_case_insensitively() {
        let parser = DeterministicParser::new();
        let mentions = parser.parse_carriers("issued by TRAVELERS on behalf of the insured");
        assert_eq!(mentions.len(), 1);
        assert_eq!(mentions[0].normalized_value, "Travelers");
        assert_eq!(
            mentions[0].attributes.get("role").and_then(|v| v.as_str()),
            Some("carrier")
        );
    }

    #[test]
    fn parse_all_spans_every_family() {
        let parser = DeterministicParser::new();
        let text = "Policy No: POL-9\nNAMED INSURED: Acme LLC\nEffective 2024-01-01 to 2025-01-01\nCarrier: Chubb";
        let mentions = parser.parse_all(text);
        let types: HashSet<EntityType> = mentions.iter().map(|m| m.entity_type).collect();
        assert!(types.contains(&EntityType::Policy));
        assert!(types.contains(&EntityType::Organization));
        assert!(types.contains(&EntityType::EffectiveDate));
        assert!(types.contains(&EntityType::ExpirationDate));
    }
}
