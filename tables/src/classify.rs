//! Rules-based table classification.

use std::sync::LazyLock;

use bindery_core::{TableClassification, TableJson, TableKind};
use regex::Regex;
use tracing::debug;

static POLICY_NUMBER_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)policy\s*number|policy\s*#").unwrap_or_else(|_| unreachable!())
});

struct ClassificationRule {
    kind: TableKind,
    header_keywords: &'static [&'static str],
    column_keywords: &'static [&'static str],
    min_matches: usize,
}

const RULES: &[ClassificationRule] = &[
    ClassificationRule {
        kind: TableKind::PropertySov,
        header_keywords: &[
            "statement of values",
            "sov",
            "schedule of values",
            "location",
            "address",
            "building",
            "contents",
            "tiv",
            "total insured value",
            "total stated values",
            "scheduled locations",
            "schedule of locations",
        ],
        column_keywords: &[
            "loc",
            "loc #",
            "loc#",
            "location",
            "address",
            "bldg",
            "bldg #",
            "building",
            "building value",
            "contents",
            "business personal property",
            "tenant improvements",
            "business income",
            "extra expense",
            "bi",
            "tiv",
            "total",
            "total values",
            "insured value",
            "total insured value",
            "description",
            "distance to coast",
            "flood zone",
            "construction",
            "occupancy",
            "year built",
            "square feet",
            "sq ft",
        ],
        min_matches: 2,
    },
    ClassificationRule {
        kind: TableKind::LossRun,
        header_keywords: &[
            "loss run",
            "claims",
            "loss history",
            "claim history",
            "claim summary",
            "loss summary",
            "claims report",
        ],
        column_keywords: &[
            "claim",
            "claim #",
            "claim number",
            "loss date",
            "date of loss",
            "incurred",
            "paid",
            "reserve",
            "status",
            "cause",
            "cause of loss",
            "claimant",
            "adjuster",
            "settlement",
        ],
        min_matches: 2,
    },
    ClassificationRule {
        kind: TableKind::InlandMarineSchedule,
        header_keywords: &["inland marine", "schedule", "equipment", "machinery"],
        column_keywords: &["item", "description", "location", "value", "coverage"],
        min_matches: 2,
    },
    ClassificationRule {
        kind: TableKind::AutoSchedule,
        header_keywords: &["auto", "vehicle", "fleet", "schedule"],
        column_keywords: &["year", "make", "model", "vin", "value", "coverage"],
        min_matches: 3,
    },
    ClassificationRule {
        kind: TableKind::PremiumSchedule,
        header_keywords: &["premium", "coverage", "limit", "premium amount"],
        column_keywords: &["coverage", "limit", "premium", "deductible", "rate"],
        min_matches: 2,
    },
];

/// Classifies captured tables by header and column keywords, with the
/// page text as a weak context signal.
#[derive(Debug, Clone, Default)]
pub struct TableClassifier;

impl TableClassifier {
    /// Creates a classifier.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Classifies one table.
    #[must_use]
    pub fn classify(&self, table: &TableJson, page_context: Option<&str>) -> TableClassification {
        let headers = table.headers();
        if headers.is_empty() {
            return TableClassification {
                table_id: table.table_id.clone(),
                kind: TableKind::Other,
                confidence: 0.0,
                reasoning: "No headers found".to_owned(),
            };
        }

        let header_text = headers.join(" ").to_lowercase();
        let mut all_text = header_text.clone();
        if let Some(context) = page_context {
            all_text.push(' ');
            all_text.push_str(&context.to_lowercase());
        }

        let mut best: Option<(&ClassificationRule, f32)> = None;
        for rule in RULES {
            let score = match_score(rule, &header_text, &all_text, table);
            if best.is_none_or(|(_, s)| score > s) {
                best = Some((rule, score));
            }
        }

        let Some((rule, score)) = best else {
            return TableClassification {
                table_id: table.table_id.clone(),
                kind: TableKind::Other,
                confidence: 0.0,
                reasoning: "No classification rules".to_owned(),
            };
        };

        // SOV headers overlap with policy-info tables; a policy-number
        // column disqualifies the classification outright.
        if rule.kind == TableKind::PropertySov && POLICY_NUMBER_HEADER.is_match(&header_text) {
            return TableClassification {
                table_id: table.table_id.clone(),
                kind: TableKind::Other,
                confidence: 0.0,
                reasoning: "Headers contain 'policy number' - likely not an SOV table".to_owned(),
            };
        }

        let min_confidence = if rule.kind == TableKind::PropertySov { 0.5 } else { 0.3 };
        if score >= min_confidence {
            TableClassification {
                table_id: table.table_id.clone(),
                kind: rule.kind,
                confidence: score.min(1.0),
                reasoning: format!("Matched {} rule with score {score:.2}", rule.kind.as_str()),
            }
        } else {
            TableClassification {
                table_id: table.table_id.clone(),
                kind: TableKind::Other,
                confidence: 0.0,
                reasoning: format!(
                    "No matching classification rule (best score: {score:.2}, required: {min_confidence})"
                ),
            }
        }
    }
}

fn match_score(
    rule: &ClassificationRule,
    header_text: &str,
    all_text: &str,
    table: &TableJson,
) -> f32 {
    let mut score = 0.0f32;

    // Header keywords appearing in surrounding page text (a "STATEMENT OF
    // VALUES" heading) are a strong signal.
    let context_matches = rule
        .header_keywords
        .iter()
        .filter(|kw| all_text.contains(*kw) && !header_text.contains(*kw))
        .count();
    if context_matches > 0 {
        score += 0.35 * context_matches.min(2) as f32 / 2.0;
    }

    let column_matches = rule
        .column_keywords
        .iter()
        .filter(|kw| header_text.contains(*kw))
        .count();
    if column_matches > 0 {
        let expected = rule.column_keywords.len().min(5);
        score += 0.45 * column_matches.min(expected) as f32 / expected as f32;
    }

    let total_matches = context_matches + column_matches;
    if total_matches < rule.min_matches {
        score *= 0.5;
    } else {
        score += 0.1;
    }

    match rule.kind {
        TableKind::PropertySov if table.num_cols >= 5 => score += 0.1,
        TableKind::LossRun if table.num_cols >= 6 => score += 0.1,
        _ => {}
    }

    debug!(
        kind = rule.kind.as_str(),
        context_matches,
        column_matches,
        score,
        "classification score"
    );

    score.min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::parse_markdown_tables;
    use bindery_core::DocumentId;

    fn table_with_headers(headers: &[&str]) -> TableJson {
        let header_row = format!("| {} |", headers.join(" | "));
        let separator = format!("|{}|", vec!["---"; headers.len()].join("|"));
        let body = format!("| {} |", vec!["x"; headers.len()].join(" | "));
        let md = format!("{header_row}\n{separator}\n{body}");
        parse_markdown_tables(DocumentId::generate(), 1, &md)
            .pop()
            .unwrap()
    }

    #[test]
    fn sov_table_classifies_with_context() {
        let table = table_with_headers(&[
            "Loc #",
            "Address",
            "Building Value",
            "Contents",
            "TIV",
        ]);
        let result =
            TableClassifier::new().classify(&table, Some("STATEMENT OF VALUES for all locations"));
        assert_eq!(result.kind, TableKind::PropertySov);
        assert!(result.confidence >= 0.5);
    }

    #[test]
    fn policy_number_header_disqualifies_sov() {
        let table = table_with_headers(&["Policy Number", "Effective Date", "Premium"]);
        let result = TableClassifier::new().classify(&table, Some("statement of values"));
        assert_eq!(result.kind, TableKind::Other);
        assert!(result.confidence.abs() < f32::EPSILON);
    }

    #[test]
    fn loss_run_table_classifies() {
        let table = table_with_headers(&[
            "Claim Number",
            "Date of Loss",
            "Cause of Loss",
            "Paid",
            "Reserve",
            "Incurred",
        ]);
        let result = TableClassifier::new().classify(&table, Some("LOSS RUN report"));
        assert_eq!(result.kind, TableKind::LossRun);
        assert!(result.confidence >= 0.3);
    }

    #[test]
    fn headerless_table_is_other() {
        let mut table = table_with_headers(&["A", "B"]);
        table.cells.retain(|c| !c.is_header);
        let result = TableClassifier::new().classify(&table, None);
        assert_eq!(result.kind, TableKind::Other);
        assert_eq!(result.reasoning, "No headers found");
    }
}
