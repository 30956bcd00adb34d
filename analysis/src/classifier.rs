//! Rule-based page classification with near-duplicate detection.

use std::collections::HashMap;

use bindery_core::{PageClassification, PageSignal, PageType, SectionType};
use tracing::debug;

/// Minimum characters for a page to count as content at all.
const MIN_CONTENT_CHARS: usize = 40;

/// Confidence assigned to continuation pages inheriting the previous
/// section.
const CONTINUATION_CONFIDENCE: f32 = 0.4;

struct SectionRule {
    section: SectionType,
    /// Strong keywords; a hit anywhere on the page scores heavily.
    anchors: &'static [&'static str],
    /// Weak keywords; support an anchor hit or accumulate on their own.
    hints: &'static [&'static str],
}

const SECTION_RULES: &[SectionRule] = &[
    SectionRule {
        section: SectionType::Declarations,
        anchors: &["declarations", "dec page", "common policy declarations"],
        hints: &["policy number", "named insured", "policy period", "policy no"],
    },
    SectionRule {
        section: SectionType::InsuringAgreement,
        anchors: &["insuring agreement"],
        hints: &["we will pay", "in return for the payment of the premium"],
    },
    SectionRule {
        section: SectionType::Coverages,
        anchors: &["coverages", "coverage form", "limits of insurance"],
        hints: &["coverage", "limit of liability", "each occurrence"],
    },
    SectionRule {
        section: SectionType::Conditions,
        anchors: &["conditions"],
        hints: &["duties in the event", "cancellation", "policy conditions"],
    },
    SectionRule {
        section: SectionType::Exclusions,
        anchors: &["exclusions"],
        hints: &["this insurance does not apply", "we will not pay", "does not apply to"],
    },
    SectionRule {
        section: SectionType::Endorsements,
        anchors: &["this endorsement changes the policy", "endorsement"],
        hints: &["attached to and forming part", "policy change"],
    },
    SectionRule {
        section: SectionType::Definitions,
        anchors: &["definitions"],
        hints: &["means", "words and phrases"],
    },
    SectionRule {
        section: SectionType::PremiumSummary,
        anchors: &["premium summary", "schedule of premium"],
        hints: &["total premium", "premium amount", "taxes and fees"],
    },
    SectionRule {
        section: SectionType::Schedule,
        anchors: &["statement of values", "schedule of values", "schedule of locations"],
        hints: &["tiv", "total insured value", "building value"],
    },
    SectionRule {
        section: SectionType::LossRun,
        anchors: &["loss run", "loss history", "claim history"],
        hints: &["date of loss", "incurred", "claim number"],
    },
];

/// Rule classifier assigning each page a type, confidence, and
/// `should_process` flag, and marking near-duplicates of earlier pages.
#[derive(Debug, Clone, Default)]
pub struct PageClassifier;

impl PageClassifier {
    /// Creates a classifier.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Classifies all pages. Signals must be in page order; duplicate
    /// detection compares each fingerprint against already-seen pages.
    #[must_use]
    pub fn classify(&self, signals: &[PageSignal]) -> Vec<PageClassification> {
        let mut seen: HashMap<&str, u32> = HashMap::new();
        let mut previous_section: Option<SectionType> = None;
        let mut out = Vec::with_capacity(signals.len());

        for signal in signals {
            // Duplicate check comes first: a reprinted page should never
            // be processed twice regardless of its content type.
            if signal.char_count >= MIN_CONTENT_CHARS {
                if let Some(&original) = seen.get(signal.fingerprint.as_str()) {
                    debug!(
                        page = signal.page_number,
                        duplicate_of = original,
                        "near-duplicate page"
                    );
                    out.push(PageClassification {
                        page_number: signal.page_number,
                        page_type: PageType::Duplicate,
                        confidence: 0.95,
                        should_process: false,
                        duplicate_of: Some(original),
                    });
                    continue;
                }
                seen.insert(signal.fingerprint.as_str(), signal.page_number);
            }

            let classification = Self::classify_one(signal, previous_section);
            if let Some(section) = classification.page_type.section_type() {
                previous_section = Some(section);
            }
            out.push(classification);
        }

        out
    }

    fn classify_one(
        signal: &PageSignal,
        previous_section: Option<SectionType>,
    ) -> PageClassification {
        if signal.char_count < MIN_CONTENT_CHARS && !signal.has_tables {
            return PageClassification {
                page_number: signal.page_number,
                page_type: PageType::Boilerplate,
                confidence: 0.8,
                should_process: false,
                duplicate_of: None,
            };
        }

        let haystack = signal.top_text.to_lowercase();
        let mut best: Option<(SectionType, f32)> = None;

        for rule in SECTION_RULES {
            let anchor_hits = rule
                .anchors
                .iter()
                .filter(|kw| haystack.contains(*kw))
                .count();
            let hint_hits = rule.hints.iter().filter(|kw| haystack.contains(*kw)).count();
            if anchor_hits == 0 && hint_hits < 2 {
                continue;
            }
            let score = (0.55 * anchor_hits.min(2) as f32 / 2.0
                + 0.35 * hint_hits.min(3) as f32 / 3.0
                + 0.1)
                .min(1.0);
            if best.is_none_or(|(_, s)| score > s) {
                best = Some((rule.section, score));
            }
        }

        // Tabular pages with no textual match are schedules more often
        // than prose sections.
        if best.is_none() && signal.has_tables {
            best = Some((SectionType::Schedule, 0.35));
        }

        let (section, confidence) = best.unwrap_or_else(|| {
            previous_section.map_or((SectionType::Other, 0.2), |section| {
                (section, CONTINUATION_CONFIDENCE)
            })
        });

        PageClassification {
            page_number: signal.page_number,
            page_type: PageType::Section(section),
            confidence,
            should_process: true,
            duplicate_of: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::SignalExtractor;
    use bindery_core::{DocumentId, Page};

    fn classify_texts(texts: &[&str]) -> Vec<PageClassification> {
        let doc = DocumentId::generate();
        let pages: Vec<Page> = texts
            .iter()
            .enumerate()
            .map(|(i, text)| Page::new(doc, i as u32 + 1, *text, *text))
            .collect();
        PageClassifier::new().classify(&SignalExtractor::new().extract(&pages))
    }

    #[test]
    fn declarations_page_is_recognised() {
        let long_tail = "coverage details follow ".repeat(10);
        let text = format!(
            "COMMON POLICY DECLARATIONS\nPolicy Number: POL-123\nNamed Insured: Acme LLC\n{long_tail}"
        );
        let result = classify_texts(&[&text]);
        assert_eq!(
            result[0].page_type.section_type(),
            Some(SectionType::Declarations)
        );
        assert!(result[0].should_process);
        assert!(result[0].confidence > 0.5);
    }

    #[test]
    fn duplicate_pages_are_skipped() {
        let text = "THIS ENDORSEMENT CHANGES THE POLICY. PLEASE READ IT CAREFULLY. \
                    Blanket additional insured provisions apply per schedule.";
        let result = classify_texts(&[text, text]);
        assert_eq!(result[1].page_type, PageType::Duplicate);
        assert_eq!(result[1].duplicate_of, Some(1));
        assert!(!result[1].should_process);
    }

    #[test]
    fn near_empty_page_is_boilerplate() {
        let result = classify_texts(&["", "  \n "]);
        assert!(result.iter().all(|c| c.page_type == PageType::Boilerplate));
        assert!(result.iter().all(|c| !c.should_process));
    }

    #[test]
    fn continuation_inherits_previous_section() {
        let exclusions = "EXCLUSIONS\nThis insurance does not apply to bodily injury \
                          expected or intended from the standpoint of the insured.";
        let continuation = "arising out of the ownership, maintenance, use or entrustment \
                            to others of any aircraft, auto or watercraft owned or operated by the insured. \
                            Additional continuation language extends this page well past the content floor.";
        let result = classify_texts(&[exclusions, continuation]);
        assert_eq!(
            result[1].page_type.section_type(),
            Some(SectionType::Exclusions)
        );
        assert!((result[1].confidence - CONTINUATION_CONFIDENCE).abs() < f32::EPSILON);
    }
}
