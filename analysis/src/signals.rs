//! Lightweight per-page signal extraction.

use bindery_core::{Page, PageSignal};
use sha2::{Digest, Sha256};

/// Reference character count for a "dense" page; densities are expressed
/// relative to this.
const DENSITY_REFERENCE_CHARS: f32 = 3000.0;

/// Length of the normalised prefix hashed into the fingerprint.
const FINGERPRINT_PREFIX_CHARS: usize = 2000;

/// Length of the leading text kept for anchor display.
const TOP_TEXT_CHARS: usize = 160;

/// Computes per-page signals from a preview parse, without any model call.
#[derive(Debug, Clone, Default)]
pub struct SignalExtractor;

impl SignalExtractor {
    /// Creates a signal extractor.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Extracts one signal per page, in page order.
    #[must_use]
    pub fn extract(&self, pages: &[Page]) -> Vec<PageSignal> {
        pages.iter().map(|page| self.extract_one(page)).collect()
    }

    fn extract_one(&self, page: &Page) -> PageSignal {
        let text = page.text.trim();
        let char_count = text.chars().count();
        let word_count = text.split_whitespace().count();
        let line_count = text.lines().filter(|l| !l.trim().is_empty()).count();

        let has_tables =
            page.metadata.has_tables || !page.metadata.structural_tables.is_empty()
                || markdown_has_table(&page.markdown);

        PageSignal {
            page_number: page.page_number,
            text_density: (char_count as f32 / DENSITY_REFERENCE_CHARS).min(1.0),
            char_count,
            word_count,
            line_count,
            has_tables,
            fingerprint: fingerprint(text),
            top_text: text.chars().take(TOP_TEXT_CHARS).collect(),
        }
    }
}

/// Lexical fingerprint: sha256 over the lowercased, alphanumeric-only
/// prefix of the page text. Near-duplicate pages (reprints, copies of the
/// same endorsement) collapse to the same digest.
fn fingerprint(text: &str) -> String {
    let normalized: String = text
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .take(FINGERPRINT_PREFIX_CHARS)
        .collect();
    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}

/// A markdown table needs at least two pipe rows, one of them a separator.
fn markdown_has_table(markdown: &str) -> bool {
    let mut pipe_rows = 0usize;
    let mut separator_rows = 0usize;
    for line in markdown.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('|') && trimmed.ends_with('|') {
            pipe_rows += 1;
            if trimmed
                .trim_matches('|')
                .chars()
                .all(|c| matches!(c, '-' | ':' | '|' | ' '))
            {
                separator_rows += 1;
            }
        }
    }
    pipe_rows >= 2 && separator_rows >= 1
}

#[cfg(test)]
mod tests {
    use super::*;
    use bindery_core::DocumentId;

    fn page(number: u32, text: &str, markdown: &str) -> Page {
        Page::new(DocumentId::generate(), number, text, markdown)
    }

    #[test]
    fn identical_text_identical_fingerprint() {
        let extractor = SignalExtractor::new();
        let signals = extractor.extract(&[
            page(1, "This Endorsement Changes The Policy", ""),
            page(2, "this endorsement   changes the policy!", ""),
        ]);
        assert_eq!(signals[0].fingerprint, signals[1].fingerprint);
    }

    #[test]
    fn markdown_pipe_rows_flag_tables() {
        let extractor = SignalExtractor::new();
        let md = "| Loc | TIV |\n|---|---|\n| 1 | 100 |";
        let signals = extractor.extract(&[page(1, "schedule", md)]);
        assert!(signals[0].has_tables);
    }

    #[test]
    fn plain_prose_has_no_tables() {
        let extractor = SignalExtractor::new();
        let signals = extractor.extract(&[page(1, "just a paragraph | with one pipe", "prose")]);
        assert!(!signals[0].has_tables);
    }

    #[test]
    fn density_is_capped_at_one() {
        let extractor = SignalExtractor::new();
        let long = "x".repeat(10_000);
        let signals = extractor.extract(&[page(1, &long, "")]);
        assert!((signals[0].text_density - 1.0).abs() < f32::EPSILON);
    }
}
