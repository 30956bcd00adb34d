//! Token estimation without a tokenizer dependency.

use unicode_segmentation::UnicodeSegmentation;

/// Estimates the token count of `text`.
///
/// Subword tokenizers average roughly three tokens per four words of
/// English prose; the estimate only has to be stable and monotone for
/// budget decisions, not exact.
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    let words = text.unicode_words().count();
    (words * 4).div_ceil(3)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_has_zero_tokens() {
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn estimate_grows_with_words() {
        let short = estimate_tokens("one two three");
        let long = estimate_tokens("one two three four five six");
        assert!(long > short);
        assert_eq!(short, 4);
    }

    #[test]
    fn estimate_is_deterministic() {
        let text = "Coverage applies per the schedule of values attached hereto.";
        assert_eq!(estimate_tokens(text), estimate_tokens(text));
    }
}
