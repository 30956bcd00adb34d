//! Text normalisation helpers shared by resolution and synthesis.

/// Normalises text for key comparison: lowercase, punctuation stripped,
/// whitespace collapsed to single spaces.
#[must_use]
pub fn normalize_key(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last_was_space = true;
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            out.extend(ch.to_lowercase());
            last_was_space = false;
        } else if (ch.is_whitespace() || ch == '-' || ch == '_') && !last_was_space {
            out.push(' ');
            last_was_space = true;
        }
    }
    while out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Builds a slug identifier: `prefix_normalised_name`, snake case, capped
/// at 64 characters.
#[must_use]
pub fn slugify(prefix: &str, name: &str) -> String {
    let body = normalize_key(name).replace(' ', "_");
    let slug = if prefix.is_empty() {
        body
    } else {
        format!("{prefix}_{body}")
    };
    slug.chars().take(64).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_folds_case_and_punctuation() {
        assert_eq!(normalize_key("Acme, LLC."), "acme llc");
        assert_eq!(normalize_key("  Covered   Autos-Liability "), "covered autos liability");
    }

    #[test]
    fn slugs_carry_prefix_and_cap() {
        assert_eq!(slugify("cov", "Covered Autos Liability"), "cov_covered_autos_liability");
        let long = slugify("excl", &"very long name ".repeat(20));
        assert!(long.len() <= 64);
    }

    #[test]
    fn empty_prefix_yields_bare_slug() {
        assert_eq!(slugify("", "Named Insured"), "named_insured");
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn normalization_is_idempotent(text in "[ -~]{0,120}") {
                let once = normalize_key(&text);
                prop_assert_eq!(normalize_key(&once), once.clone());
            }

            #[test]
            fn normalized_keys_never_carry_outer_spaces(text in "[ -~]{0,120}") {
                let key = normalize_key(&text);
                prop_assert!(!key.starts_with(' '));
                prop_assert!(!key.ends_with(' '));
            }

            #[test]
            fn slugs_respect_the_length_cap(prefix in "[a-z]{0,8}", name in "[ -~]{0,200}") {
                prop_assert!(slugify(&prefix, &name).chars().count() <= 64);
            }
        }
    }
}
