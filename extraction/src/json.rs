//! Tolerant parsing of model JSON output.

use bindery_core::{BinderyError, Result};
use serde_json::Value;

/// Parses model output that should be JSON but may be wrapped in code
/// fences, prefixed with prose, or trailed by commentary.
///
/// # Errors
///
/// Returns [`BinderyError::MalformedLlm`] when no JSON value can be
/// recovered.
pub fn parse_json_tolerant(raw: &str) -> Result<Value> {
    let trimmed = raw.trim();

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Ok(value);
    }

    // Code fences: ```json ... ``` or bare ``` ... ```.
    if let Some(inner) = strip_code_fence(trimmed) {
        if let Ok(value) = serde_json::from_str::<Value>(inner.trim()) {
            return Ok(value);
        }
    }

    // Last resort: widest brace-balanced object or array slice.
    for open in ['{', '['] {
        if let Some(slice) = balanced_slice(trimmed, open) {
            if let Ok(value) = serde_json::from_str::<Value>(slice) {
                return Ok(value);
            }
        }
    }

    Err(BinderyError::MalformedLlm(format!(
        "no JSON value recoverable from {} chars of output",
        raw.len()
    )))
}

fn strip_code_fence(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after = &text[start + 3..];
    let body_start = after.find('\n').map_or(0, |i| i + 1);
    let body = &after[body_start..];
    let end = body.rfind("```")?;
    Some(&body[..end])
}

fn balanced_slice(text: &str, open: char) -> Option<&str> {
    let close = if open == '{' { '}' } else { ']' };
    let start = text.find(open)?;
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            c if c == open => depth += 1,
            c if c == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_json_parses() {
        assert_eq!(parse_json_tolerant(r#"{"a": 1}"#).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn fenced_json_parses() {
        let raw = "Here is the result:\n```json\n{\"policy_number\": \"POL-1\"}\n```\nDone.";
        assert_eq!(
            parse_json_tolerant(raw).unwrap(),
            json!({"policy_number": "POL-1"})
        );
    }

    #[test]
    fn embedded_object_is_recovered() {
        let raw = "The extraction yielded {\"coverages\": [{\"name\": \"Collision\"}]} overall.";
        assert_eq!(
            parse_json_tolerant(raw).unwrap(),
            json!({"coverages": [{"name": "Collision"}]})
        );
    }

    #[test]
    fn braces_inside_strings_do_not_confuse_the_scanner() {
        let raw = r#"noise {"note": "a { b } c"} trailing"#;
        assert_eq!(
            parse_json_tolerant(raw).unwrap(),
            json!({"note": "a { b } c"})
        );
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            parse_json_tolerant("not json at all"),
            Err(BinderyError::MalformedLlm(_))
        ));
    }
}
