//! Pull the first valid JSON object out of freeform model text.
//!
//! Models wrap JSON in markdown fences, add commentary before or after it,
//! or emit it inline. Rather than anchoring on a fence, scan for the first
//! `{` and grow the candidate until a matching, balanced, string-aware `}`
//! is found, then let `serde_json` be the arbiter of validity.

/// Extract the first valid JSON object from `text`, trying each `{` in
/// turn until one produces a balanced, parseable object.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let cleaned = strip_code_fences(text);
    let bytes = cleaned.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' {
            if let Some(end) = find_matching_brace(cleaned, i) {
                let candidate = &cleaned[i..=end];
                if serde_json::from_str::<serde_json::Value>(candidate).is_ok() {
                    return Some(candidate);
                }
            }
        }
        i += 1;
    }
    None
}

fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix("```json") {
        if let Some(inner) = rest.strip_suffix("```") {
            return inner.trim();
        }
    }
    if let Some(rest) = trimmed.strip_prefix("```") {
        if let Some(inner) = rest.strip_suffix("```") {
            return inner.trim();
        }
    }
    trimmed
}

fn find_matching_brace(text: &str, start: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, &b) in bytes.iter().enumerate().skip(start) {
        if escape_next {
            escape_next = false;
            continue;
        }
        if b == b'\\' && in_string {
            escape_next = true;
            continue;
        }
        if b == b'"' {
            in_string = !in_string;
            continue;
        }
        if in_string {
            continue;
        }
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
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

    #[test]
    fn extract_json_from_clean_text() {
        assert_eq!(
            extract_json_object(r#"{"type":"ReadFile","path":"a.rs"}"#),
            Some(r#"{"type":"ReadFile","path":"a.rs"}"#)
        );
    }

    #[test]
    fn extract_json_from_markdown_fence() {
        let text = "```json\n{\"type\":\"ReadFile\",\"path\":\"a.rs\"}\n```";
        assert_eq!(
            extract_json_object(text),
            Some(r#"{"type":"ReadFile","path":"a.rs"}"#)
        );
    }

    #[test]
    fn extract_json_with_surrounding_text() {
        let text = "Sure, I'll read that file.\n{\"type\":\"ReadFile\",\"path\":\"a.rs\"}\nLet me know.";
        assert_eq!(
            extract_json_object(text),
            Some(r#"{"type":"ReadFile","path":"a.rs"}"#)
        );
    }

    #[test]
    fn extract_json_handles_strings_with_braces() {
        let text = r#"{"type":"EditFile","content":"if (x) { return 1; }"}"#;
        assert_eq!(extract_json_object(text), Some(text));
    }

    #[test]
    fn extract_json_returns_none_for_no_json() {
        assert_eq!(extract_json_object("just some prose"), None);
    }
}
