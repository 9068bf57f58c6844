//! Helpers for turning raw model text into typed values.

use serde::de::DeserializeOwned;

/// Removes a surrounding Markdown code fence (```json ... ```), if present.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. "json") on the opening line.
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest,
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

pub fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(strip_code_fences(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fences_with_and_without_language_tag() {
        assert_eq!(strip_code_fences("```json\n[1, 2]\n```"), "[1, 2]");
        assert_eq!(strip_code_fences("```\n{\"a\": 1}\n```\n"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("  [3]  "), "[3]");
    }

    #[test]
    fn unterminated_fence_keeps_the_body() {
        assert_eq!(strip_code_fences("```json\n[1]"), "[1]");
    }

    #[test]
    fn parse_json_reads_fenced_values() {
        let values: Vec<u32> = parse_json("```json\n[4, 5]\n```").unwrap();
        assert_eq!(values, vec![4, 5]);
    }
}
