// SPDX-FileCopyrightText: 2026 Waypoint Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Extraction of JSON values from model output.
//!
//! Models wrap JSON in Markdown fences, prefix it with prose, or trail it with
//! commentary. [`extract_json`] tries, in order: the whole text, the body of
//! the first fenced block, every balanced `{...}` substring from left to
//! right, and only then balanced `[...]` substrings. Every caller wants an
//! object, so a stray list in the prose never shadows one. No component
//! parses model text itself.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::WaypointError;

/// Extract the first JSON value embedded in `text`.
pub fn extract_json(text: &str) -> Result<Value, WaypointError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(WaypointError::parse("model returned an empty response"));
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        if value.is_object() || value.is_array() {
            return Ok(value);
        }
    }

    if let Some(fenced) = strip_fences(trimmed) {
        if let Ok(value) = serde_json::from_str::<Value>(fenced.trim()) {
            return Ok(value);
        }
    }

    if let Some(value) = first_embedded(trimmed, '{').or_else(|| first_embedded(trimmed, '[')) {
        return Ok(value);
    }

    Err(WaypointError::parse(format!(
        "no JSON object found in model output ({} chars)",
        trimmed.len()
    )))
}

/// Extract and deserialize into `T`.
pub fn extract_json_as<T: DeserializeOwned>(text: &str) -> Result<T, WaypointError> {
    let value = extract_json(text)?;
    serde_json::from_value(value)
        .map_err(|e| WaypointError::parse(format!("unexpected JSON shape: {e}")))
}

/// First balanced substring opening with `open` that parses as JSON.
fn first_embedded(text: &str, open: char) -> Option<Value> {
    let mut start = 0;
    while let Some(offset) = text[start..].find(open) {
        let at = start + offset;
        if let Some(end) = balanced_end(text, at) {
            if let Ok(value) = serde_json::from_str::<Value>(&text[at..=end]) {
                return Some(value);
            }
        }
        start = at + 1;
    }
    None
}

/// Return the body of the first ```` ``` ```` fenced block, if any.
fn strip_fences(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after = &text[open + 3..];
    // Skip the optional language tag on the fence line.
    let body_start = after.find('\n').map(|i| i + 1).unwrap_or(0);
    let body = &after[body_start..];
    let close = body.find("```").unwrap_or(body.len());
    Some(&body[..close])
}

/// Index of the bracket closing the one at `open`, honouring string literals.
fn balanced_end(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut stack: Vec<u8> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, &b) in bytes.iter().enumerate().skip(open) {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => stack.push(b'}'),
            b'[' => stack.push(b']'),
            b'}' | b']' => {
                if stack.pop() != Some(b) {
                    return None;
                }
                if stack.is_empty() {
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
    use proptest::prelude::*;
    use serde::Deserialize;
    use serde_json::json;

    use super::*;

    #[test]
    fn plain_object() {
        let v = extract_json(r#"{"a": 1}"#).unwrap();
        assert_eq!(v, json!({"a": 1}));
    }

    #[test]
    fn fenced_with_language_tag() {
        let text = "Here you go:\n```json\n{\"vibe\": \"Coastal\"}\n```\nEnjoy!";
        assert_eq!(extract_json(text).unwrap(), json!({"vibe": "Coastal"}));
    }

    #[test]
    fn prose_around_object() {
        let text = "Sure! The persona is {\"pace\": \"Slow\", \"tags\": [\"a\", \"b\"]} as requested.";
        assert_eq!(
            extract_json(text).unwrap(),
            json!({"pace": "Slow", "tags": ["a", "b"]})
        );
    }

    #[test]
    fn braces_inside_strings_do_not_confuse_balancing() {
        let text = r#"note {"critique": "uses } and { freely", "score": 0.8} end"#;
        let v = extract_json(text).unwrap();
        assert_eq!(v["score"], json!(0.8));
    }

    #[test]
    fn skips_unparseable_leading_braces() {
        let text = "{not json} then {\"ok\": true}";
        assert_eq!(extract_json(text).unwrap(), json!({"ok": true}));
    }

    #[test]
    fn objects_win_over_earlier_lists() {
        let text = r#"scores [1, 2] then {"vibe": "Coastal", "pace": "Slow"}"#;
        assert_eq!(
            extract_json(text).unwrap(),
            json!({"vibe": "Coastal", "pace": "Slow"})
        );
        assert_eq!(extract_json("tags: [\"a\", \"b\"] only").unwrap(), json!(["a", "b"]));
        assert_eq!(extract_json("[1, 2]").unwrap(), json!([1, 2]));
    }

    #[test]
    fn empty_and_garbage_are_parse_errors() {
        let err = extract_json("   ").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::ParseError);
        let err = extract_json("no braces here").unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::ParseError);
        assert!(extract_json("{\"unterminated\": ").is_err());
    }

    #[test]
    fn typed_extraction_reports_shape_errors() {
        #[derive(Deserialize)]
        struct Out {
            #[allow(dead_code)]
            content: String,
        }
        assert!(extract_json_as::<Out>(r#"{"content": "x"}"#).is_ok());
        let err = extract_json_as::<Out>(r#"{"other": 1}"#)
            .err()
            .expect("shape mismatch");
        assert!(err.to_string().contains("unexpected JSON shape"));
    }

    proptest! {
        #[test]
        fn never_panics(s in "\\PC*") {
            let _ = extract_json(&s);
        }

        #[test]
        fn finds_object_behind_prose(prefix in "[a-zA-Z ,.!]{0,40}", n in 0i64..1000) {
            let text = format!("{prefix} {{\"n\": {n}}} trailing");
            let v = extract_json(&text).unwrap();
            prop_assert_eq!(v["n"].as_i64(), Some(n));
        }
    }
}
