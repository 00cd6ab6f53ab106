//! Model-response parsing: pull the JSON object out of the model's text.
//!
//! Even when told to answer with "ONLY a JSON object", vision models
//! sometimes wrap the object in ```` ```json ```` fences or add a sentence
//! before or after it. Parsing therefore runs in three steps:
//!
//! 1. Strip an outer code fence, if any
//! 2. Cut from the first `{` to the last `}`
//! 3. Parse with `serde_json` and require a top-level object

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*\s*\n(.*?)\n?```\s*$").unwrap());

/// Parse the model's text into a JSON object.
///
/// The error string describes what went wrong and is stored verbatim in the
/// resume's error column.
pub fn parse_object(text: &str) -> Result<Map<String, Value>, String> {
    let unfenced = strip_fences(text);
    let candidate = embedded_object(&unfenced).unwrap_or(unfenced.as_str());

    match serde_json::from_str::<Value>(candidate) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(format!(
            "expected a JSON object, got {}",
            json_kind(&other)
        )),
        Err(e) => Err(format!("invalid JSON ({e}); response began: {}", preview(text))),
    }
}

fn strip_fences(input: &str) -> String {
    let trimmed = input.trim();
    match RE_OUTER_FENCES.captures(trimmed) {
        Some(caps) => caps[1].trim().to_string(),
        None => trimmed.to_string(),
    }
}

/// The slice from the first `{` to the last `}`, when both exist in order.
fn embedded_object(s: &str) -> Option<&str> {
    let start = s.find('{')?;
    let end = s.rfind('}')?;
    (start < end).then(|| &s[start..=end])
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn preview(text: &str) -> String {
    const MAX: usize = 120;
    let t = text.trim();
    match t.char_indices().nth(MAX) {
        Some((cut, _)) => format!("{:?}\u{2026}", &t[..cut]),
        None => format!("{t:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_object() {
        let m = parse_object(r#"{"name": "Ada", "years": 7}"#).unwrap();
        assert_eq!(m["name"], json!("Ada"));
        assert_eq!(m["years"], json!(7));
    }

    #[test]
    fn fenced_object() {
        let m = parse_object("```json\n{\"a\": true}\n```").unwrap();
        assert_eq!(m["a"], json!(true));
        let m = parse_object("```\n{\"a\": 1}\n```\n").unwrap();
        assert_eq!(m["a"], json!(1));
    }

    #[test]
    fn object_with_surrounding_prose() {
        let m = parse_object("Here is the extraction:\n{\"a\": \"x\"}\nLet me know!").unwrap();
        assert_eq!(m["a"], json!("x"));
    }

    #[test]
    fn nested_braces_inside_strings_survive() {
        let m = parse_object(r#"{"skills": "C{++}", "n": {"k": 1}}"#).unwrap();
        assert_eq!(m["skills"], json!("C{++}"));
    }

    #[test]
    fn non_object_is_rejected() {
        let err = parse_object("[1, 2, 3]").unwrap_err();
        assert!(err.contains("an array"), "got: {err}");
        let err = parse_object("42").unwrap_err();
        assert!(err.contains("a number"), "got: {err}");
    }

    #[test]
    fn garbage_is_rejected_with_preview() {
        let err = parse_object("I'm sorry, I can't read this resume.").unwrap_err();
        assert!(err.contains("invalid JSON"), "got: {err}");
        assert!(err.contains("I'm sorry"), "got: {err}");
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        let long = "é".repeat(500);
        let p = preview(&long);
        assert!(p.ends_with('\u{2026}'));
        assert!(p.chars().count() < 200);
    }
}
