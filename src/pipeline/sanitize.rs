//! Sanitisation: coerce raw model answers to their declared type and make
//! text safe for a spreadsheet cell.
//!
//! Coercion is total. Every `(raw value, declared type)` pair yields either a
//! well-typed [`FieldValue`] or the sentinel [`FieldValue::Invalid`], which
//! records what the model said and what was expected. A bad field never
//! fails the resume it belongs to.
//!
//! ## Text rules (applied in order)
//!
//! 1. Typographic bullets become `-`
//! 2. Smart quotes become ASCII quotes, en/em dashes become `-`
//! 3. Invisible characters (zero-width spaces, BOM, soft hyphen) are removed
//! 4. Every other control character (newline, tab, CR, …) becomes a space
//! 5. Runs of whitespace collapse to one space; the ends are trimmed
//!
//! Embedded commas and quotes are kept: the CSV and JSON writers escape
//! them. Non-ASCII letters are kept as well.

use crate::job::{FieldType, JobConfig};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

/// Prefix of the CSV rendering of [`FieldValue::Invalid`].
pub const INVALID_MARKER: &str = "#INVALID";

/// A sanitised, typed answer.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// The model had no answer (JSON `null`, empty string, or absent key).
    Null,
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// The answer could not be coerced to the declared type.
    Invalid { raw: String, expected: FieldType },
}

impl FieldValue {
    pub fn is_invalid(&self) -> bool {
        matches!(self, FieldValue::Invalid { .. })
    }

    /// Cell text for CSV output. `Null` renders as an empty cell.
    pub fn to_cell(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => Ok(()),
            FieldValue::String(s) => f.write_str(s),
            FieldValue::Int(i) => write!(f, "{i}"),
            FieldValue::Float(x) => write!(f, "{x}"),
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::Invalid { raw, expected } => {
                write!(f, "{INVALID_MARKER}({expected}): {raw}")
            }
        }
    }
}

/// JSON shape: plain scalars, `null`, or
/// `{"invalid": "<raw>", "expected": "<type>"}` for the sentinel.
impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Null => serializer.serialize_none(),
            FieldValue::String(s) => serializer.serialize_str(s),
            FieldValue::Int(i) => serializer.serialize_i64(*i),
            FieldValue::Float(x) => serializer.serialize_f64(*x),
            FieldValue::Bool(b) => serializer.serialize_bool(*b),
            FieldValue::Invalid { raw, expected } => {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("invalid", raw)?;
                map.serialize_entry("expected", expected.as_str())?;
                map.end()
            }
        }
    }
}

/// Coerce one raw answer to `field_type`.
///
/// `field` is only used to label the warning logged for invalid values.
pub fn coerce(field: &str, raw: &Value, field_type: FieldType) -> FieldValue {
    if is_blank(raw) {
        return FieldValue::Null;
    }

    let value = match field_type {
        FieldType::String => Some(FieldValue::String(sanitize_text(&value_to_text(raw)))),
        FieldType::Int => coerce_int(raw).map(FieldValue::Int),
        FieldType::Float => coerce_float(raw).map(FieldValue::Float),
        FieldType::Bool => coerce_bool(raw).map(FieldValue::Bool),
    };

    value.unwrap_or_else(|| {
        let raw_text = sanitize_text(&value_to_text(raw));
        warn!("Could not convert '{field}' to {field_type}: {raw_text}");
        FieldValue::Invalid {
            raw: raw_text,
            expected: field_type,
        }
    })
}

/// Coerce every configured field of one answer object.
///
/// Fields the model left out become [`FieldValue::Null`]; keys that match no
/// question are dropped.
pub fn sanitize_answers(job: &JobConfig, answers: &Map<String, Value>) -> BTreeMap<String, FieldValue> {
    job.questions
        .iter()
        .map(|q| {
            let value = answers
                .get(&q.field)
                .map_or(FieldValue::Null, |raw| coerce(&q.field, raw, q.field_type));
            (q.field.clone(), value)
        })
        .collect()
}

fn is_blank(raw: &Value) -> bool {
    match raw {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Integers accept whole numbers and finite decimals, truncated toward zero
/// (`"7.5"` → 7). Booleans are not numbers.
fn coerce_int(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().and_then(truncate_to_i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(truncate_to_i64))
        }
        _ => None,
    }
}

fn truncate_to_i64(x: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, which is itself out of range
    if x.is_finite() && x >= i64::MIN as f64 && x < i64::MAX as f64 {
        Some(x.trunc() as i64)
    } else {
        None
    }
}

fn coerce_float(raw: &Value) -> Option<f64> {
    let x = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    x.is_finite().then_some(x)
}

fn coerce_bool(raw: &Value) -> Option<bool> {
    match raw {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(1) => Some(true),
            Some(0) => Some(false),
            _ => None,
        },
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Flatten any JSON value into display text.
///
/// Lists (a common answer shape for "top 3 strengths") are joined with `"; "`;
/// objects fall back to compact JSON.
fn value_to_text(raw: &Value) -> String {
    match raw {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(value_to_text)
            .filter(|s| !s.trim().is_empty())
            .collect::<Vec<_>>()
            .join("; "),
        Value::Object(_) => raw.to_string(),
    }
}

/// Normalise free text for a single report cell.
pub fn sanitize_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            // Rule 1: bullets
            '\u{2022}' | '\u{2023}' | '\u{2043}' | '\u{2219}' | '\u{25CF}' | '\u{25E6}'
            | '\u{25AA}' | '\u{25AB}' | '\u{25A0}' => out.push('-'),
            // Rule 2: smart quotes and dashes
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' => out.push('"'),
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' => out.push('\''),
            '\u{2013}' | '\u{2014}' | '\u{2012}' | '\u{2015}' => out.push('-'),
            // Rule 3: invisible characters
            '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}' | '\u{00AD}' => {}
            // Rule 4: control characters
            c if c.is_control() => out.push(' '),
            c => out.push(c),
        }
    }

    // Rule 5: collapse whitespace
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}
