//! Defensive extraction of JSON from model output.
//!
//! Models are asked for "only JSON" but routinely wrap it in markdown fences,
//! prefix it with "Sure! Here is…", or annotate values with `// comments`.
//! This module contains all of that cleanup in one place:
//!
//! 1. slice from the first opening bracket to the last closing bracket,
//! 2. (objects only) strip comments outside string literals and collapse
//!    blank-line runs,
//! 3. strict `serde_json` parse.
//!
//! Any failure is a [`PaFillError::MalformedModelResponse`] carrying the
//! complete raw text.

use crate::error::PaFillError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

static BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n\s*\n").unwrap());

/// The substring from the first `open` to the last `close`, inclusive.
pub fn extract_span(raw: &str, open: char, close: char) -> Option<&str> {
    let start = raw.find(open)?;
    let end = raw.rfind(close)?;
    (end > start).then(|| &raw[start..=end])
}

/// Parse the JSON array embedded in a model response.
pub fn parse_array(raw: &str) -> Result<Vec<Value>, PaFillError> {
    let span = extract_span(raw, '[', ']')
        .ok_or_else(|| PaFillError::malformed("no JSON array found in response", raw))?;
    serde_json::from_str::<Vec<Value>>(span)
        .map_err(|e| PaFillError::malformed(format!("invalid JSON array: {e}"), raw))
}

/// Parse the JSON object embedded in a model response, tolerating comments.
pub fn parse_object(raw: &str) -> Result<Map<String, Value>, PaFillError> {
    let span = extract_span(raw, '{', '}')
        .ok_or_else(|| PaFillError::malformed("no JSON object found in response", raw))?;
    let cleaned = strip_comments(span);
    let cleaned = BLANK_LINES.replace_all(&cleaned, "\n");
    serde_json::from_str::<Map<String, Value>>(&cleaned)
        .map_err(|e| PaFillError::malformed(format!("invalid JSON object: {e}"), raw))
}

/// Remove `// line` and `/* block */` comments that sit outside JSON strings.
///
/// String literals are copied verbatim, so URLs such as `"https://…"` in
/// values survive. An unterminated block comment swallows the rest of the
/// input; the strict parse that follows reports it.
pub fn strip_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            out.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match (c, chars.peek()) {
            ('"', _) => {
                in_string = true;
                out.push(c);
            }
            ('/', Some('/')) => {
                while let Some(&next) = chars.peek() {
                    if next == '\n' {
                        break;
                    }
                    chars.next();
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Render a JSON value as the string written into a form field.
///
/// Booleans become `"Yes"` / `"No"`; `null` yields `None` (field untouched).
pub fn value_to_field_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(true) => Some("Yes".to_string()),
        Value::Bool(false) => Some("No".to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}
