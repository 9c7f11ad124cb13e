//! Lenient JSON Recovery
//!
//! Model output is text that usually contains one JSON value. Recovery
//! tries three progressively more aggressive tiers and never fails: when
//! nothing can be salvaged the caller gets `Recovered::Empty`.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

/// Outcome of a recovery attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Recovered {
    /// An object or array was found in the text.
    Value(Value),
    /// Nothing usable. Not the same thing as an intentionally empty payload.
    Empty,
}

impl Recovered {
    pub fn is_empty(&self) -> bool {
        matches!(self, Recovered::Empty)
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Recovered::Value(v) => Some(v),
            Recovered::Empty => None,
        }
    }

    /// Collapse to a plain value, `{}` when nothing was recovered.
    pub fn into_value(self) -> Value {
        match self {
            Recovered::Value(v) => v,
            Recovered::Empty => Value::Object(Default::default()),
        }
    }

    /// Deserialize the recovered value into `T`.
    pub fn decode<T: DeserializeOwned>(self) -> Option<T> {
        match self {
            Recovered::Value(v) => match serde_json::from_value(v) {
                Ok(decoded) => Some(decoded),
                Err(e) => {
                    debug!(error = %e, "recovered JSON does not match expected shape");
                    None
                }
            },
            Recovered::Empty => None,
        }
    }
}

/// Remove markdown code-fence markers and surrounding whitespace.
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "")
        .replace("```JSON", "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// Body of the first fenced block. Only fences that open a line count, so
/// backticks inside JSON strings are left alone.
fn fenced_body(text: &str) -> Option<&str> {
    let fences: Vec<usize> = text
        .match_indices("```")
        .map(|(i, _)| i)
        .filter(|&i| text[..i].rsplit('\n').next().map_or(true, |pre| pre.trim().is_empty()))
        .collect();
    let open = *fences.first()?;
    let body_start = open + text[open..].find('\n')? + 1;
    let close = fences
        .iter()
        .copied()
        .find(|&c| c >= body_start)
        .unwrap_or(text.len());
    Some(text[body_start..close].trim())
}

/// Recover one JSON object or array from free text.
///
/// Candidates are tried in order: the text as given, the body of its first
/// fenced block, then the text with every fence marker removed.
pub fn recover_json(text: &str) -> Recovered {
    let mut candidates: Vec<String> = vec![text.trim().to_string()];
    if let Some(body) = fenced_body(text) {
        candidates.push(body.to_string());
    }
    candidates.push(strip_code_fences(text));
    candidates.dedup();

    for candidate in &candidates {
        if let Some(v) = recover_candidate(candidate) {
            return Recovered::Value(v);
        }
    }

    warn!(len = text.len(), "could not recover JSON from model output");
    Recovered::Empty
}

fn recover_candidate(cleaned: &str) -> Option<Value> {
    // Tier 1: the whole thing is JSON.
    if let Some(v) = parse_structured(cleaned) {
        return Some(v);
    }

    // Tier 2: JSON surrounded by prose.
    if let Some(v) = bracket_slice(cleaned).and_then(parse_structured) {
        debug!("recovered JSON after trimming surrounding text");
        return Some(v);
    }

    // Tier 3: raw control characters inside string values.
    let flattened: String = cleaned
        .chars()
        .map(|c| if matches!(c, '\n' | '\r' | '\t') { ' ' } else { c })
        .collect();
    let v = widest_bracket_slice(&flattened).and_then(parse_structured)?;
    debug!("recovered JSON after flattening control characters");
    Some(v)
}

/// Recover and deserialize in one step.
pub fn recover_as<T: DeserializeOwned>(text: &str) -> Option<T> {
    recover_json(text).decode()
}

fn parse_structured(candidate: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(candidate) {
        Ok(v @ (Value::Object(_) | Value::Array(_))) => Some(v),
        _ => None,
    }
}

fn first_opener(text: &str) -> Option<(usize, char)> {
    text.char_indices().find(|(_, c)| *c == '{' || *c == '[')
}

/// First opener up to the last closer of the same kind.
fn bracket_slice(text: &str) -> Option<&str> {
    let (start, opener) = first_opener(text)?;
    let closer = if opener == '{' { '}' } else { ']' };
    let end = text.rfind(closer)?;
    (end > start).then(|| &text[start..=end])
}

/// First opener up to whichever closer appears last.
fn widest_bracket_slice(text: &str) -> Option<&str> {
    let (start, _) = first_opener(text)?;
    let end = match (text.rfind('}'), text.rfind(']')) {
        (Some(a), Some(b)) => a.max(b),
        (Some(a), None) | (None, Some(a)) => a,
        (None, None) => return None,
    };
    (end > start).then(|| &text[start..=end])
}
