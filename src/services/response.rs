use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

const SNIPPET_CHARS: usize = 400;

static FENCED_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[A-Za-z]*\s*\n(.*?)```").expect("fence pattern"));

/// Pulls a JSON object or array out of raw model output.
///
/// Tries, in order: the whole text, the body of a fenced code block, then
/// substrings starting at the first `{` or `[` and ending at each matching
/// closer in turn (shortest first). The scan does not track nesting, so
/// heavily nested text wrapped in noise may still fail.
pub fn parse_response(text: &str) -> Result<Value> {
    let trimmed = text.trim();

    if let Some(v) = decode_container(trimmed) {
        return Ok(v);
    }

    if let Some(body) = FENCED_BLOCK.captures(trimmed).and_then(|c| c.get(1)) {
        if let Some(v) = decode_container(body.as_str().trim()) {
            return Ok(v);
        }
    }

    if let Some(v) = scan_for_container(trimmed) {
        return Ok(v);
    }

    Err(Error::MalformedResponse {
        snippet: snippet(trimmed),
    })
}

/// Turns a parsed response into a key -> entry map.
///
/// Objects pass through. Arrays are keyed by position, starting at `start`.
pub fn into_keyed(value: Value, start: usize) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| ((start + i).to_string(), item))
            .collect(),
        _ => Map::new(),
    }
}

fn decode_container(s: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(s) {
        Ok(v @ (Value::Object(_) | Value::Array(_))) => Some(v),
        _ => None,
    }
}

fn scan_for_container(text: &str) -> Option<Value> {
    let open = text.find(|c: char| c == '{' || c == '[')?;
    let close = if text[open..].starts_with('{') { '}' } else { ']' };

    text[open..]
        .match_indices(close)
        .find_map(|(end, _)| decode_container(&text[open..open + end + 1]))
}

fn snippet(text: &str) -> String {
    match text.char_indices().nth(SNIPPET_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
