//! Lenient parsing of the JSON arrays returned by generative models.
//!
//! Models routinely wrap the array in prose, leave trailing commas, or drop the
//! comma between two objects. Each pass below is only tried when the previous
//! one failed, and a pass only counts when it produces a non-empty array.

use std::sync::LazyLock;

use log::debug;
use regex::Regex;
use serde_json::Value;

static TRAILING_COMMA_ARRAY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r",\s*\]").unwrap());
static TRAILING_COMMA_OBJECT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r",\s*\}").unwrap());
static MISSING_COMMA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\}\s*\{").unwrap());
static FLAT_ESSAY_OBJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{\s*"pergunta"\s*:\s*"[^"]*"\s*,\s*"resposta"\s*:\s*"[^"]*"\s*\}"#).unwrap()
});

/// Remove trailing commas and insert the comma missing between adjacent objects
pub fn fix_json_string(text: &str) -> String {
    let text = TRAILING_COMMA_ARRAY.replace_all(text, "]");
    let text = TRAILING_COMMA_OBJECT.replace_all(&text, "}");
    MISSING_COMMA.replace_all(&text, "},{").into_owned()
}

fn non_empty_array(text: &str) -> Option<Vec<Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Array(items)) if !items.is_empty() => Some(items),
        _ => None,
    }
}

fn bracketed(text: &str) -> Option<&str> {
    let start = text.find('[')?;
    let end = text.rfind(']')?;
    (end > start).then(|| &text[start..=end])
}

/// Parse `text` as a JSON array, repairing common model formatting noise.
///
/// Returns `None` when every pass fails; callers treat that as a failed generation.
pub fn parse_array(text: &str) -> Option<Vec<Value>> {
    if let Some(items) = non_empty_array(text) {
        return Some(items);
    }

    if let Some(items) = non_empty_array(&fix_json_string(text)) {
        debug!("JSON parsed after textual repair");
        return Some(items);
    }

    if let Some(items) = bracketed(text).and_then(|slice| non_empty_array(&fix_json_string(slice))) {
        debug!("JSON parsed from bracketed slice");
        return Some(items);
    }

    let objects: Vec<&str> = FLAT_ESSAY_OBJECT.find_iter(text).map(|m| m.as_str()).collect();
    if !objects.is_empty() {
        let combined = format!("[{}]", objects.join(","));
        if let Some(items) = non_empty_array(&combined) {
            debug!("JSON rebuilt from {} matched objects", items.len());
            return Some(items);
        }
    }

    debug!("JSON repair exhausted");
    None
}
