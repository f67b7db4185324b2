//! Untrusted AI JSON: extraction, light repair, and typed field access.
//!
//! AI answers may wrap JSON in markdown fences, surround it with prose, or
//! leave trailing commas. [`parse_ai_json`] recovers the object where it
//! can; the `*_field` helpers read it treating every value as untyped.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use topicwiki_shared::{Result, TopicWikiError};

static TRAILING_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",(\s*[}\]])").expect("valid regex"));

/// Locate the JSON payload in an AI answer.
///
/// Tries a ```` ```json ```` fence, then any fence, then the outermost `{...}`.
pub fn extract_json(response: &str) -> &str {
    if let Some(start) = response.find("```json") {
        let body = &response[start + 7..];
        if let Some(end) = body.find("```") {
            let candidate = body[..end].trim();
            if candidate.contains('{') {
                return candidate;
            }
        }
    }

    if let Some(start) = response.find("```") {
        let after = &response[start + 3..];
        // Skip a language tag on the fence line.
        let body = match after.find('\n') {
            Some(newline) if !after[..newline].contains('{') => &after[newline + 1..],
            _ => after,
        };
        if let Some(end) = body.find("```") {
            let candidate = body[..end].trim();
            if candidate.contains('{') {
                return candidate;
            }
        }
    }

    if let (Some(start), Some(end)) = (response.find('{'), response.rfind('}')) {
        if end > start {
            return &response[start..=end];
        }
    }

    response.trim()
}

/// Fix the malformations AI models commonly produce.
pub fn repair_json(json: &str) -> String {
    let normalized = json
        .replace(['\u{201c}', '\u{201d}'], "\"")
        .replace('\u{feff}', "");
    TRAILING_COMMA.replace_all(&normalized, "$1").into_owned()
}

/// Parse an AI answer into a JSON object.
///
/// The extracted payload is parsed as-is first, then once more after repair.
pub fn parse_ai_json(response: &str) -> Result<Map<String, Value>> {
    let candidate = extract_json(response);

    let value = match serde_json::from_str::<Value>(candidate) {
        Ok(value) => value,
        Err(_) => serde_json::from_str::<Value>(&repair_json(candidate))
            .map_err(|e| TopicWikiError::parse(format!("AI response is not valid JSON: {e}")))?,
    };

    match value {
        Value::Object(map) => Ok(map),
        other => Err(TopicWikiError::parse(format!(
            "AI response is not a JSON object (got {})",
            type_name(&other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ---------------------------------------------------------------------------
// Field access
// ---------------------------------------------------------------------------

/// A non-blank string field, trimmed.
pub fn str_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// A string field, or `default` when missing or not a string.
pub fn str_field_or(map: &Map<String, Value>, key: &str, default: &str) -> String {
    str_field(map, key).unwrap_or_else(|| default.to_string())
}

/// A boolean field. Anything but `true` reads as `false`.
pub fn bool_field(map: &Map<String, Value>, key: &str) -> bool {
    map.get(key).and_then(Value::as_bool).unwrap_or(false)
}

/// A string array, dropping non-string and blank entries. Missing reads as empty.
pub fn string_array_field(map: &Map<String, Value>, key: &str) -> Vec<String> {
    match map.get(key) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        _ => Vec::new(),
    }
}

/// The first of `keys` holding an array, read as strings.
pub fn string_array_field_any(map: &Map<String, Value>, keys: &[&str]) -> Vec<String> {
    keys.iter()
        .find(|key| matches!(map.get(**key), Some(Value::Array(_))))
        .map(|key| string_array_field(map, key))
        .unwrap_or_default()
}

/// The objects of an array field. Non-object entries are dropped.
pub fn object_array_field<'a>(map: &'a Map<String, Value>, key: &str) -> Vec<&'a Map<String, Value>> {
    match map.get(key) {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_object).collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_from_json_fence() {
        let response = "Here is the outline:\n```json\n{\"layout\": \"area\"}\n```\nDone.";
        assert_eq!(extract_json(response), "{\"layout\": \"area\"}");
    }

    #[test]
    fn extracts_from_plain_fence() {
        let response = "```\n{\"a\": 1}\n```";
        assert_eq!(extract_json(response), "{\"a\": 1}");
    }

    #[test]
    fn extracts_bare_object_from_prose() {
        let response = "Sure! {\"a\": {\"b\": 2}} Hope this helps.";
        assert_eq!(extract_json(response), "{\"a\": {\"b\": 2}}");
    }

    #[test]
    fn repairs_trailing_commas() {
        let map = parse_ai_json("{\"articles\": [{\"slug\": \"a\",},], \"title\": \"T\",}").unwrap();
        assert_eq!(map["title"], "T");
        assert_eq!(map["articles"][0]["slug"], "a");
    }

    #[test]
    fn rejects_non_objects_and_garbage() {
        assert!(parse_ai_json("[1, 2, 3]").is_err());
        assert!(parse_ai_json("I could not do that").is_err());
    }

    #[test]
    fn field_helpers_apply_type_guards() {
        let value = json!({
            "title": "  Compaction ",
            "blank": "   ",
            "count": 3,
            "isIndex": "yes",
            "files": ["a.rs", 7, null, "", "b.rs"],
            "coveredComponentIds": ["storage"],
            "articles": [{ "slug": "x" }, "junk", 4]
        });
        let map = value.as_object().unwrap();

        assert_eq!(str_field(map, "title").as_deref(), Some("Compaction"));
        assert_eq!(str_field(map, "blank"), None);
        assert_eq!(str_field(map, "count"), None);
        assert_eq!(str_field_or(map, "missing", "fallback"), "fallback");
        assert!(!bool_field(map, "isIndex"));
        assert_eq!(string_array_field(map, "files"), vec!["a.rs", "b.rs"]);
        assert_eq!(
            string_array_field_any(map, &["coveredModuleIds", "coveredComponentIds"]),
            vec!["storage"]
        );
        assert_eq!(object_array_field(map, "articles").len(), 1);
    }
}
