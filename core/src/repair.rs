//! Extraction and repair of structured payloads embedded in free-form model
//! output. Models are asked for bare JSON but routinely wrap it in prose,
//! markdown fences, or near-JSON with trailing commas and single quotes.
//! The repair pass is bounded: one textual rewrite, one re-parse, then give up.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

static TRAILING_COMMA_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r",\s*([}\]])").expect("valid trailing-comma regex"));

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RepairError {
    #[error("model output did not contain a JSON array")]
    NoArray,
    #[error("model output did not contain a JSON object")]
    NoObject,
}

/// Slice from the first `open` to the last `close`, the widest candidate for
/// a bracket-delimited JSON value surrounded by prose.
fn bracket_slice(raw: &str, open: char, close: char) -> Option<&str> {
    let start = raw.find(open)?;
    let end = raw.rfind(close)?;
    if end < start {
        return None;
    }
    Some(&raw[start..=end])
}

/// Rewrite the common defects of model-emitted JSON: trailing commas before a
/// closing bracket, single quotes as string delimiters, and literal
/// newline/tab control characters inside strings.
fn repair(candidate: &str) -> String {
    TRAILING_COMMA_RE
        .replace_all(candidate, "$1")
        .replace('\'', "\"")
        .replace('\n', "\\n")
        .replace('\t', "\\t")
}

fn parse_array(s: &str) -> Option<Vec<Value>> {
    match serde_json::from_str::<Value>(s) {
        Ok(Value::Array(items)) if !items.is_empty() => Some(items),
        _ => None,
    }
}

fn parse_object(s: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str::<Value>(s) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}

/// Extract a non-empty JSON array from raw model output.
///
/// Strict parse first; if that fails, one repair pass and one re-parse.
pub fn extract_json_array(raw: &str) -> Result<Vec<Value>, RepairError> {
    let candidate = bracket_slice(raw, '[', ']').unwrap_or_else(|| raw.trim());
    if let Some(items) = parse_array(candidate) {
        return Ok(items);
    }
    parse_array(&repair(candidate)).ok_or(RepairError::NoArray)
}

/// Extract a JSON object from raw model output, with the same single-repair
/// policy as [`extract_json_array`].
pub fn extract_json_object(raw: &str) -> Result<Map<String, Value>, RepairError> {
    let candidate = bracket_slice(raw, '{', '}').unwrap_or_else(|| raw.trim());
    if let Some(map) = parse_object(candidate) {
        return Ok(map);
    }
    parse_object(&repair(candidate)).ok_or(RepairError::NoObject)
}

#[cfg(test)]
mod tests {
    use super::{RepairError, extract_json_array, extract_json_object};
    use serde_json::json;

    #[test]
    fn prose_prefix_and_trailing_commas_are_repaired() {
        let raw = "Here you go: [{\"a\":1,},]";
        let items = extract_json_array(raw).expect("repairable array");
        assert_eq!(items, vec![json!({"a": 1})]);
    }

    #[test]
    fn clean_arrays_parse_without_repair() {
        let items = extract_json_array("[{\"q\": \"x\"}, {\"q\": \"y\"}]").unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn single_quotes_are_converted() {
        let items = extract_json_array("[{'topic': 'Cells'}]").unwrap();
        assert_eq!(items, vec![json!({"topic": "Cells"})]);
    }

    #[test]
    fn literal_newlines_inside_strings_are_escaped() {
        let items = extract_json_array("[\"line one\nline two\"]").unwrap();
        assert_eq!(items, vec![json!("line one\nline two")]);
    }

    #[test]
    fn empty_arrays_are_rejected() {
        assert_eq!(extract_json_array("[]"), Err(RepairError::NoArray));
    }

    #[test]
    fn unrepairable_output_is_an_error() {
        assert_eq!(
            extract_json_array("I could not produce any questions."),
            Err(RepairError::NoArray)
        );
    }

    #[test]
    fn objects_surrounded_by_prose_are_extracted() {
        let raw = "Sure! {\"title\": \"Review ATP\", \"body\": \"Go over chapter 3.\"} Hope that helps.";
        let map = extract_json_object(raw).expect("object");
        assert_eq!(map.get("title"), Some(&json!("Review ATP")));
    }

    #[test]
    fn output_without_an_object_is_an_error() {
        assert_eq!(extract_json_object("no json here"), Err(RepairError::NoObject));
    }
}
