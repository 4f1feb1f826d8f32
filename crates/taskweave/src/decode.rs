//! Structured decoding of untyped JSON into typed values.
//!
//! Shapes are declared with serde derives: required and optional fields, enumerations,
//! tagged unions (`#[serde(tag = "...")]`), arrays. Failures carry the path of the
//! offending field as reported by `serde_path_to_error`. Refinements that serde cannot
//! express (pattern matching on strings) go through [`ensure_matches`].
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::{PipelineError, PipelineResult};

fn path_or_root(path: String) -> String {
    if path == "." || path.is_empty() {
        "<root>".to_string()
    } else {
        path
    }
}

/// Decode a borrowed JSON value into `T` without consuming it.
pub fn decode<T: DeserializeOwned>(value: &Value) -> PipelineResult<T> {
    serde_path_to_error::deserialize(value).map_err(|err| {
        let path = path_or_root(err.path().to_string());
        PipelineError::validation(path, err.into_inner().to_string())
    })
}

/// Parse and decode a JSON document in one go.
///
/// Syntax errors are reported as validation errors at the location serde_json stopped.
pub fn decode_str<T: DeserializeOwned>(text: &str) -> PipelineResult<T> {
    let mut deserializer = serde_json::Deserializer::from_str(text);
    serde_path_to_error::deserialize(&mut deserializer).map_err(|err| {
        let path = path_or_root(err.path().to_string());
        PipelineError::validation(path, err.into_inner().to_string())
    })
}

/// Decode and then apply a refinement check to the typed value.
pub fn decode_refined<T, F>(value: &Value, refine: F) -> PipelineResult<T>
where
    T: DeserializeOwned,
    F: FnOnce(&T) -> PipelineResult<()>,
{
    let decoded = decode(value)?;
    refine(&decoded)?;
    Ok(decoded)
}

/// Refinement: `value` at `path` has to match `pattern`.
pub fn ensure_matches(path: &str, value: &str, pattern: &Regex) -> PipelineResult<()> {
    if pattern.is_match(value) {
        Ok(())
    } else {
        Err(PipelineError::validation(
            path,
            format!("expected a value matching `{}`, got {:?}", pattern, value),
        ))
    }
}
