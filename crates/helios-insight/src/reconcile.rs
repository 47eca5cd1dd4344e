//! Response reconciler: a pure transform from the adapter's outcome and the
//! module's static fallback to the final envelope.
//!
//! Field-level, not all-or-nothing: a parsed object contributes whichever of
//! `summary`, `highlights`, `actions`, `metadata` are well-shaped, and the
//! fallback fills in the rest. The envelope therefore always carries non-empty
//! summary, highlights, and actions.

use helios_core::{FallbackPayload, InsightEnvelope, ModuleKind, Source};
use serde_json::Value;

use crate::adapter::AdapterOutcome;

pub fn reconcile(
    module: ModuleKind,
    outcome: AdapterOutcome,
    fallback: FallbackPayload,
) -> InsightEnvelope {
    match outcome {
        AdapterOutcome::Unavailable { reason } => {
            fallback_envelope(module, fallback, Some(reason), None, false)
        }
        AdapterOutcome::Completed { raw, cached } => {
            let value: Value = match serde_json::from_str(&raw) {
                Ok(v) => v,
                Err(e) => {
                    return fallback_envelope(
                        module,
                        fallback,
                        None,
                        Some(format!("upstream text is not valid JSON: {}", e)),
                        cached,
                    )
                }
            };
            let object = match value {
                Value::Object(map) => map,
                other => {
                    return fallback_envelope(
                        module,
                        fallback,
                        None,
                        Some(format!(
                            "upstream JSON is {}, expected an object",
                            json_type_name(&other)
                        )),
                        cached,
                    )
                }
            };

            let summary = object
                .get("summary")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .unwrap_or(fallback.summary);
            let highlights = string_list(object.get("highlights")).unwrap_or(fallback.highlights);
            let actions = string_list(object.get("actions")).unwrap_or(fallback.actions);
            let metadata = object.get("metadata").and_then(Value::as_object).cloned();

            InsightEnvelope {
                module: module.as_str().to_string(),
                source: Source::Openrouter,
                cached,
                summary,
                highlights,
                actions,
                metadata,
                error: None,
                parse_error: None,
            }
        }
    }
}

fn fallback_envelope(
    module: ModuleKind,
    fallback: FallbackPayload,
    error: Option<String>,
    parse_error: Option<String>,
    cached: bool,
) -> InsightEnvelope {
    InsightEnvelope {
        module: module.as_str().to_string(),
        source: Source::Fallback,
        cached,
        summary: fallback.summary,
        highlights: fallback.highlights,
        actions: fallback.actions,
        metadata: None,
        error,
        parse_error,
    }
}

/// A usable string list: an array whose string elements are non-blank after
/// trimming. Blank and non-string elements are dropped; an empty result (or a
/// non-array value) yields `None` so the fallback list is substituted.
fn string_list(value: Option<&Value>) -> Option<Vec<String>> {
    let items = value?.as_array()?;
    let kept: Vec<String> = items
        .iter()
        .filter_map(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect();
    if kept.is_empty() {
        None
    } else {
        Some(kept)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
