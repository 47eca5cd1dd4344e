//! Uniform response envelope returned by the insight pipeline.

use serde::{Deserialize, Serialize};

/// Free-form context map supplied by the caller (e.g. `metric`, `location`,
/// `region`). No schema is enforced; modules default missing fields.
pub type InsightContext = serde_json::Map<String, serde_json::Value>;

/// Which side produced the envelope content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    /// Live (or cached) completion from the upstream chat service.
    Openrouter,
    /// Static per-module payload substituted locally.
    Fallback,
}

/// Hardcoded `{summary, highlights, actions}` triple used when live generation
/// is unavailable or invalid. Built per request so context fields can be
/// interpolated; every field is non-empty by construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackPayload {
    pub summary: String,
    pub highlights: Vec<String>,
    pub actions: Vec<String>,
}

/// Response envelope for `POST /api/insight`. Constructed fresh per request
/// and never persisted.
///
/// Invariant: `summary`, `highlights`, and `actions` are always non-empty and
/// well-typed, even when the upstream call fails or returns malformed JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightEnvelope {
    /// Canonical module id (e.g. `ai-dashboard`).
    pub module: String,
    pub source: Source,
    /// True when the adapter served the completion from the cache.
    pub cached: bool,
    pub summary: String,
    pub highlights: Vec<String>,
    pub actions: Vec<String>,
    /// Upstream-produced metadata; present only when the upstream returned a
    /// JSON object for it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Map<String, serde_json::Value>>,
    /// Reason the upstream call was unavailable (missing key, HTTP failure).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Reason the upstream text could not be used (invalid JSON, wrong shape).
    #[serde(rename = "parseError", skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<String>,
}
