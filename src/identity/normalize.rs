//! Identifier normalization
//!
//! Turns whatever shape an identifier arrived in into canonical ids.
//! Recognised shapes:
//!
//! - bare string, dashed or 32 hex digits
//! - string prefixed with `#`
//! - object with an `id` field (normalized recursively)
//! - JSON-encoded array string, e.g. `"[\"…\", \"…\"]"`
//! - comma-separated string
//! - array of any of the above, flattened
//!
//! Numbers never resolve: legacy numeric ids are unsupported and must not
//! be coerced. Nothing here returns an error; malformed input is absent.

use super::CanonicalId;
use serde_json::Value;

/// Nesting bound for objects/arrays/encoded strings
const MAX_DEPTH: usize = 8;

/// Normalize a value to at most one canonical id
///
/// List-like inputs yield their first well-formed element.
pub fn normalize_id(value: &Value) -> Option<CanonicalId> {
    normalize_ids(value).into_iter().next()
}

/// Normalize a value to every canonical id it contains
///
/// Order is first-seen; duplicates are removed.
pub fn normalize_ids(value: &Value) -> Vec<CanonicalId> {
    let mut out = Vec::new();
    collect_value(value, 0, &mut out);
    out
}

/// Normalize a single raw string
pub fn normalize_str(raw: &str) -> Option<CanonicalId> {
    let mut out = Vec::new();
    collect_str(raw, 0, &mut out);
    out.into_iter().next()
}

fn collect_value(value: &Value, depth: usize, out: &mut Vec<CanonicalId>) {
    if depth > MAX_DEPTH {
        return;
    }
    match value {
        Value::String(s) => collect_str(s, depth, out),
        Value::Array(items) => {
            for item in items {
                collect_value(item, depth + 1, out);
            }
        }
        Value::Object(map) => {
            if let Some(inner) = map.get("id") {
                collect_value(inner, depth + 1, out);
            }
        }
        Value::Number(_) | Value::Bool(_) | Value::Null => {}
    }
}

fn collect_str(raw: &str, depth: usize, out: &mut Vec<CanonicalId>) {
    if depth > MAX_DEPTH {
        return;
    }
    let s = raw.trim();
    if s.is_empty() {
        return;
    }

    if s.starts_with('[') {
        // Malformed JSON is simply absent
        if let Ok(parsed @ Value::Array(_)) = serde_json::from_str::<Value>(s) {
            collect_value(&parsed, depth + 1, out);
        }
        return;
    }

    if s.contains(',') {
        for segment in s.split(',') {
            collect_str(segment, depth + 1, out);
        }
        return;
    }

    let bare = s.strip_prefix('#').unwrap_or(s);
    if let Some(id) = CanonicalId::parse(bare) {
        push_unique(out, id);
    }
}

fn push_unique(out: &mut Vec<CanonicalId>, id: CanonicalId) {
    if !out.contains(&id) {
        out.push(id);
    }
}
