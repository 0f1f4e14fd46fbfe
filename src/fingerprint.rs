//! Content fingerprints and cache keys
//!
//! Fingerprints hash a canonical JSON form (object keys sorted at every
//! depth) with xxh64, so two values that serialize to the same data hash to
//! the same key regardless of field order.

use serde::Serialize;
use serde_json::{Map, Value};
use xxhash_rust::xxh64::xxh64;

use crate::error::AnalyticsResult;

const FINGERPRINT_SEED: u64 = 0;

/// Rebuild `value` with object keys in sorted order at every depth
pub fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::with_capacity(entries.len());
            for (key, inner) in entries {
                sorted.insert(key, canonicalize(inner));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

fn hash_value(value: Value) -> String {
    let bytes = canonicalize(value).to_string();
    format!("{:016x}", xxh64(bytes.as_bytes(), FINGERPRINT_SEED))
}

/// Stable 64-bit hex fingerprint of any serializable value
pub fn data_fingerprint<T: Serialize + ?Sized>(data: &T) -> AnalyticsResult<String> {
    Ok(hash_value(serde_json::to_value(data)?))
}

/// Cache key `"{prefix}:{hash}"` over named key parts.
///
/// The prefix stays readable so keys can be cleared by namespace.
pub fn create_key(prefix: &str, parts: &Map<String, Value>) -> String {
    format!("{}:{}", prefix, hash_value(Value::Object(parts.clone())))
}
