//! Deterministic fingerprinting for idempotency and echo suppression.
//!
//! `fingerprint` hashes a canonicalized JSON value: object keys are sorted
//! recursively before serialization, so two values differing only in key
//! order within nested maps hash identically (invariant 7).

use serde_json::Value;
use sha2::{Digest, Sha256};

/// Recursively sort object keys so serialization is order-independent.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut sorted: Vec<(String, Value)> =
                map.iter().map(|(k, v)| (k.clone(), canonicalize(v))).collect();
            sorted.sort_by(|a, b| a.0.cmp(&b.0));
            let mut out = serde_json::Map::new();
            for (k, v) in sorted {
                out.insert(k, v);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// SHA-256 hex digest of the canonical-JSON form of `value`.
pub fn fingerprint(value: &Value) -> String {
    let canonical = canonicalize(value);
    // serde_json's default writer does not insert insignificant whitespace,
    // so `to_string` on the canonicalized (key-sorted) value already
    // produces a deterministic encoding.
    let bytes = serde_json::to_vec(&canonical).expect("canonical JSON always serializes");
    let digest = Sha256::digest(&bytes);
    hex::encode(digest)
}

/// Fingerprint any serializable payload by first converting it to `Value`.
pub fn fingerprint_of<T: serde::Serialize>(payload: &T) -> String {
    let value = serde_json::to_value(payload).expect("payload always serializes to JSON");
    fingerprint(&value)
}

mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn key_order_does_not_affect_fingerprint() {
        let a = json!({"a": 1, "b": {"x": 1, "y": 2}});
        let b = json!({"b": {"y": 2, "x": 1}, "a": 1});
        assert_eq!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn differing_values_hash_differently() {
        let a = json!({"title": "Buy milk"});
        let b = json!({"title": "Buy groceries"});
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn arrays_preserve_order_sensitivity() {
        let a = json!({"labels": ["a", "b"]});
        let b = json!({"labels": ["b", "a"]});
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }
}
