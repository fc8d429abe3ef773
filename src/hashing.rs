//! Hashing System - SHA-256 Content Hashes
//!
//! A content hash binds encoded text to the lattice that encoded it.
//! Input is canonical JSON so field order and framing can never make two
//! different inputs collide.

use serde::Serialize;
use serde_json::{to_string, Value};
use sha2::{Digest, Sha256};

/// Domain tag mixed into every content hash.
pub const HASH_DOMAIN: &str = "qbc/1";

/// Compute SHA-256 hash of bytes, return hex string
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Convert to canonical JSON (sorted keys, no whitespace)
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let v: Value = serde_json::to_value(value)?;
    to_string(&sort_value(&v))
}

fn sort_value(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut sorted: Vec<_> = map.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            let sorted_map: serde_json::Map<String, Value> = sorted
                .into_iter()
                .map(|(k, v)| (k.clone(), sort_value(v)))
                .collect();
            Value::Object(sorted_map)
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_value).collect()),
        _ => v.clone(),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HashInput<'a> {
    codec: &'a str,
    lattice_id: &'a str,
    rules_version: &'a str,
    text: &'a str,
}

/// content_hash = sha256(canonical {codec, latticeId, rulesVersion, text})
///
/// `text` is the encodable projection of the normalized text. The timestamp
/// of an encoded path never takes part.
pub fn compute_content_hash(text: &str, lattice_id: &str, rules_version: &str) -> String {
    let input = HashInput {
        codec: HASH_DOMAIN,
        lattice_id,
        rules_version,
        text,
    };
    // Serializing a struct of plain strings cannot fail; fall back to an
    // unambiguous length-prefixed framing if it ever does.
    let canonical = canonical_json(&input).unwrap_or_else(|_| {
        format!(
            "{}:{}:{}:{}:{}:{}:{}",
            HASH_DOMAIN,
            lattice_id.len(),
            lattice_id,
            rules_version.len(),
            rules_version,
            text.len(),
            text
        )
    });
    sha256_hex(canonical.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_json_sorted() {
        let obj = json!({"z": 1, "a": 2, "m": 3});
        let canonical = canonical_json(&obj).unwrap();
        assert_eq!(canonical, r#"{"a":2,"m":3,"z":1}"#);
    }

    #[test]
    fn test_hash_deterministic() {
        let data = b"test data";
        assert_eq!(sha256_hex(data), sha256_hex(data));
        assert_eq!(sha256_hex(data).len(), 64);
    }

    #[test]
    fn test_known_digest() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_content_hash_stable() {
        let h1 = compute_content_hash("ABC", "l0", "1");
        let h2 = compute_content_hash("ABC", "l0", "1");
        assert_eq!(h1, h2);
    }

    #[test]
    fn test_content_hash_sensitive_to_each_part() {
        let base = compute_content_hash("ABC", "l0", "1");
        assert_ne!(base, compute_content_hash("ABD", "l0", "1"));
        assert_ne!(base, compute_content_hash("ABC", "l1", "1"));
        assert_ne!(base, compute_content_hash("ABC", "l0", "2"));
    }

    #[test]
    fn test_content_hash_framing() {
        // shifting characters between fields must not collide
        assert_ne!(
            compute_content_hash("B", "A:", "1"),
            compute_content_hash(":B", "A", "1")
        );
    }
}
