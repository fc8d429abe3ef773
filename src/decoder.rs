//! Decoder - Encoded Path to Text
//!
//! Structural validation runs first and fails closed. Once a payload is
//! structurally sound, decoding always produces text; a hash mismatch only
//! clears `verified`.
//!
//! The encoder only ever visits mapped anchors and the sentinel. A vertex on
//! any other anchor decodes to the placeholder like the sentinel does, so it
//! would slip past the hash; such payloads are never verified.

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::encoder::EncodedPath;
use crate::error::{CodecError, CodecResult};
use crate::hashing::compute_content_hash;
use crate::lattice::{Lattice, LatticeId};
use crate::validation::PayloadValidator;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decoded {
    pub text: String,
    pub verified: bool,
    pub content_hash: String,
    pub lattice_type: LatticeId,
    pub timestamp: DateTime<Utc>,
}

/// Decode a path against a lattice.
///
/// # Errors
/// `MalformedPayload` when the path breaks a structural invariant for
/// this lattice. No partial text is returned in that case.
pub fn decode(path: &EncodedPath, lattice: &Lattice) -> CodecResult<Decoded> {
    PayloadValidator::new().validate(path, lattice)?;

    let rules = lattice.rules();
    let text: String = path
        .vertices
        .iter()
        .map(|&v| rules.resolve_char(v))
        .collect();

    let stray = path
        .vertices
        .iter()
        .filter(|&&v| !rules.is_claimed(v))
        .count();

    let recomputed = compute_content_hash(&text, lattice.id(), &rules.version);
    let verified = stray == 0 && recomputed == path.content_hash;

    if verified {
        debug!(
            "event=decode module=decoder lattice={} vertices={} verified=true",
            lattice.id(),
            path.vertices.len()
        );
    } else {
        warn!(
            "event=decode module=decoder lattice={} payload_lattice={} vertices={} stray={} verified=false",
            lattice.id(),
            path.lattice_type,
            path.vertices.len(),
            stray
        );
    }

    Ok(Decoded {
        text,
        verified,
        content_hash: path.content_hash.clone(),
        lattice_type: path.lattice_type.clone(),
        timestamp: path.timestamp,
    })
}

/// Parse a JSON payload, then decode it.
pub fn decode_json(payload: &str, lattice: &Lattice) -> CodecResult<Decoded> {
    let path = parse_payload(payload)?;
    decode(&path, lattice)
}

/// Parse a JSON payload. Unparsable input is `MalformedPayload`.
pub fn parse_payload(payload: &str) -> CodecResult<EncodedPath> {
    serde_json::from_str(payload).map_err(CodecError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::encode;
    use crate::lattice::Point;
    use serde_json::json;

    fn l0() -> Lattice {
        let anchors = (0..6).map(|i| Point::new(i as f64 * 10.0, 0.0)).collect();
        Lattice::new("L0", anchors, &json!({"mapping": {"A": 0, "B": 1, "C": 2}}), None).unwrap()
    }

    fn l1() -> Lattice {
        let anchors = (0..8).map(|i| Point::new(0.0, i as f64 * 5.0)).collect();
        Lattice::new("L1", anchors, &json!({"mapping": {"X": 0, "Y": 1, "Z": 2}}), None).unwrap()
    }

    #[test]
    fn test_round_trip_abc() {
        let l = l0();
        let decoded = decode(&encode("ABC", &l), &l).unwrap();
        assert_eq!(decoded.text, "ABC");
        assert!(decoded.verified);
        assert_eq!(decoded.lattice_type, "L0");
    }

    #[test]
    fn test_round_trip_lowercase_is_folded() {
        let l = l0();
        let decoded = decode(&encode("cab", &l), &l).unwrap();
        assert_eq!(decoded.text, "CAB");
        assert!(decoded.verified);
    }

    #[test]
    fn test_unmapped_decodes_to_placeholder_and_verifies() {
        let l = l0();
        let decoded = decode(&encode("A!?", &l), &l).unwrap();
        assert_eq!(decoded.text, "A\u{FFFD}\u{FFFD}");
        assert!(decoded.verified);
    }

    #[test]
    fn test_foreign_lattice_not_verified() {
        let encoded = encode("ABC", &l0());
        let decoded = decode(&encoded, &l1()).unwrap();
        assert!(!decoded.verified);
        assert_eq!(decoded.text, "XYZ");
        assert_eq!(decoded.lattice_type, "L0");
    }

    #[test]
    fn test_tampered_vertex_not_verified() {
        let l = l0();
        let mut encoded = encode("ABC", &l);
        encoded.vertices[0] = 1;
        let decoded = decode(&encoded, &l).unwrap();
        assert!(!decoded.verified);
        assert_eq!(decoded.text, "BBC");
    }

    #[test]
    fn test_sentinel_moved_to_unclaimed_anchor() {
        let l = l0();
        let mut encoded = encode("A!C", &l);
        assert_eq!(encoded.vertices, vec![0, 5, 2]);
        encoded.vertices[1] = 3;
        let decoded = decode(&encoded, &l).unwrap();
        assert_eq!(decoded.text, "A\u{FFFD}C");
        assert!(!decoded.verified);
    }

    #[test]
    fn test_tampered_hash_not_verified() {
        let l = l0();
        let mut encoded = encode("ABC", &l);
        encoded.content_hash = "00".repeat(32);
        assert!(!decode(&encoded, &l).unwrap().verified);
    }

    #[test]
    fn test_out_of_range_is_malformed() {
        let l = l0();
        let mut encoded = encode("ABC", &l);
        encoded.vertices[2] = 6;
        assert!(decode(&encoded, &l).unwrap_err().is_malformed_payload());
    }

    #[test]
    fn test_decode_json() {
        let l = l0();
        let json = encode("BAC", &l).to_json().unwrap();
        let decoded = decode_json(&json, &l).unwrap();
        assert_eq!(decoded.text, "BAC");
        assert!(decoded.verified);
    }

    #[test]
    fn test_unparsable_json_is_malformed() {
        let l = l0();
        assert!(decode_json("{not json", &l).unwrap_err().is_malformed_payload());
        assert!(decode_json(r#"{"latticeType": "L0"}"#, &l)
            .unwrap_err()
            .is_malformed_payload());
        assert!(decode_json(
            r#"{"latticeType":"L0","paths":[],"vertices":[-1],"contentHash":"","timestamp":"2024-01-01T00:00:00Z"}"#,
            &l
        )
        .unwrap_err()
        .is_malformed_payload());
    }
}
