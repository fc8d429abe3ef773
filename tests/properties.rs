//! Property-based tests for the codec laws.
//!
//! These tests use proptest to verify invariants hold across
//! randomly generated inputs.

use proptest::prelude::*;

use qbc_core::cache::render_fragment;
use qbc_core::{decode, encode, normalize, GlyphCache, Lattice, Orientation, Point};
use serde_json::json;

const MAPPED: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789 .,";

fn lattice(id: &str, connection: &str, depth: u8) -> Lattice {
    let mapping: serde_json::Map<String, serde_json::Value> = MAPPED
        .chars()
        .enumerate()
        .map(|(i, c)| (c.to_string(), json!(i)))
        .collect();
    let anchors = (0..48)
        .map(|i| Point::new((i % 8) as f64 * 12.0, (i / 8) as f64 * 12.0))
        .collect();
    Lattice::new(
        id,
        anchors,
        &json!({"mapping": mapping, "connection": connection, "fractalDepth": depth}),
        None,
    )
    .unwrap()
}

/// Text drawn from the mapped alphabet in either case.
fn mapped_text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 .,]{0,40}"
}

/// Text mixing mapped characters with symbols the lattice does not know.
fn mixed_text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 .,!?#@éß☃]{0,40}"
}

fn connection() -> impl Strategy<Value = (&'static str, u8)> {
    (prop::sample::select(vec!["straight", "curved"]), 0u8..=4)
}

proptest! {
    /// Decoding an honest encoding gives back the normalized text, verified.
    #[test]
    fn round_trip_mapped(text in mapped_text(), (conn, depth) in connection()) {
        let l = lattice("prop", conn, depth);
        let decoded = decode(&encode(&text, &l), &l).unwrap();
        prop_assert_eq!(decoded.text, normalize(&text));
        prop_assert!(decoded.verified);
    }

    /// Any input encodes, and honest decodes always verify.
    #[test]
    fn encoding_is_total(text in mixed_text()) {
        let l = lattice("prop", "curved", 2);
        let encoded = encode(&text, &l);
        prop_assert_eq!(encoded.paths.len(), encoded.vertices.len().saturating_sub(1));
        let decoded = decode(&encoded, &l).unwrap();
        prop_assert!(decoded.verified);
        prop_assert_eq!(decoded.text.chars().count(), encoded.vertices.len());
    }

    #[test]
    fn encoding_is_deterministic(text in mixed_text(), (conn, depth) in connection()) {
        let l = lattice("prop", conn, depth);
        let a = encode(&text, &l);
        let b = encode(&text, &l);
        prop_assert!(a.same_content(&b));
    }

    #[test]
    fn normalization_is_idempotent(text in mixed_text()) {
        let once = normalize(&text);
        prop_assert_eq!(normalize(&once), once);
    }

    #[test]
    fn distinct_texts_distinct_hashes(a in mapped_text(), b in mapped_text()) {
        prop_assume!(normalize(&a) != normalize(&b));
        // every character here is mapped, so the encodable text is the text itself
        let l = lattice("prop", "straight", 0);
        prop_assert_ne!(encode(&a, &l).content_hash, encode(&b, &l).content_hash);
    }

    /// Changing one vertex to another valid anchor is always detected,
    /// including vertices that sit on the sentinel.
    #[test]
    fn single_vertex_tamper_detected(
        text in "[A-Z0-9!?#]{1,30}",
        pick in any::<prop::sample::Index>(),
        shift in 1usize..47,
    ) {
        let l = lattice("prop", "curved", 1);
        let mut encoded = encode(&text, &l);
        let i = pick.index(encoded.vertices.len());
        encoded.vertices[i] = (encoded.vertices[i] + shift) % l.anchor_count();
        let decoded = decode(&encoded, &l).unwrap();
        prop_assert!(!decoded.verified);
    }

    /// The cache serves exactly what the renderer would produce.
    #[test]
    fn cache_is_transparent(text in mixed_text(), size in 8u32..128) {
        let l = lattice("prop", "curved", 2);
        let cache = GlyphCache::new();
        let miss = cache.get_or_render(&text, size, &l);
        let hit = cache.get_or_render(&text, size, &l);
        let direct = render_fragment(&text, size, &l, Orientation::Normal);
        prop_assert_eq!(&*miss, direct.as_str());
        prop_assert_eq!(&*hit, direct.as_str());
    }
}
