//! Text Normalizer - Canonical Input Form
//!
//! Encode and decode both see text through this one function, so the
//! codec only ever round-trips the canonical form:
//! 1. Unicode NFKC
//! 2. Full uppercase, then NFKC again
//! 3. Whitespace runs collapsed to a single space, ends trimmed
//!
//! Casing and whitespace layout are intentionally lost.

use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

/// Canonicalize text. Pure, total and idempotent.
pub fn normalize(text: &str) -> String {
    let composed: String = text.nfkc().collect();
    let folded: String = composed.to_uppercase().nfkc().collect();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Canonicalize one mapping key the way [`normalize`] treats a cluster
/// inside running text. Whitespace becomes a single space, never nothing.
pub fn normalize_cluster(key: &str) -> String {
    let composed: String = key.nfkc().collect();
    let folded: String = composed.to_uppercase().nfkc().collect();
    if !folded.is_empty() && folded.chars().all(char::is_whitespace) {
        " ".to_string()
    } else {
        folded
    }
}

/// Split already-normalized text into the units the encoder visits.
pub fn clusters(normalized: &str) -> Vec<&str> {
    normalized.graphemes(true).collect()
}

/// True when `s` is exactly one extended grapheme cluster.
pub fn is_single_cluster(s: &str) -> bool {
    let mut it = s.graphemes(true);
    it.next().is_some() && it.next().is_none()
}
