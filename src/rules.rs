//! Encoding Rules - Normalized Lattice Ruleset
//!
//! Raw rule JSON from the lattice source is turned into an [`EncodingRules`]
//! value once, when the lattice is built. Everything downstream works from
//! the normalized form:
//! - the mapping is a bijection between clusters and non-sentinel anchors
//! - the placeholder is never a mapped cluster
//! - every lookup in either direction is total
//! - normalizing the serialized normalized rules yields the same rules

use std::collections::BTreeMap;

use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::normalize::{is_single_cluster, normalize, normalize_cluster};
use crate::CODEC_VERSION;

pub type AnchorIndex = usize;

pub const DEFAULT_RULES_VERSION: &str = "1";
pub const DEFAULT_PLACEHOLDER: &str = "\u{FFFD}";
pub const DEFAULT_CURVATURE: f64 = 0.25;
pub const DEFAULT_LOOP_RADIUS: f64 = 4.0;
pub const MAX_FRACTAL_DEPTH: u8 = 6;

#[derive(Debug, Error, PartialEq)]
pub enum RulesError {
    #[error("rules are not a valid rule object: {0}")]
    Unparsable(String),

    #[error("lattice has no anchors")]
    NoAnchors,

    #[error("sentinel anchor {0} is outside the lattice ({1} anchors)")]
    SentinelOutOfRange(usize, usize),

    #[error("invalid codec min version: {0}")]
    InvalidMinVersion(String),

    #[error("rules require codec >= {0}, current is {1}")]
    CodecTooOld(String, String),
}

/// How consecutive vertices are joined.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionPolicy {
    #[default]
    Straight,
    Curved,
}

/// Outcome of looking up one cluster in the mapping table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Mapped(AnchorIndex),
    Sentinel(AnchorIndex),
}

impl Resolution {
    pub fn index(self) -> AnchorIndex {
        match self {
            Resolution::Mapped(i) | Resolution::Sentinel(i) => i,
        }
    }

    pub fn is_sentinel(self) -> bool {
        matches!(self, Resolution::Sentinel(_))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawVersion {
    Text(String),
    Number(serde_json::Number),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRules {
    #[serde(default)]
    version: Option<RawVersion>,
    #[serde(default)]
    mapping: BTreeMap<String, u64>,
    #[serde(default)]
    sentinel: Option<usize>,
    #[serde(default)]
    placeholder: Option<String>,
    #[serde(default)]
    connection: Option<ConnectionPolicy>,
    #[serde(default)]
    curvature: Option<f64>,
    #[serde(default)]
    fractal_depth: Option<i64>,
    #[serde(default)]
    loop_radius: Option<f64>,
    #[serde(default)]
    codec_min_version: Option<String>,
}

/// Built only by [`normalize_rules`]; serializes to an accepted raw form.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EncodingRules {
    pub version: String,
    pub mapping: BTreeMap<String, AnchorIndex>,
    pub sentinel: AnchorIndex,
    pub placeholder: String,
    pub connection: ConnectionPolicy,
    pub curvature: f64,
    pub fractal_depth: u8,
    pub loop_radius: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codec_min_version: Option<String>,
    #[serde(skip)]
    inverse: Vec<Option<String>>,
}

/// Build normalized rules for a lattice with `anchor_count` anchors.
///
/// A `null` rule value is treated as an empty rule object.
pub fn normalize_rules(raw: &Value, anchor_count: usize) -> Result<EncodingRules, RulesError> {
    if anchor_count == 0 {
        return Err(RulesError::NoAnchors);
    }

    let raw: RawRules = match raw {
        Value::Null => RawRules::default(),
        other => serde_json::from_value(other.clone())
            .map_err(|e| RulesError::Unparsable(e.to_string()))?,
    };

    let codec_min_version = match raw.codec_min_version {
        Some(min) => {
            check_codec_version(&min)?;
            Some(min)
        }
        None => None,
    };

    let sentinel = raw.sentinel.unwrap_or(anchor_count - 1);
    if sentinel >= anchor_count {
        return Err(RulesError::SentinelOutOfRange(sentinel, anchor_count));
    }

    let version = match raw.version {
        Some(RawVersion::Text(v)) if !v.trim().is_empty() => v.trim().to_string(),
        Some(RawVersion::Number(n)) => n.to_string(),
        _ => DEFAULT_RULES_VERSION.to_string(),
    };

    let placeholder = raw
        .placeholder
        .map(|p| normalize(&p))
        .filter(|p| is_single_cluster(p))
        .unwrap_or_else(|| DEFAULT_PLACEHOLDER.to_string());

    let mut mapping = BTreeMap::new();
    let mut inverse: Vec<Option<String>> = vec![None; anchor_count];

    for (raw_key, raw_index) in &raw.mapping {
        let key = normalize_cluster(raw_key);
        let index = usize::try_from(*raw_index).unwrap_or(usize::MAX);

        let reason = if !is_single_cluster(&key) {
            Some("key is not a single character")
        } else if key == placeholder {
            Some("key is the placeholder")
        } else if mapping.contains_key(&key) {
            Some("key collides after normalization")
        } else if index >= anchor_count {
            Some("anchor index out of range")
        } else if index == sentinel {
            Some("anchor is the sentinel")
        } else if inverse[index].is_some() {
            Some("anchor already claimed")
        } else {
            None
        };

        if let Some(reason) = reason {
            warn!(
                "event=rule_dropped module=rules anchor={} reason=\"{}\"",
                raw_index, reason
            );
            continue;
        }

        inverse[index] = Some(key.clone());
        mapping.insert(key, index);
    }

    let curvature = raw
        .curvature
        .filter(|c| c.is_finite())
        .unwrap_or(DEFAULT_CURVATURE);

    let loop_radius = raw
        .loop_radius
        .filter(|r| r.is_finite() && *r >= 0.0)
        .unwrap_or(DEFAULT_LOOP_RADIUS);

    let fractal_depth = raw
        .fractal_depth
        .unwrap_or(0)
        .clamp(0, MAX_FRACTAL_DEPTH as i64) as u8;

    Ok(EncodingRules {
        version,
        mapping,
        sentinel,
        placeholder,
        connection: raw.connection.unwrap_or_default(),
        curvature,
        fractal_depth,
        loop_radius,
        codec_min_version,
        inverse,
    })
}

fn check_codec_version(min: &str) -> Result<(), RulesError> {
    let current = semver::Version::parse(CODEC_VERSION)
        .map_err(|_| RulesError::InvalidMinVersion(CODEC_VERSION.to_string()))?;
    let required =
        semver::Version::parse(min).map_err(|_| RulesError::InvalidMinVersion(min.to_string()))?;

    if current < required {
        return Err(RulesError::CodecTooOld(min.to_string(), CODEC_VERSION.to_string()));
    }
    Ok(())
}

impl EncodingRules {
    /// Resolve one normalized cluster to its anchor. Never fails.
    pub fn resolve_anchor(&self, cluster: &str) -> Resolution {
        match self.mapping.get(cluster) {
            Some(&index) => Resolution::Mapped(index),
            None => Resolution::Sentinel(self.sentinel),
        }
    }

    /// Inverse lookup. Anchors without a mapped cluster yield the placeholder.
    pub fn resolve_char(&self, index: AnchorIndex) -> &str {
        self.inverse
            .get(index)
            .and_then(|c| c.as_deref())
            .unwrap_or(&self.placeholder)
    }

    /// True for the sentinel and for every anchor a mapped cluster owns.
    pub fn is_claimed(&self, index: AnchorIndex) -> bool {
        index == self.sentinel || matches!(self.inverse.get(index), Some(Some(_)))
    }

    /// Serialize back to a rule object accepted by [`normalize_rules`].
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
