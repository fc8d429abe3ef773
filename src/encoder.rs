//! Encoder - Text to Encoded Path
//!
//! Output is a pure function of (text, lattice) apart from `timestamp`,
//! which never reaches the content hash. Encoding is total: clusters the
//! lattice does not map visit the sentinel anchor.

use std::f64::consts::PI;

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::hashing::compute_content_hash;
use crate::lattice::{Lattice, LatticeId, Point};
use crate::normalize::{clusters, normalize};
use crate::rules::{AnchorIndex, ConnectionPolicy, EncodingRules};

/// Rotation step between consecutive loops of one repeated character.
const REPEAT_ROTATION: f64 = PI / 8.0;

/// Shape of the stroke between two consecutive vertices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CurveControl {
    Straight,
    /// Quadratic curve through one control point.
    Quadratic { x: f64, y: f64 },
    /// Closed loop around a repeated anchor.
    Fractal { depth: u8, points: Vec<Point> },
}

/// Joins `vertices[from]` to `vertices[to]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSegment {
    pub from: usize,
    pub to: usize,
    pub control: CurveControl,
}

/// The geometric object produced by encoding ("GIO").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedPath {
    pub lattice_type: LatticeId,
    pub paths: Vec<PathSegment>,
    pub vertices: Vec<AnchorIndex>,
    pub content_hash: String,
    pub timestamp: DateTime<Utc>,
}

impl EncodedPath {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// True when both paths carry the same geometry and hash.
    pub fn same_content(&self, other: &EncodedPath) -> bool {
        self.lattice_type == other.lattice_type
            && self.paths == other.paths
            && self.vertices == other.vertices
            && self.content_hash == other.content_hash
    }
}

/// Encode text under a lattice, stamped with the current time.
pub fn encode(text: &str, lattice: &Lattice) -> EncodedPath {
    encode_at(text, lattice, Utc::now())
}

/// Encode text with an explicit timestamp.
pub fn encode_at(text: &str, lattice: &Lattice, timestamp: DateTime<Utc>) -> EncodedPath {
    let rules = lattice.rules();
    let normalized = normalize(text);

    let mut vertices = Vec::new();
    let mut projection = String::with_capacity(normalized.len());
    let mut sentinel_hits = 0usize;

    for cluster in clusters(&normalized) {
        let resolution = rules.resolve_anchor(cluster);
        if resolution.is_sentinel() {
            sentinel_hits += 1;
            projection.push_str(&rules.placeholder);
        } else {
            projection.push_str(cluster);
        }
        vertices.push(resolution.index());
    }

    let paths = build_segments(&vertices, lattice);
    let content_hash = compute_content_hash(&projection, lattice.id(), &rules.version);

    debug!(
        "event=encode module=encoder lattice={} vertices={} sentinel_hits={} hash={}",
        lattice.id(),
        vertices.len(),
        sentinel_hits,
        content_hash
    );

    EncodedPath {
        lattice_type: lattice.id().to_string(),
        paths,
        vertices,
        content_hash,
        timestamp,
    }
}

fn build_segments(vertices: &[AnchorIndex], lattice: &Lattice) -> Vec<PathSegment> {
    let rules = lattice.rules();
    let mut segments = Vec::with_capacity(vertices.len().saturating_sub(1));
    let mut run = 0usize;

    for (i, pair) in vertices.windows(2).enumerate() {
        let (from, to) = (pair[0], pair[1]);
        // indices come from the rules, which only produce in-range anchors
        let (Some(a), Some(b)) = (lattice.anchor(from), lattice.anchor(to)) else {
            segments.push(PathSegment { from: i, to: i + 1, control: CurveControl::Straight });
            continue;
        };

        let control = if from == to {
            let control = repeat_control(a, run, rules);
            run += 1;
            control
        } else {
            run = 0;
            match rules.connection {
                ConnectionPolicy::Straight => CurveControl::Straight,
                ConnectionPolicy::Curved => curved_control(i, a, b, rules.curvature),
            }
        };

        segments.push(PathSegment { from: i, to: i + 1, control });
    }

    segments
}

/// Midpoint pushed along the left-hand normal, alternating sides per segment.
fn curved_control(index: usize, a: Point, b: Point, curvature: f64) -> CurveControl {
    let mid = a.midpoint(&b);
    let sign = if index % 2 == 0 { 1.0 } else { -1.0 };
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    CurveControl::Quadratic {
        x: round6(mid.x - sign * curvature * dy),
        y: round6(mid.y + sign * curvature * dx),
    }
}

/// Loop for the `run`-th consecutive repeat of one anchor.
///
/// Depth 1 is a square of radius `loop_radius`; each further level doubles
/// the point count, every new point sitting on the same circle between its
/// neighbours. The whole loop turns by `REPEAT_ROTATION` per repeat.
fn repeat_control(center: Point, run: usize, rules: &EncodingRules) -> CurveControl {
    let depth = rules.fractal_depth;
    if depth == 0 {
        return CurveControl::Straight;
    }

    let count = 4usize << (depth - 1);
    let start = run as f64 * REPEAT_ROTATION;
    let r = rules.loop_radius;

    let points = (0..count)
        .map(|k| {
            let theta = start + 2.0 * PI * k as f64 / count as f64;
            Point::new(
                round6(center.x + r * theta.cos()),
                round6(center.y + r * theta.sin()),
            )
        })
        .collect();

    CurveControl::Fractal { depth, points }
}

fn round6(v: f64) -> f64 {
    let r = (v * 1e6).round() / 1e6;
    if r == 0.0 {
        0.0
    } else {
        r
    }
}
