//! Lattice Model - Immutable Coordinate System
//!
//! A lattice is built once from the source's raw data and never changes
//! afterwards. Anchor order is part of its identity: reordering anchors
//! changes what every issued content hash means.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CodecError, CodecResult};
use crate::render::RenderStyle;
use crate::rules::{normalize_rules, AnchorIndex, EncodingRules};

pub type LatticeId = String;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn midpoint(&self, other: &Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }
}

/// Axis-aligned box around a set of points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn of<'a>(points: impl IntoIterator<Item = &'a Point>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut b = Bounds {
            min_x: first.x,
            min_y: first.y,
            max_x: first.x,
            max_y: first.y,
        };
        for p in iter {
            b.min_x = b.min_x.min(p.x);
            b.min_y = b.min_y.min(p.y);
            b.max_x = b.max_x.max(p.x);
            b.max_y = b.max_y.max(p.y);
        }
        Some(b)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> Point {
        Point::new((self.min_x + self.max_x) / 2.0, (self.min_y + self.max_y) / 2.0)
    }

    pub fn inflate(&self, by: f64) -> Bounds {
        Bounds {
            min_x: self.min_x - by,
            min_y: self.min_y - by,
            max_x: self.max_x + by,
            max_y: self.max_y + by,
        }
    }
}

/// Lattice data exactly as the external registry supplies it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawLattice {
    pub id: LatticeId,
    pub anchors_json: Vec<Point>,
    #[serde(default)]
    pub rules_json: Value,
    #[serde(default)]
    pub default_style: Option<RenderStyle>,
    /// Marks the lattice used when a caller names none.
    #[serde(default)]
    pub default: bool,
}

#[derive(Debug, Clone)]
pub struct Lattice {
    id: LatticeId,
    anchors: Vec<Point>,
    rules: EncodingRules,
    default_style: RenderStyle,
    bounds: Bounds,
}

impl Lattice {
    pub fn new(
        id: impl Into<LatticeId>,
        anchors: Vec<Point>,
        rules_json: &Value,
        default_style: Option<RenderStyle>,
    ) -> CodecResult<Self> {
        let id = id.into();

        if id.trim().is_empty() {
            return Err(CodecError::unavailable(id, "lattice id is empty"));
        }

        if let Some(i) = anchors.iter().position(|p| !p.x.is_finite() || !p.y.is_finite()) {
            return Err(CodecError::unavailable(id, format!("anchor {} is not finite", i)));
        }

        let rules = normalize_rules(rules_json, anchors.len())
            .map_err(|e| CodecError::unavailable(id.clone(), e.to_string()))?;

        let bounds = Bounds::of(&anchors)
            .ok_or_else(|| CodecError::unavailable(id.clone(), "lattice has no anchors"))?;

        Ok(Self {
            id,
            anchors,
            rules,
            default_style: default_style.unwrap_or_default(),
            bounds,
        })
    }

    pub fn from_raw(raw: RawLattice) -> CodecResult<Self> {
        Self::new(raw.id, raw.anchors_json, &raw.rules_json, raw.default_style)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn anchors(&self) -> &[Point] {
        &self.anchors
    }

    pub fn anchor(&self, index: AnchorIndex) -> Option<Point> {
        self.anchors.get(index).copied()
    }

    pub fn anchor_count(&self) -> usize {
        self.anchors.len()
    }

    pub fn rules(&self) -> &EncodingRules {
        &self.rules
    }

    pub fn default_style(&self) -> &RenderStyle {
        &self.default_style
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }
}
