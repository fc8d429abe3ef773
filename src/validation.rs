//! Payload Validation - Structural Rules
//!
//! Rules produce structured violations against a lattice.
//! The decoder refuses any payload with at least one violation.

use serde::{Deserialize, Serialize};

use crate::encoder::{CurveControl, EncodedPath};
use crate::error::CodecError;
use crate::lattice::Lattice;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PayloadViolation {
    pub rule: String,
    pub message: String,
    pub expected: Option<String>,
    pub actual: Option<String>,
}

impl PayloadViolation {
    fn new(rule: &str, message: impl Into<String>) -> Self {
        Self {
            rule: rule.to_string(),
            message: message.into(),
            expected: None,
            actual: None,
        }
    }

    fn expected(mut self, expected: impl ToString, actual: impl ToString) -> Self {
        self.expected = Some(expected.to_string());
        self.actual = Some(actual.to_string());
        self
    }
}

/// Structural rule over an encoded path.
pub trait PayloadRule {
    fn name(&self) -> &'static str;
    fn check(&self, path: &EncodedPath, lattice: &Lattice) -> Vec<PayloadViolation>;
}

// --- Concrete Rules ---

/// `paths.len() == vertices.len() - 1`, both empty for empty text.
pub struct SegmentCountRule;

impl PayloadRule for SegmentCountRule {
    fn name(&self) -> &'static str {
        "segment_count"
    }

    fn check(&self, path: &EncodedPath, _lattice: &Lattice) -> Vec<PayloadViolation> {
        let expected = path.vertices.len().saturating_sub(1);
        if path.paths.len() != expected {
            vec![PayloadViolation::new(self.name(), "Path count does not match vertex count")
                .expected(expected, path.paths.len())]
        } else {
            vec![]
        }
    }
}

/// Every vertex addresses an anchor of the lattice.
pub struct VertexRangeRule;

impl PayloadRule for VertexRangeRule {
    fn name(&self) -> &'static str {
        "vertex_range"
    }

    fn check(&self, path: &EncodedPath, lattice: &Lattice) -> Vec<PayloadViolation> {
        let count = lattice.anchor_count();
        path.vertices
            .iter()
            .enumerate()
            .filter(|(_, v)| **v >= count)
            .map(|(i, v)| {
                PayloadViolation::new(self.name(), format!("Vertex {} is outside the lattice", i))
                    .expected(format!("< {}", count), v)
            })
            .collect()
    }
}

/// Segment `i` joins vertex `i` to vertex `i + 1`.
pub struct SegmentLinkRule;

impl PayloadRule for SegmentLinkRule {
    fn name(&self) -> &'static str {
        "segment_link"
    }

    fn check(&self, path: &EncodedPath, _lattice: &Lattice) -> Vec<PayloadViolation> {
        path.paths
            .iter()
            .enumerate()
            .filter(|(i, seg)| seg.from != *i || seg.to != i + 1)
            .map(|(i, seg)| {
                PayloadViolation::new(self.name(), format!("Segment {} links the wrong vertices", i))
                    .expected(format!("{}->{}", i, i + 1), format!("{}->{}", seg.from, seg.to))
            })
            .collect()
    }
}

/// Curve descriptors carry usable geometry.
pub struct ControlShapeRule;

impl PayloadRule for ControlShapeRule {
    fn name(&self) -> &'static str {
        "control_shape"
    }

    fn check(&self, path: &EncodedPath, _lattice: &Lattice) -> Vec<PayloadViolation> {
        let mut violations = vec![];
        for (i, seg) in path.paths.iter().enumerate() {
            match &seg.control {
                CurveControl::Fractal { points, .. } if points.is_empty() => {
                    violations.push(PayloadViolation::new(
                        self.name(),
                        format!("Segment {} has an empty loop", i),
                    ));
                }
                CurveControl::Quadratic { x, y } if !x.is_finite() || !y.is_finite() => {
                    violations.push(PayloadViolation::new(
                        self.name(),
                        format!("Segment {} has a non-finite control point", i),
                    ));
                }
                _ => {}
            }
        }
        violations
    }
}

/// Runs every structural rule.
pub struct PayloadValidator {
    rules: Vec<Box<dyn PayloadRule + Send + Sync>>,
}

impl PayloadValidator {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(SegmentCountRule),
                Box::new(VertexRangeRule),
                Box::new(SegmentLinkRule),
                Box::new(ControlShapeRule),
            ],
        }
    }

    pub fn violations(&self, path: &EncodedPath, lattice: &Lattice) -> Vec<PayloadViolation> {
        self.rules
            .iter()
            .flat_map(|rule| rule.check(path, lattice))
            .collect()
    }

    /// Fail closed: any violation rejects the whole payload.
    pub fn validate(&self, path: &EncodedPath, lattice: &Lattice) -> Result<(), CodecError> {
        let violations = self.violations(path, lattice);
        if violations.is_empty() {
            return Ok(());
        }
        let messages: Vec<_> = violations
            .iter()
            .map(|v| format!("{}: {}", v.rule, v.message))
            .collect();
        Err(CodecError::MalformedPayload(messages.join("; ")))
    }
}

impl Default for PayloadValidator {
    fn default() -> Self {
        Self::new()
    }
}
