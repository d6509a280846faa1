//! Per-item diagnostics returned next to bulk results
//!
//! Engines never abort a batch because one feature or one pair is bad.
//! They record what went wrong here and carry on.

use std::fmt;

use stratagis_core::FeatureId;

/// What kind of per-item problem was recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticKind {
    /// Geometry missing or empty; the item was skipped
    EmptyGeometry,
    /// Zero-area or self-intersecting polygon used as a boolean operand
    InvalidClipTarget,
    /// The boolean operation is not defined for these geometry types
    UnsupportedOperation,
    /// A value that should be numeric could not be read as a number
    NonNumericValue,
}

/// One recorded problem
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    /// Feature from the driving collection, if any
    pub left: Option<FeatureId>,
    /// Feature from the other collection, if any
    pub right: Option<FeatureId>,
    pub kind: DiagnosticKind,
    pub message: String,
}

impl Diagnostic {
    pub fn feature(id: FeatureId, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            left: Some(id),
            right: None,
            kind,
            message: message.into(),
        }
    }

    pub fn pair(left: FeatureId, right: FeatureId, kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            left: Some(left),
            right: Some(right),
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.left, self.right) {
            (Some(l), Some(r)) => write!(f, "[{:?}] pair ({l}, {r}): {}", self.kind, self.message),
            (Some(l), None) => write!(f, "[{:?}] feature {l}: {}", self.kind, self.message),
            _ => write!(f, "[{:?}] {}", self.kind, self.message),
        }
    }
}
