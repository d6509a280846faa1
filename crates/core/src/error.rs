//! Error types for StrataGis

use thiserror::Error;

use crate::vector::{FeatureId, GeometryKind};

/// Main error type for StrataGis operations.
///
/// Variants fall in two groups. Configuration errors (`InvalidParameter`,
/// `MissingParameter`, `SingularTransform`, `GeometryTypeMismatch`,
/// `UnsupportedGeometry`) are raised before any computation starts. Data
/// errors describe a problem with the values being processed.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Band index {index} out of range for raster with {bands} band(s)")]
    BandOutOfRange { index: usize, bands: usize },

    #[error("Singular affine transform (determinant {det})")]
    SingularTransform { det: f64 },

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Missing parameter: {name} ({reason})")]
    MissingParameter { name: &'static str, reason: String },

    #[error("Geometry type mismatch: collection holds {expected:?}, got {found:?}")]
    GeometryTypeMismatch {
        expected: GeometryKind,
        found: GeometryKind,
    },

    #[error("Unsupported geometry: {0}")]
    UnsupportedGeometry(String),

    #[error("Row has {found} values but the collection has {expected} fields")]
    RowLength { expected: usize, found: usize },

    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Feature {0} not found")]
    FeatureNotFound(FeatureId),

    #[error("No feature in the collection has a geometry")]
    NoGeometry,

    #[error("Spatial index has not been built; call create_spatial_index first")]
    IndexNotBuilt,

    #[error("Empty result: {0}")]
    EmptyResult(String),

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for StrataGis operations
pub type Result<T> = std::result::Result<T, Error>;
