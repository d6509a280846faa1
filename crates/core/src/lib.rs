//! # StrataGis Core
//!
//! Core types for the StrataGis spatial engine.
//!
//! This crate provides:
//! - `Raster<T>`: multi-band raster grid with an affine georeference
//! - `GeoTransform` and `GridParams`: grid definition and cell/geo mapping
//! - `FeatureCollection`: attributed features with a single geometry type
//! - `SpatialIndex`: bbox overlap, disjoint and nearest queries
//! - `CRS`: opaque coordinate reference system tags

pub mod config;
pub mod crs;
pub mod error;
pub mod index;
pub mod raster;
pub mod vector;

pub use config::{IndexBackend, IndexConfig};
pub use crs::CRS;
pub use error::{Error, Result};
pub use index::SpatialIndex;
pub use raster::{Band, GeoTransform, GridParams, GridSpec, Raster, RasterElement};
pub use vector::{AttributeValue, BoundingBox, Feature, FeatureCollection, FeatureId, GeometryKind};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::{IndexBackend, IndexConfig};
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::index::SpatialIndex;
    pub use crate::raster::{Band, DataType, GeoTransform, GridParams, GridSpec, Raster, RasterElement};
    pub use crate::vector::{
        AttributeValue, BoundingBox, Feature, FeatureCollection, FeatureId, GeometryKind,
    };
    pub use crate::Algorithm;
}

/// Core trait for the engines built on this crate.
///
/// Engines are pure functions of their input and parameters.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
