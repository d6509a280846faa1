//! # StrataGis Algorithms
//!
//! Engines that move data between the vector and raster models of
//! `stratagis-core`.
//!
//! ## Available Algorithm Categories
//!
//! - **rasterize**: Burn features into a grid, resolving overlaps with a statistic
//! - **vectorize**: Merge raster cells back into polygons
//! - **vector**: Spatial predicates, boolean overlay, spatial join
//! - **raster**: Crop and clip rasters by bounding box or geometry
//! - **statistics**: Aggregation vocabulary and zonal statistics
//!
//! Bulk operations never abort on one bad feature; they return a list of
//! [`Diagnostic`](diagnostics::Diagnostic)s next to the result.

pub mod diagnostics;
pub mod raster;
pub mod rasterize;
pub mod statistics;
pub mod vector;
pub mod vectorize;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::diagnostics::{Diagnostic, DiagnosticKind};
    pub use crate::raster::{clip, crop};
    pub use crate::rasterize::{
        field_value, grid_for, rasterize, rasterize_values, CoverageMode, OverlapPolicy, Rasterize,
        RasterizeOptions, Rasterized,
    };
    pub use crate::statistics::{
        zonal_statistics, zonal_statistics_by_raster, Aggregate, ZonalOptions, ZonalResult,
    };
    pub use crate::vector::{
        overlay, spatial_join, ClipOp, FieldAggregation, JoinMode, JoinOptions, JoinOutput,
        SpatialJoin, SpatialPredicate,
    };
    pub use crate::vectorize::{vectorize, Vectorize, VectorizeOptions};
    pub use stratagis_core::prelude::*;
}
