//! Aggregation vocabulary and zonal statistics
//!
//! - **aggregate**: reductions shared by joins, rasterization and zones
//! - **zonal**: raster values summarised per vector or raster zone

mod aggregate;
pub mod zonal;

pub use aggregate::{Aggregate, CustomFn};
pub use zonal::{
    zonal_statistics, zonal_statistics_by_raster, zonal_statistics_raster, ZonalOptions, ZonalResult,
};
