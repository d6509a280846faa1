//! Raster data structures and georeferencing

mod band;
mod element;
mod geotransform;
mod grid;
mod params;

pub use band::{Band, BandStatistics};
pub use element::{DataType, RasterElement};
pub use geotransform::GeoTransform;
pub use grid::Raster;
pub use params::{CellAnchor, GridParams, GridSpec};
