//! Raster windowing against vector footprints

mod clip;

pub use clip::{clip, crop};
pub(crate) use clip::clip_masked;
