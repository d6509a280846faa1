//! Georeferenced raster dataset

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{Band, GeoTransform, GridSpec, RasterElement};
use crate::vector::BoundingBox;

/// A georeferenced raster: an ordered list of equally-sized bands sharing one
/// [`GeoTransform`] and CRS tag.
///
/// # Example
///
/// ```ignore
/// use stratagis_core::{Band, GeoTransform, Raster};
///
/// let transform = GeoTransform::new(0.0, 100.0, 1.0, -1.0)?;
/// let mut raster = Raster::single(Band::<f32>::new(100, 100), transform);
/// raster.band_mut(0)?.set(10, 20, 42.0)?;
/// ```
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    bands: Vec<Band<T>>,
    rows: usize,
    cols: usize,
    transform: GeoTransform,
    crs: Option<CRS>,
}

impl<T: RasterElement> Raster<T> {
    /// Create a raster without bands; bands are added with [`Raster::add_band`]
    pub fn new(rows: usize, cols: usize, transform: GeoTransform) -> Self {
        Self {
            bands: Vec::new(),
            rows,
            cols,
            transform,
            crs: None,
        }
    }

    /// Create a single-band raster
    pub fn single(band: Band<T>, transform: GeoTransform) -> Self {
        let (rows, cols) = band.shape();
        Self {
            bands: vec![band],
            rows,
            cols,
            transform,
            crs: None,
        }
    }

    /// Create a single-band raster over `grid` with every cell set to `fill`
    pub fn from_grid(grid: &GridSpec, fill: T) -> Self {
        Self::single(Band::filled(grid.height, grid.width, fill), grid.transform)
    }

    /// Create from several bands; all must share one shape
    pub fn from_bands(bands: Vec<Band<T>>, transform: GeoTransform) -> Result<Self> {
        let Some(first) = bands.first() else {
            return Err(Error::InvalidDimensions {
                width: 0,
                height: 0,
            });
        };
        let (rows, cols) = first.shape();
        let mut raster = Self::new(rows, cols, transform);
        for band in bands {
            raster.add_band(band)?;
        }
        Ok(raster)
    }

    /// Append a band, rejecting one whose shape differs from the raster
    pub fn add_band(&mut self, band: Band<T>) -> Result<()> {
        let (rows, cols) = band.shape();
        if (rows, cols) != (self.rows, self.cols) {
            return Err(Error::SizeMismatch {
                er: self.rows,
                ec: self.cols,
                ar: rows,
                ac: cols,
            });
        }
        self.bands.push(band);
        Ok(())
    }

    // Dimensions

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    // Bands

    pub fn bands(&self) -> &[Band<T>] {
        &self.bands
    }

    pub fn band(&self, index: usize) -> Result<&Band<T>> {
        let bands = self.bands.len();
        self.bands
            .get(index)
            .ok_or(Error::BandOutOfRange { index, bands })
    }

    pub fn band_mut(&mut self, index: usize) -> Result<&mut Band<T>> {
        let bands = self.bands.len();
        self.bands
            .get_mut(index)
            .ok_or(Error::BandOutOfRange { index, bands })
    }

    pub fn into_bands(self) -> Vec<Band<T>> {
        self.bands
    }

    // Metadata

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// Replace the geotransform shared by all bands
    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    pub fn set_crs(&mut self, crs: Option<CRS>) {
        self.crs = crs;
    }

    /// Grid definition of this raster
    pub fn grid(&self) -> GridSpec {
        GridSpec {
            transform: self.transform,
            width: self.cols,
            height: self.rows,
        }
    }

    /// Cell size (assumes square cells)
    pub fn cell_size(&self) -> f64 {
        self.transform.cell_size()
    }

    /// Geographic bounds
    pub fn bbox(&self) -> BoundingBox {
        let (min_x, min_y, max_x, max_y) = self.transform.bounds(self.cols, self.rows);
        BoundingBox::new(min_x, min_y, max_x, max_y)
    }

    // Coordinate conversion

    /// Center of cell `(col, row)` in geographic coordinates
    pub fn cell_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        self.transform.cell_to_geo(col, row)
    }

    /// Cell containing a geographic coordinate, `None` when outside the raster
    pub fn geo_to_cell(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        let (col, row) = self.transform.geo_to_cell(x, y);
        if col < 0 || row < 0 || col as usize >= self.cols || row as usize >= self.rows {
            return None;
        }
        Some((col as usize, row as usize))
    }
}
