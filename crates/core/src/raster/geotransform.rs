//! Affine geotransformation for rasters

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Affine transformation between cell space and geographic space.
///
/// Coefficients are held in the order
/// `[xscale, xskew, xoffset, yskew, yscale, yoffset]`:
/// ```text
/// x = xoffset + col * xscale + row * xskew
/// y = yoffset + col * yskew  + row * yscale
/// ```
/// `(col, row) = (0, 0)` is the upper-left corner of the first cell. The
/// inverse matrix is computed together with the forward coefficients, so a
/// `GeoTransform` can never be observed with the two out of sync.
///
/// For north-up images the skew terms are 0 and `yscale` is negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f64; 6]", into = "[f64; 6]")]
pub struct GeoTransform {
    forward: [f64; 6],
    inverse: [f64; 6],
}

impl GeoTransform {
    /// Create a north-up transform with no skew.
    ///
    /// `origin_x`/`origin_y` locate the upper-left corner of cell (0, 0).
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Result<Self> {
        Self::from_affine([pixel_width, 0.0, origin_x, 0.0, pixel_height, origin_y])
    }

    /// Create from the six coefficients `[xscale, xskew, xoffset, yskew, yscale, yoffset]`.
    ///
    /// Fails if any coefficient is not finite or the scale/skew submatrix is singular.
    pub fn from_affine(affine: [f64; 6]) -> Result<Self> {
        if let Some(bad) = affine.iter().find(|c| !c.is_finite()) {
            return Err(Error::InvalidParameter {
                name: "affine",
                value: bad.to_string(),
                reason: "affine coefficients must be finite".into(),
            });
        }
        let inverse = invert(&affine)?;
        Ok(Self {
            forward: affine,
            inverse,
        })
    }

    /// Create from GDAL-style array `[origin_x, pixel_width, row_rotation, origin_y, col_rotation, pixel_height]`
    pub fn from_gdal(coeffs: [f64; 6]) -> Result<Self> {
        Self::from_affine([coeffs[1], coeffs[2], coeffs[0], coeffs[4], coeffs[5], coeffs[3]])
    }

    /// Convert to GDAL-style array
    pub fn to_gdal(&self) -> [f64; 6] {
        let [a, b, c, d, e, f] = self.forward;
        [c, a, b, f, d, e]
    }

    /// Forward coefficients `[xscale, xskew, xoffset, yskew, yscale, yoffset]`
    pub fn affine(&self) -> [f64; 6] {
        self.forward
    }

    /// Inverse coefficients mapping geographic coordinates to fractional cell coordinates
    pub fn inverse(&self) -> [f64; 6] {
        self.inverse
    }

    pub fn xscale(&self) -> f64 {
        self.forward[0]
    }

    pub fn yscale(&self) -> f64 {
        self.forward[4]
    }

    pub fn xoffset(&self) -> f64 {
        self.forward[2]
    }

    pub fn yoffset(&self) -> f64 {
        self.forward[5]
    }

    /// Return a copy translated so that cell `(col, row)` becomes cell `(0, 0)`.
    pub fn shifted(&self, col: i64, row: i64) -> Self {
        let (x, y) = self.apply(col as f64, row as f64);
        let [a, b, _, d, e, _] = self.forward;
        let forward = [a, b, x, d, e, y];
        // Same submatrix, so the inverse cannot fail.
        let inverse = invert_unchecked(&forward, a * e - b * d);
        Self { forward, inverse }
    }

    #[inline]
    fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        let [a, b, c, d, e, f] = self.forward;
        (a * col + b * row + c, d * col + e * row + f)
    }

    /// Geographic coordinate of the center of cell `(col, row)`
    pub fn cell_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        self.apply(col as f64 + 0.5, row as f64 + 0.5)
    }

    /// Geographic coordinate of the upper-left corner of cell `(col, row)`
    pub fn cell_to_geo_corner(&self, col: usize, row: usize) -> (f64, f64) {
        self.apply(col as f64, row as f64)
    }

    /// Geographic coordinate of a fractional cell position
    pub fn fraction_to_geo(&self, col: f64, row: f64) -> (f64, f64) {
        self.apply(col, row)
    }

    /// Fractional cell coordinates of a geographic position
    pub fn geo_to_cell_fraction(&self, x: f64, y: f64) -> (f64, f64) {
        let [a, b, c, d, e, f] = self.inverse;
        (a * x + b * y + c, d * x + e * y + f)
    }

    /// Integer cell containing a geographic position.
    ///
    /// The result may lie outside any particular raster, hence signed.
    pub fn geo_to_cell(&self, x: f64, y: f64) -> (i64, i64) {
        let (col, row) = self.geo_to_cell_fraction(x, y);
        (col.floor() as i64, row.floor() as i64)
    }

    /// Cell size (assumes square cells and no rotation)
    pub fn cell_size(&self) -> f64 {
        self.forward[0].abs()
    }

    /// Area of a single cell in squared CRS units
    pub fn cell_area(&self) -> f64 {
        let [a, b, _, d, e, _] = self.forward;
        (a * e - b * d).abs()
    }

    /// Check if this is a north-up image (no rotation)
    pub fn is_north_up(&self) -> bool {
        self.forward[1] == 0.0 && self.forward[3] == 0.0 && self.forward[4] < 0.0
    }

    /// Bounding box `(min_x, min_y, max_x, max_y)` for a raster of given dimensions
    pub fn bounds(&self, width: usize, height: usize) -> (f64, f64, f64, f64) {
        let (x0, y0) = self.cell_to_geo_corner(0, 0);
        let (x1, y1) = self.cell_to_geo_corner(width, 0);
        let (x2, y2) = self.cell_to_geo_corner(0, height);
        let (x3, y3) = self.cell_to_geo_corner(width, height);

        let min_x = x0.min(x1).min(x2).min(x3);
        let max_x = x0.max(x1).max(x2).max(x3);
        let min_y = y0.min(y1).min(y2).min(y3);
        let max_y = y0.max(y1).max(y2).max(y3);

        (min_x, min_y, max_x, max_y)
    }
}

fn invert(m: &[f64; 6]) -> Result<[f64; 6]> {
    let det = m[0] * m[4] - m[1] * m[3];
    if det == 0.0 || !det.is_finite() {
        return Err(Error::SingularTransform { det });
    }
    Ok(invert_unchecked(m, det))
}

fn invert_unchecked(m: &[f64; 6], det: f64) -> [f64; 6] {
    let [a, b, c, d, e, f] = *m;
    [
        e / det,
        -b / det,
        (b * f - e * c) / det,
        -d / det,
        a / det,
        (d * c - a * f) / det,
    ]
}

impl Default for GeoTransform {
    fn default() -> Self {
        let forward = [1.0, 0.0, 0.0, 0.0, -1.0, 0.0];
        Self {
            forward,
            inverse: invert_unchecked(&forward, -1.0),
        }
    }
}

impl TryFrom<[f64; 6]> for GeoTransform {
    type Error = Error;

    fn try_from(affine: [f64; 6]) -> Result<Self> {
        Self::from_affine(affine)
    }
}

impl From<GeoTransform> for [f64; 6] {
    fn from(t: GeoTransform) -> Self {
        t.forward
    }
}
