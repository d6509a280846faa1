//! Raster crop and clip
//!
//! Cropping keeps the window of cells overlapping a bounding box; clipping
//! additionally masks cells not covered by a geometry.

use geo::Geometry;
use ndarray::{s, Array2, Zip};
use stratagis_core::raster::{Band, Raster, RasterElement};
use stratagis_core::vector::BoundingBox;
use stratagis_core::{Error, Result};
use tracing::debug;

use crate::rasterize::{burn, BurnMode};

/// Tolerance for snapping window edges that land on a cell boundary
const EDGE_EPS: f64 = 1e-9;

/// Cell window `(col0, row0, col1, row1)` of `raster` overlapping `bbox`
fn window<T: RasterElement>(raster: &Raster<T>, bbox: &BoundingBox) -> Option<(usize, usize, usize, usize)> {
    let t = raster.transform();
    let corners = [
        (bbox.min_x, bbox.min_y),
        (bbox.max_x, bbox.min_y),
        (bbox.max_x, bbox.max_y),
        (bbox.min_x, bbox.max_y),
    ];
    let (mut c_lo, mut r_lo) = (f64::INFINITY, f64::INFINITY);
    let (mut c_hi, mut r_hi) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for (x, y) in corners {
        let (c, r) = t.geo_to_cell_fraction(x, y);
        c_lo = c_lo.min(c);
        c_hi = c_hi.max(c);
        r_lo = r_lo.min(r);
        r_hi = r_hi.max(r);
    }

    let clamp = |v: f64, max: usize| v.max(0.0).min(max as f64) as usize;
    let col0 = clamp((c_lo + EDGE_EPS).floor(), raster.cols());
    let col1 = clamp((c_hi - EDGE_EPS).ceil(), raster.cols());
    let row0 = clamp((r_lo + EDGE_EPS).floor(), raster.rows());
    let row1 = clamp((r_hi - EDGE_EPS).ceil(), raster.rows());
    (col0 < col1 && row0 < row1).then_some((col0, row0, col1, row1))
}

/// Cut out the cells of `raster` that overlap `bbox`.
///
/// The result keeps every band, the nodata values and the CRS; its transform
/// is shifted to the window origin. Fails with [`Error::EmptyResult`] when the
/// box misses the raster.
pub fn crop<T: RasterElement>(raster: &Raster<T>, bbox: &BoundingBox) -> Result<Raster<T>> {
    let (col0, row0, col1, row1) = window(raster, bbox)
        .ok_or_else(|| Error::EmptyResult(format!("bbox {:?} does not overlap the raster", bbox.to_array())))?;

    let bands = raster
        .bands()
        .iter()
        .map(|band| {
            Band::from_array(band.data().slice(s![row0..row1, col0..col1]).to_owned())
                .with_nodata(band.nodata())
                .with_data_type(band.data_type())
        })
        .collect();
    let mut out = Raster::from_bands(bands, raster.transform().shifted(col0 as i64, row0 as i64))?;
    out.set_crs(raster.crs().cloned());
    debug!(col0, row0, cols = col1 - col0, rows = row1 - row0, "cropped raster");
    Ok(out)
}

/// Crop `raster` to the bounds of `geometry` and set cells outside it to
/// nodata.
///
/// Polygons keep the cells whose centers fall inside; lines and points keep
/// the cells they touch. Bands without a nodata value get the element type's
/// default one.
pub fn clip<T: RasterElement>(raster: &Raster<T>, geometry: &Geometry<f64>) -> Result<Raster<T>> {
    clip_masked(raster, geometry).map(|(out, _)| out)
}

/// [`clip`], also returning the cells of the cropped window covered by
/// `geometry`.
///
/// The mask is the only reliable record of coverage: the substituted nodata
/// may collide with real values, e.g. 0 in an unsigned band.
pub(crate) fn clip_masked<T: RasterElement>(
    raster: &Raster<T>,
    geometry: &Geometry<f64>,
) -> Result<(Raster<T>, Array2<bool>)> {
    let bbox = BoundingBox::from_geometry(geometry)
        .ok_or_else(|| Error::UnsupportedGeometry("cannot clip by an empty geometry".into()))?;
    let cropped = crop(raster, &bbox)?;
    let grid = cropped.grid();

    let mut inside = Array2::from_elem((grid.height, grid.width), false);
    burn(geometry, &grid, BurnMode::Fill, |col, row| inside[(row, col)] = true);

    let transform = *cropped.transform();
    let crs = cropped.crs().cloned();
    let bands = cropped
        .into_bands()
        .into_iter()
        .map(|band| {
            let nodata = band.nodata().unwrap_or_else(T::default_nodata);
            let data_type = band.data_type();
            let mut data = band.into_array();
            Zip::from(&mut data).and(&inside).for_each(|v, &keep| {
                if !keep {
                    *v = nodata;
                }
            });
            Band::from_array(data)
                .with_nodata(Some(nodata))
                .with_data_type(data_type)
        })
        .collect();
    let mut out = Raster::from_bands(bands, transform)?;
    out.set_crs(crs);
    Ok((out, inside))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;
    use stratagis_core::GeoTransform;

    /// 4x4 grid over [0,4]x[0,4], values 0..16 row-major from the top
    fn sample() -> Raster<f64> {
        let values: Vec<f64> = (0..16).map(f64::from).collect();
        let band = Band::from_vec(values, 4, 4).unwrap().with_nodata(Some(-9999.0));
        Raster::single(band, GeoTransform::new(0.0, 4.0, 1.0, -1.0).unwrap())
    }

    #[test]
    fn test_crop_window_and_transform() {
        let r = sample();
        let out = crop(&r, &BoundingBox::new(1.0, 1.0, 3.0, 3.0)).unwrap();
        assert_eq!(out.shape(), (2, 2));
        assert_eq!(out.bbox(), BoundingBox::new(1.0, 1.0, 3.0, 3.0));
        let band = out.band(0).unwrap();
        assert_eq!(band.get(0, 0).unwrap(), 5.0);
        assert_eq!(band.get(1, 1).unwrap(), 10.0);
        assert_eq!(band.nodata(), Some(-9999.0));
    }

    #[test]
    fn test_crop_partial_cells_are_included() {
        let r = sample();
        let out = crop(&r, &BoundingBox::new(0.5, 0.5, 1.5, 1.5)).unwrap();
        assert_eq!(out.shape(), (2, 2));
    }

    #[test]
    fn test_crop_outside_is_empty() {
        let r = sample();
        let err = crop(&r, &BoundingBox::new(10.0, 10.0, 12.0, 12.0)).unwrap_err();
        assert!(matches!(err, Error::EmptyResult(_)));
        // Touching the edge only is not an overlap either.
        assert!(crop(&r, &BoundingBox::new(4.0, 0.0, 5.0, 4.0)).is_err());
    }

    #[test]
    fn test_clip_masks_outside_cells() {
        let r = sample();
        // L-shape over [0,2]x[0,2] missing the upper-right cell.
        let ell = Geometry::Polygon(polygon![
            (x: 0.0, y: 0.0),
            (x: 2.0, y: 0.0),
            (x: 2.0, y: 1.0),
            (x: 1.0, y: 1.0),
            (x: 1.0, y: 2.0),
            (x: 0.0, y: 2.0),
        ]);
        let out = clip(&r, &ell).unwrap();
        assert_eq!(out.shape(), (2, 2));
        let band = out.band(0).unwrap();
        let valid: Vec<f64> = band.valid_cells().map(|(_, _, v)| v).collect();
        // Centers (0.5,1.5), (0.5,0.5), (1.5,0.5) are inside; (1.5,1.5) is not.
        assert_eq!(valid, vec![8.0, 12.0, 13.0]);
        assert_eq!(band.get(0, 1).unwrap(), -9999.0);
    }

    #[test]
    fn test_clip_assigns_default_nodata() {
        let band = Band::from_vec(vec![1i32, 2, 3, 4], 2, 2).unwrap();
        let r = Raster::single(band, GeoTransform::new(0.0, 2.0, 1.0, -1.0).unwrap());
        let left = Geometry::Polygon(polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 2.0),
            (x: 0.0, y: 2.0),
        ]);
        let out = clip(&r, &left).unwrap();
        let band = out.band(0).unwrap();
        assert_eq!(band.nodata(), Some(i32::MIN));
        assert_eq!(band.valid_cells().count(), 2);
    }

    #[test]
    fn test_clip_mask_keeps_zero_cells_of_unsigned_bands() {
        let band = Band::from_vec(vec![0u8, 1, 0, 1], 2, 2).unwrap();
        let r = Raster::single(band, GeoTransform::new(0.0, 2.0, 1.0, -1.0).unwrap());
        let left = Geometry::Polygon(polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 2.0),
            (x: 0.0, y: 2.0),
        ]);
        let (out, inside) = clip_masked(&r, &left).unwrap();
        // The default nodata for u8 is 0, the same as the covered cells.
        assert_eq!(out.band(0).unwrap().nodata(), Some(0));
        assert_eq!(inside.iter().filter(|k| **k).count(), 2);
        assert!(inside[(0, 0)] && inside[(1, 0)]);
        assert!(!inside[(0, 1)] && !inside[(1, 1)]);
    }
}
