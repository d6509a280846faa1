//! Vectorization: raster cells back to polygons
//!
//! In merge mode each distinct value becomes the union of its cells, split
//! into one feature per connected polygon. Cells are first grouped into
//! horizontal runs so the union works on far fewer operands than cells.
//! Without merging every valid cell becomes its own square feature.

use std::cmp::Ordering;

use geo::{BoundingRect, Geometry, LineString, MultiPolygon, Polygon};
use num_traits::{One, Zero};
use stratagis_core::raster::{GridSpec, Raster, RasterElement};
use stratagis_core::vector::{AttributeValue, FeatureCollection};
use stratagis_core::{Algorithm, Error, IndexConfig, Result};
use tracing::debug;

use crate::rasterize::cell_polygon;
use crate::vector::union_tree;

/// Parameters for vectorization
#[derive(Debug, Clone, Copy)]
pub struct VectorizeOptions {
    /// Band to read
    pub band: usize,
    /// Union same-valued cells; otherwise one feature per cell
    pub merge: bool,
    /// Treat every valid non-zero cell as the single value 1
    pub boolean: bool,
    /// Index configuration of the output collection
    pub index: IndexConfig,
}

impl Default for VectorizeOptions {
    fn default() -> Self {
        Self {
            band: 0,
            merge: true,
            boolean: false,
            index: IndexConfig::default(),
        }
    }
}

fn to_attribute<T: RasterElement>(value: T) -> AttributeValue {
    match value.to_f64() {
        Some(v) if T::DATA_TYPE.is_float() => AttributeValue::Float(v),
        Some(v) => AttributeValue::Int(v as i64),
        None => AttributeValue::Null,
    }
}

/// Polygon spanning cells `col_start..col_end` of `row`
fn run_polygon(grid: &GridSpec, row: usize, col_start: usize, col_end: usize) -> Polygon<f64> {
    let t = &grid.transform;
    let corners = vec![
        t.cell_to_geo_corner(col_start, row),
        t.cell_to_geo_corner(col_end, row),
        t.cell_to_geo_corner(col_end, row + 1),
        t.cell_to_geo_corner(col_start, row + 1),
        t.cell_to_geo_corner(col_start, row),
    ];
    Polygon::new(LineString::from(corners), vec![])
}

/// Raster scan order: top edge first, then left edge
fn scan_order(a: &Polygon<f64>, b: &Polygon<f64>) -> Ordering {
    match (a.bounding_rect(), b.bounding_rect()) {
        (Some(ra), Some(rb)) => rb
            .max()
            .y
            .total_cmp(&ra.max().y)
            .then(ra.min().x.total_cmp(&rb.min().x)),
        _ => Ordering::Equal,
    }
}

/// Convert a raster band into polygon features.
///
/// Merge mode yields a `value` field; per-cell mode yields `value`, `col`,
/// `row`, `x` and `y` (cell center). Features come out by ascending value.
pub fn vectorize<T: RasterElement>(raster: &Raster<T>, options: &VectorizeOptions) -> Result<FeatureCollection> {
    let band = raster.band(options.band)?;
    let grid = raster.grid();
    let data = band.data();
    let mask = band.mask();

    let class_of = |row: usize, col: usize| -> Option<T> {
        if mask[(row, col)] {
            return None;
        }
        let value = data[(row, col)];
        if options.boolean {
            (!value.is_zero()).then_some(T::one())
        } else {
            Some(value)
        }
    };

    if !options.merge {
        let mut out = FeatureCollection::with_config(["value", "col", "row", "x", "y"], options.index);
        for row in 0..grid.height {
            for col in 0..grid.width {
                let Some(value) = class_of(row, col) else {
                    continue;
                };
                let (x, y) = grid.transform.cell_to_geo(col, row);
                out.add_feature(
                    vec![
                        to_attribute(value),
                        AttributeValue::from(col),
                        AttributeValue::from(row),
                        AttributeValue::Float(x),
                        AttributeValue::Float(y),
                    ],
                    Some(Geometry::Polygon(cell_polygon(&grid, col, row))),
                )?;
            }
        }
        debug!(features = out.len(), "vectorized cells");
        return Ok(out);
    }

    let classes: Vec<T> = if options.boolean {
        let any = (0..grid.height).any(|r| (0..grid.width).any(|c| class_of(r, c).is_some()));
        if any { vec![T::one()] } else { Vec::new() }
    } else {
        band.unique_values()
    };
    let class_index = |value: T| {
        classes
            .binary_search_by(|probe| probe.partial_cmp(&value).unwrap_or(Ordering::Equal))
            .ok()
    };

    // Horizontal runs of equal class, grouped per class.
    let mut runs: Vec<Vec<MultiPolygon<f64>>> = vec![Vec::new(); classes.len()];
    for row in 0..grid.height {
        let mut col = 0;
        while col < grid.width {
            let Some(value) = class_of(row, col) else {
                col += 1;
                continue;
            };
            let start = col;
            while col < grid.width && class_of(row, col) == Some(value) {
                col += 1;
            }
            if let Some(k) = class_index(value) {
                runs[k].push(MultiPolygon::new(vec![run_polygon(&grid, row, start, col)]));
            }
        }
    }

    let mut out = FeatureCollection::with_config(["value"], options.index);
    for (value, parts) in classes.into_iter().zip(runs) {
        let merged = union_tree(parts).map_err(|e| Error::Algorithm(e.to_string()))?;
        let mut polygons: Vec<Polygon<f64>> = merged.map(|mp| mp.0).unwrap_or_default();
        polygons.sort_by(scan_order);
        for polygon in polygons {
            out.add_feature(vec![to_attribute(value)], Some(Geometry::Polygon(polygon)))?;
        }
    }
    debug!(features = out.len(), "vectorized merged regions");
    Ok(out)
}

/// Vectorization as an [`Algorithm`]
#[derive(Debug, Clone, Default)]
pub struct Vectorize;

impl Algorithm for Vectorize {
    type Input = Raster<f64>;
    type Output = FeatureCollection;
    type Params = VectorizeOptions;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Vectorize"
    }

    fn description(&self) -> &'static str {
        "Merge same-valued raster cells into polygon features"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        vectorize(&input, &params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::area;
    use approx::assert_relative_eq;
    use stratagis_core::raster::Band;
    use stratagis_core::vector::BoundingBox;
    use stratagis_core::GeoTransform;

    fn raster(values: Vec<i32>, rows: usize, cols: usize) -> Raster<i32> {
        let band = Band::from_vec(values, rows, cols).unwrap().with_nodata(Some(-1));
        Raster::single(band, GeoTransform::new(0.0, rows as f64, 1.0, -1.0).unwrap())
    }

    #[test]
    fn test_merge_by_value() {
        #[rustfmt::skip]
        let r = raster(vec![
            1, 1, 2,
            1, 2, 2,
            -1, -1, 2,
        ], 3, 3);
        let fc = vectorize(&r, &VectorizeOptions::default()).unwrap();
        assert_eq!(fc.len(), 2);
        let values: Vec<_> = fc.iter().map(|f| f.value_at(0).clone()).collect();
        assert_eq!(values, vec![AttributeValue::Int(1), AttributeValue::Int(2)]);
        let areas: Vec<f64> = fc.iter().map(|f| area(f.geometry().unwrap())).collect();
        assert_relative_eq!(areas[0], 3.0, epsilon = 1e-9);
        assert_relative_eq!(areas[1], 4.0, epsilon = 1e-9);
    }

    #[test]
    fn test_disconnected_regions_split() {
        #[rustfmt::skip]
        let r = raster(vec![
            5, 0, 5,
            0, 0, 0,
        ], 2, 3);
        let fc = vectorize(&r, &VectorizeOptions::default()).unwrap();
        let fives: Vec<_> = fc
            .iter()
            .filter(|f| f.value_at(0) == &AttributeValue::Int(5))
            .collect();
        assert_eq!(fives.len(), 2);
        // Left region first.
        assert_eq!(fives[0].bbox().unwrap(), BoundingBox::new(0.0, 1.0, 1.0, 2.0));
    }

    #[test]
    fn test_hole_survives_union() {
        #[rustfmt::skip]
        let r = raster(vec![
            1, 1, 1,
            1, 0, 1,
            1, 1, 1,
        ], 3, 3);
        let fc = vectorize(&r, &VectorizeOptions::default()).unwrap();
        let ones: Vec<_> = fc.iter().filter(|f| f.value_at(0) == &AttributeValue::Int(1)).collect();
        assert_eq!(ones.len(), 1);
        let Some(Geometry::Polygon(poly)) = ones[0].geometry() else {
            panic!("expected polygon");
        };
        assert_eq!(poly.interiors().len(), 1);
        assert_relative_eq!(area(ones[0].geometry().unwrap()), 8.0, epsilon = 1e-9);
    }

    #[test]
    fn test_boolean_mode() {
        let r = raster(vec![3, 0, 7, 7], 2, 2);
        let opts = VectorizeOptions {
            boolean: true,
            ..Default::default()
        };
        let fc = vectorize(&r, &opts).unwrap();
        assert_eq!(fc.len(), 1);
        assert_eq!(fc.iter().next().unwrap().value_at(0), &AttributeValue::Int(1));
        assert_relative_eq!(area(fc.iter().next().unwrap().geometry().unwrap()), 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_per_cell_mode() {
        let r = raster(vec![4, -1], 1, 2);
        let opts = VectorizeOptions {
            merge: false,
            ..Default::default()
        };
        let fc = vectorize(&r, &opts).unwrap();
        assert_eq!(fc.len(), 1);
        let f = fc.iter().next().unwrap();
        assert_eq!(fc.value(f, "col").unwrap(), &AttributeValue::Int(0));
        assert_eq!(fc.value(f, "x").unwrap(), &AttributeValue::Float(0.5));
        assert_eq!(fc.value(f, "y").unwrap(), &AttributeValue::Float(0.5));
    }

    #[test]
    fn test_band_out_of_range() {
        let r = raster(vec![1], 1, 1);
        let opts = VectorizeOptions {
            band: 3,
            ..Default::default()
        };
        assert!(matches!(vectorize(&r, &opts), Err(Error::BandOutOfRange { .. })));
    }
}
