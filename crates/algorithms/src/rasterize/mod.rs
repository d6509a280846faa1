//! Rasterization of feature collections
//!
//! Two modes:
//!
//! - [`rasterize`] burns every geometry with a constant "present" value into
//!   an 8-bit band.
//! - [`rasterize_values`] burns a per-feature number and resolves cells
//!   claimed by several features with an aggregation statistic, optionally
//!   narrowed by a priority function and weighted by partial coverage.
//!
//! Conflict resolution in valued mode:
//!
//! 1. Every feature is burned; a cell reached by one feature takes its value.
//! 2. Feature pairs whose geometries intersect are found with the spatial
//!    index (one bbox query per feature, then an exact test). A cell burned
//!    by two or more features of such a pair is flagged as "multi".
//! 3. With [`CoverageMode::Weighted`], polygon outlines are burned into a
//!    "partial" mask.
//! 4. Each flagged cell is recomputed from the features that actually cover
//!    it. In multi cells a polygon counts when it holds the cell center, and
//!    a line or point when it was burned there. In partial cells the cell
//!    footprint decides.
//!
//! Polygons are validated for the coverage overlay once, before the cell
//! loop; an invalid one is reported once and left out of partial cells.

mod burn;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use geo::{Geometry, Intersects, Point};
use ndarray::Array2;
use stratagis_core::raster::{Band, GridParams, GridSpec, Raster};
use stratagis_core::vector::{BoundingBox, Feature, FeatureCollection, FeatureId};
use stratagis_core::{Algorithm, Error, Result};
use tracing::{debug, warn};

pub use burn::{burn, cell_polygon, is_polygonal, BurnMode};

use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::statistics::Aggregate;
use crate::vector::{check_operand, overlay_unchecked, ClipOp};

/// Number burned for a feature; `None` when it has no numeric value
pub type ValueFn = Arc<dyn Fn(&Feature) -> Option<f64> + Send + Sync>;
/// Rank of a feature; among competing features only the highest rank is kept
pub type PriorityFn = Arc<dyn Fn(&Feature) -> f64 + Send + Sync>;
/// Weight for a feature given the fraction of the cell it covers
pub type PartialFn = Arc<dyn Fn(&Feature, f64) -> f64 + Send + Sync>;

/// How features competing for one cell are narrowed before aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlapPolicy {
    /// All competing features feed the statistic
    #[default]
    Aggregate,
    /// Only features tied at the highest priority feed the statistic
    Priority,
}

/// How cells on polygon boundaries are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoverageMode {
    /// A polygon covers a cell when it covers the cell center
    #[default]
    Center,
    /// Boundary cells weight each value by the partial function
    Weighted,
}

/// Parameters for valued rasterization
#[derive(Clone, Default)]
pub struct RasterizeOptions {
    pub value: Option<ValueFn>,
    pub stat: Option<Aggregate>,
    pub overlap: OverlapPolicy,
    pub priority: Option<PriorityFn>,
    pub coverage: CoverageMode,
    pub partial: Option<PartialFn>,
}

impl fmt::Debug for RasterizeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterizeOptions")
            .field("value", &self.value.is_some())
            .field("stat", &self.stat)
            .field("overlap", &self.overlap)
            .field("priority", &self.priority.is_some())
            .field("coverage", &self.coverage)
            .field("partial", &self.partial.is_some())
            .finish()
    }
}

impl RasterizeOptions {
    /// Burn `value(feature)` and combine competing values with `stat`
    pub fn new(value: impl Fn(&Feature) -> Option<f64> + Send + Sync + 'static, stat: Aggregate) -> Self {
        Self {
            value: Some(Arc::new(value)),
            stat: Some(stat),
            ..Default::default()
        }
    }

    /// Keep only the highest-priority competitors
    pub fn with_priority(mut self, priority: impl Fn(&Feature) -> f64 + Send + Sync + 'static) -> Self {
        self.overlap = OverlapPolicy::Priority;
        self.priority = Some(Arc::new(priority));
        self
    }

    /// Weight boundary cells by `partial(feature, covered_fraction)`
    pub fn with_partial(mut self, partial: impl Fn(&Feature, f64) -> f64 + Send + Sync + 'static) -> Self {
        self.coverage = CoverageMode::Weighted;
        self.partial = Some(Arc::new(partial));
        self
    }

    /// Check that every function the chosen policies need is present
    pub fn validate(&self) -> Result<(&ValueFn, &Aggregate)> {
        let value = self.value.as_ref().ok_or_else(|| Error::MissingParameter {
            name: "value",
            reason: "valued rasterization needs a value function".into(),
        })?;
        let stat = self.stat.as_ref().ok_or_else(|| Error::MissingParameter {
            name: "stat",
            reason: "a value function needs an aggregation statistic".into(),
        })?;
        if !stat.is_numeric() {
            return Err(Error::InvalidParameter {
                name: "stat",
                value: stat.to_string(),
                reason: "raster cells need a numeric statistic".into(),
            });
        }
        if self.overlap == OverlapPolicy::Priority && self.priority.is_none() {
            return Err(Error::MissingParameter {
                name: "priority",
                reason: "priority overlap policy needs a priority function".into(),
            });
        }
        if self.coverage == CoverageMode::Weighted && self.partial.is_none() {
            return Err(Error::MissingParameter {
                name: "partial",
                reason: "weighted coverage needs a partial-coverage function".into(),
            });
        }
        Ok((value, stat))
    }
}

/// Value function reading a numeric field of `collection`
pub fn field_value(collection: &FeatureCollection, field: &str) -> Result<ValueFn> {
    let index = collection
        .field_index(field)
        .ok_or_else(|| Error::UnknownField(field.to_string()))?;
    Ok(Arc::new(move |feature: &Feature| feature.value_at(index).as_f64()))
}

/// North-up grid covering the collection's bbox with square cells
pub fn grid_for(collection: &FeatureCollection, cell_size: f64) -> Result<GridSpec> {
    GridParams::from_bbox_cell_size(collection.bbox()?, cell_size).resolve()
}

/// Result of valued rasterization
#[derive(Debug, Clone)]
pub struct Rasterized {
    /// Single `f64` band, NaN where nothing was burned
    pub raster: Raster<f64>,
    pub diagnostics: Vec<Diagnostic>,
    /// Cells covered by two or more intersecting features
    pub multi_cells: usize,
    /// Boundary cells recomputed with partial weights
    pub partial_cells: usize,
}

/// Burn every geometry with value 1 into an 8-bit band (nodata 0)
pub fn rasterize(collection: &FeatureCollection, grid: &GridSpec) -> Result<Raster<u8>> {
    let mut data = Array2::<u8>::zeros((grid.height, grid.width));
    let mut burned = 0usize;
    for (_, geom) in collection.with_geometry() {
        burn(geom, grid, BurnMode::Fill, |col, row| data[(row, col)] = 1);
        burned += 1;
    }
    debug!(features = burned, width = grid.width, height = grid.height, "rasterized");
    let band = Band::from_array(data).with_nodata(Some(0));
    Ok(Raster::single(band, grid.transform))
}

struct Source<'a> {
    feature: &'a Feature,
    geometry: &'a Geometry<f64>,
    value: f64,
}

const UNOWNED: usize = usize::MAX;

/// Burn `value(feature)` for every feature, resolving shared cells.
///
/// Fails before any work when `options` lack a function the chosen policies
/// need. Features whose value is not numeric are skipped with a diagnostic.
pub fn rasterize_values(
    collection: &FeatureCollection,
    grid: &GridSpec,
    options: &RasterizeOptions,
) -> Result<Rasterized> {
    let (value_fn, stat) = options.validate()?;

    let mut diagnostics = Vec::new();
    let mut sources: Vec<Source<'_>> = Vec::new();
    for (feature, geometry) in collection.with_geometry() {
        match value_fn(feature) {
            Some(value) if !value.is_nan() => sources.push(Source { feature, geometry, value }),
            _ => {
                warn!(feature = feature.id(), "value is not numeric, feature not burned");
                diagnostics.push(Diagnostic::feature(
                    feature.id(),
                    DiagnosticKind::NonNumericValue,
                    "value function returned no number",
                ));
            }
        }
    }
    let position: HashMap<FeatureId, usize> = sources
        .iter()
        .enumerate()
        .map(|(i, s)| (s.feature.id(), i))
        .collect();

    // Pass 1: burn, tracking who reached each cell.
    let shape = (grid.height, grid.width);
    let mut cells = Array2::from_elem(shape, f64::NAN);
    let mut stamp = Array2::from_elem(shape, UNOWNED);
    let mut owner = Array2::from_elem(shape, UNOWNED);
    let mut shared: HashMap<(usize, usize), Vec<usize>> = HashMap::new();
    for (i, source) in sources.iter().enumerate() {
        burn(source.geometry, grid, BurnMode::Fill, |col, row| {
            let idx = (row, col);
            if stamp[idx] == i {
                return;
            }
            stamp[idx] = i;
            // Later features overwrite; shared cells of non-intersecting
            // features keep the last value.
            cells[idx] = source.value;
            if owner[idx] == UNOWNED {
                owner[idx] = i;
            } else {
                shared.entry(idx).or_insert_with(|| vec![owner[idx]]).push(i);
            }
        });
    }

    // Pass 2: intersecting pairs via the spatial index.
    let index = collection.index_or_build();
    let mut pairs: HashSet<(usize, usize)> = HashSet::new();
    if !shared.is_empty() {
        for (i, source) in sources.iter().enumerate() {
            let Some(bbox) = source.feature.bbox() else {
                continue;
            };
            for id in index.intersects(bbox) {
                let Some(&j) = position.get(&id) else {
                    continue;
                };
                if j > i && source.geometry.intersects(sources[j].geometry) {
                    pairs.insert((i, j));
                }
            }
        }
    }

    let mut multi = Array2::from_elem(shape, false);
    let mut multi_cells = 0;
    for (&idx, contributors) in &shared {
        let conflict = contributors.iter().enumerate().any(|(n, &a)| {
            contributors[n + 1..]
                .iter()
                .any(|&b| pairs.contains(&(a.min(b), a.max(b))))
        });
        if conflict {
            multi[idx] = true;
            multi_cells += 1;
        }
    }

    // Pass 3: boundary cells.
    let mut partial = Array2::from_elem(shape, false);
    let mut invalid: HashSet<usize> = HashSet::new();
    if options.coverage == CoverageMode::Weighted {
        for (i, source) in sources.iter().enumerate().filter(|(_, s)| is_polygonal(s.geometry)) {
            if let Err(err) = check_operand(source.geometry) {
                warn!(feature = source.feature.id(), %err, "polygon left out of partial cells");
                diagnostics.push(Diagnostic::feature(source.feature.id(), err.kind(), err.to_string()));
                invalid.insert(i);
            }
            burn(source.geometry, grid, BurnMode::Outline, |col, row| {
                partial[(row, col)] = true;
            });
        }
    }
    let partial_cells = partial.iter().filter(|p| **p).count();

    debug!(
        features = sources.len(),
        intersecting_pairs = pairs.len(),
        multi_cells,
        partial_cells,
        "burned features"
    );

    // Pass 4: recompute flagged cells from their real candidates.
    let cell_area = grid.transform.cell_area();
    let mut candidates: Vec<(usize, f64)> = Vec::new();
    for row in 0..grid.height {
        for col in 0..grid.width {
            let idx = (row, col);
            let is_partial = partial[idx];
            if !multi[idx] && !is_partial {
                continue;
            }

            candidates.clear();
            if is_partial {
                let footprint = Geometry::Polygon(cell_polygon(grid, col, row));
                let Some(cell_box) = BoundingBox::from_geometry(&footprint) else {
                    continue;
                };
                for id in index.intersects(cell_box) {
                    let Some(&i) = position.get(&id) else {
                        continue;
                    };
                    let geom = sources[i].geometry;
                    if invalid.contains(&i) || !geom.intersects(&footprint) {
                        continue;
                    }
                    let coverage = if is_polygonal(geom) {
                        match overlay_unchecked(geom, &footprint, ClipOp::Intersection) {
                            Ok(Some(part)) => crate::vector::area(&part) / cell_area,
                            Ok(None) => 0.0,
                            Err(err) => {
                                warn!(feature = sources[i].feature.id(), %err, "coverage overlay failed");
                                diagnostics.push(Diagnostic::feature(
                                    sources[i].feature.id(),
                                    err.kind(),
                                    err.to_string(),
                                ));
                                continue;
                            }
                        }
                    } else {
                        1.0
                    };
                    if coverage > 0.0 {
                        candidates.push((i, coverage.min(1.0)));
                    }
                }
            } else {
                // Lines and points have no interior to hold the center; the
                // cells they were burned into stand for their footprint.
                let (x, y) = grid.transform.cell_to_geo(col, row);
                let center = Point::new(x, y);
                for &i in shared.get(&idx).into_iter().flatten() {
                    let geom = sources[i].geometry;
                    if !is_polygonal(geom) || geom.intersects(&center) {
                        candidates.push((i, 1.0));
                    }
                }
            }

            if let (OverlapPolicy::Priority, Some(priority)) = (options.overlap, &options.priority) {
                let ranks: Vec<f64> = candidates.iter().map(|&(i, _)| priority(sources[i].feature)).collect();
                if let Some(top) = ranks.iter().copied().max_by(f64::total_cmp) {
                    let mut rank = ranks.into_iter();
                    candidates.retain(|_| rank.next().is_some_and(|r| r.total_cmp(&top).is_eq()));
                }
            }

            let values: Vec<f64> = candidates
                .iter()
                .map(|&(i, coverage)| {
                    let weight = match (&options.partial, is_partial) {
                        (Some(partial_fn), true) => partial_fn(sources[i].feature, coverage),
                        _ => 1.0,
                    };
                    sources[i].value * weight
                })
                .collect();
            cells[idx] = stat.apply_f64(&values).unwrap_or(f64::NAN);
        }
    }

    let band = Band::from_array(cells).with_nodata(Some(f64::NAN));
    Ok(Rasterized {
        raster: Raster::single(band, grid.transform),
        diagnostics,
        multi_cells,
        partial_cells,
    })
}

/// Valued rasterization as an [`Algorithm`]
#[derive(Debug, Clone, Default)]
pub struct Rasterize;

impl Algorithm for Rasterize {
    type Input = (FeatureCollection, GridSpec);
    type Output = Rasterized;
    type Params = RasterizeOptions;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Rasterize"
    }

    fn description(&self) -> &'static str {
        "Burn per-feature values onto a grid, resolving overlaps with a statistic"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let (collection, grid) = input;
        rasterize_values(&collection, &grid, &params)
    }
}
