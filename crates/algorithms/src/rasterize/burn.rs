//! Burning geometries onto a cell grid
//!
//! Geometry is moved into fractional pixel space with the grid's inverse
//! transform before drawing, so rotated and skewed grids burn the same way
//! as north-up ones.
//!
//! - Polygons: a cell is inside when its center is inside (even-odd, so
//!   holes are subtracted). Shared edges go to exactly one side.
//! - Lines: every cell the segment passes through (grid traversal).
//! - Points: the cell containing the point.

use geo::{Coord, Geometry, LineString, Polygon};
use stratagis_core::raster::GridSpec;

/// What part of a polygon to burn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurnMode {
    /// Interior by cell center
    Fill,
    /// Rings only, as strokes
    Outline,
}

struct PixelSpace<'a> {
    grid: &'a GridSpec,
}

impl PixelSpace<'_> {
    fn to_pixel(&self, c: Coord<f64>) -> (f64, f64) {
        self.grid.transform.geo_to_cell_fraction(c.x, c.y)
    }

    fn emit(&self, col: i64, row: i64, visit: &mut impl FnMut(usize, usize)) {
        if col >= 0 && row >= 0 && (col as usize) < self.grid.width && (row as usize) < self.grid.height {
            visit(col as usize, row as usize);
        }
    }

    fn point(&self, c: Coord<f64>, visit: &mut impl FnMut(usize, usize)) {
        let (px, py) = self.to_pixel(c);
        if px.is_finite() && py.is_finite() {
            self.emit(px.floor() as i64, py.floor() as i64, visit);
        }
    }

    /// Amanatides-Woo traversal of the cells crossed by `p -> q`
    fn segment(&self, p: (f64, f64), q: (f64, f64), visit: &mut impl FnMut(usize, usize)) {
        if !(p.0.is_finite() && p.1.is_finite() && q.0.is_finite() && q.1.is_finite()) {
            return;
        }
        let (mut cx, mut cy) = (p.0.floor() as i64, p.1.floor() as i64);
        let (ex, ey) = (q.0.floor() as i64, q.1.floor() as i64);
        let (dx, dy) = (q.0 - p.0, q.1 - p.1);

        let axis = |d: f64, start: f64, cell: i64| -> (i64, f64, f64) {
            if d > 0.0 {
                (1, ((cell + 1) as f64 - start) / d, 1.0 / d)
            } else if d < 0.0 {
                (-1, (cell as f64 - start) / d, -1.0 / d)
            } else {
                (0, f64::INFINITY, f64::INFINITY)
            }
        };
        let (step_x, mut t_max_x, t_delta_x) = axis(dx, p.0, cx);
        let (step_y, mut t_max_y, t_delta_y) = axis(dy, p.1, cy);

        let steps = (ex - cx).abs() + (ey - cy).abs();
        self.emit(cx, cy, visit);
        for _ in 0..steps {
            if t_max_x < t_max_y {
                cx += step_x;
                t_max_x += t_delta_x;
            } else {
                cy += step_y;
                t_max_y += t_delta_y;
            }
            self.emit(cx, cy, visit);
        }
    }

    fn line_string(&self, ls: &LineString<f64>, visit: &mut impl FnMut(usize, usize)) {
        match ls.0.as_slice() {
            [] => {}
            [only] => self.point(*only, visit),
            coords => {
                for pair in coords.windows(2) {
                    self.segment(self.to_pixel(pair[0]), self.to_pixel(pair[1]), visit);
                }
            }
        }
    }

    /// Scanline fill testing each cell center against every ring
    fn polygon(&self, poly: &Polygon<f64>, visit: &mut impl FnMut(usize, usize)) {
        let rings: Vec<Vec<(f64, f64)>> = std::iter::once(poly.exterior())
            .chain(poly.interiors())
            .map(|ring| ring.0.iter().map(|c| self.to_pixel(*c)).collect())
            .collect();

        let (mut min_y, mut max_y) = (f64::INFINITY, f64::NEG_INFINITY);
        for &(_, y) in rings.iter().flatten() {
            min_y = min_y.min(y);
            max_y = max_y.max(y);
        }
        if !(min_y.is_finite() && max_y.is_finite()) {
            return;
        }

        let row_start = min_y.floor().max(0.0) as usize;
        let row_end = (max_y.ceil().max(0.0) as usize).min(self.grid.height);
        let mut crossings: Vec<f64> = Vec::new();

        for row in row_start..row_end {
            let yc = row as f64 + 0.5;
            crossings.clear();
            for ring in &rings {
                for edge in ring.windows(2) {
                    let ((x0, y0), (x1, y1)) = (edge[0], edge[1]);
                    if (y0 <= yc) != (y1 <= yc) {
                        crossings.push(x0 + (yc - y0) * (x1 - x0) / (y1 - y0));
                    }
                }
            }
            crossings.sort_by(f64::total_cmp);

            for span in crossings.chunks_exact(2) {
                // Centers in [x0, x1)
                let first = (span[0] - 0.5).ceil().max(0.0);
                let last = (span[1] - 0.5).ceil().min(self.grid.width as f64);
                let mut col = first;
                while col < last {
                    visit(col as usize, row);
                    col += 1.0;
                }
            }
        }
    }

    fn polygon_outline(&self, poly: &Polygon<f64>, visit: &mut impl FnMut(usize, usize)) {
        self.line_string(poly.exterior(), visit);
        for ring in poly.interiors() {
            self.line_string(ring, visit);
        }
    }

    fn polygonal(&self, poly: &Polygon<f64>, mode: BurnMode, visit: &mut impl FnMut(usize, usize)) {
        match mode {
            BurnMode::Fill => self.polygon(poly, visit),
            BurnMode::Outline => self.polygon_outline(poly, visit),
        }
    }

    fn geometry(&self, geom: &Geometry<f64>, mode: BurnMode, visit: &mut impl FnMut(usize, usize)) {
        match geom {
            Geometry::Point(p) => self.point(p.0, visit),
            Geometry::MultiPoint(mp) => mp.0.iter().for_each(|p| self.point(p.0, visit)),
            Geometry::Line(l) => self.segment(self.to_pixel(l.start), self.to_pixel(l.end), visit),
            Geometry::LineString(ls) => self.line_string(ls, visit),
            Geometry::MultiLineString(mls) => mls.0.iter().for_each(|ls| self.line_string(ls, visit)),
            Geometry::Polygon(p) => self.polygonal(p, mode, visit),
            Geometry::MultiPolygon(mp) => mp.0.iter().for_each(|p| self.polygonal(p, mode, visit)),
            Geometry::Rect(r) => self.polygonal(&r.to_polygon(), mode, visit),
            Geometry::Triangle(t) => self.polygonal(&t.to_polygon(), mode, visit),
            Geometry::GeometryCollection(gc) => gc.0.iter().for_each(|g| self.geometry(g, mode, visit)),
        }
    }
}

/// Call `visit(col, row)` for every grid cell `geom` burns.
///
/// A cell may be visited more than once (for example where two segments of
/// a line meet); callers that count need to deduplicate.
pub fn burn(geom: &Geometry<f64>, grid: &GridSpec, mode: BurnMode, mut visit: impl FnMut(usize, usize)) {
    PixelSpace { grid }.geometry(geom, mode, &mut visit);
}

/// True for the geometry variants that have an interior
pub fn is_polygonal(geom: &Geometry<f64>) -> bool {
    matches!(
        geom,
        Geometry::Polygon(_) | Geometry::MultiPolygon(_) | Geometry::Rect(_) | Geometry::Triangle(_)
    )
}

/// Footprint of cell `(col, row)` in geographic coordinates
pub fn cell_polygon(grid: &GridSpec, col: usize, row: usize) -> Polygon<f64> {
    let t = &grid.transform;
    let corners = [
        t.cell_to_geo_corner(col, row),
        t.cell_to_geo_corner(col + 1, row),
        t.cell_to_geo_corner(col + 1, row + 1),
        t.cell_to_geo_corner(col, row + 1),
        t.cell_to_geo_corner(col, row),
    ];
    Polygon::new(LineString::from(corners.to_vec()), vec![])
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{line_string, point, polygon};
    use stratagis_core::GeoTransform;

    fn grid(size: usize) -> GridSpec {
        // Origin at (0, size), 1-unit cells, north-up
        GridSpec::new(GeoTransform::new(0.0, size as f64, 1.0, -1.0).unwrap(), size, size).unwrap()
    }

    fn cells(geom: &Geometry<f64>, grid: &GridSpec, mode: BurnMode) -> Vec<(usize, usize)> {
        let mut out = Vec::new();
        burn(geom, grid, mode, |c, r| out.push((c, r)));
        out.sort_unstable();
        out.dedup();
        out
    }

    #[test]
    fn test_aligned_square_fill() {
        let g = grid(4);
        let sq = Geometry::Polygon(polygon![
            (x: 1.0, y: 1.0), (x: 3.0, y: 1.0), (x: 3.0, y: 3.0), (x: 1.0, y: 3.0)
        ]);
        // y in [1, 3) maps to rows 1 and 2
        assert_eq!(cells(&sq, &g, BurnMode::Fill), vec![(1, 1), (1, 2), (2, 1), (2, 2)]);
    }

    #[test]
    fn test_adjacent_polygons_share_no_cell() {
        let g = grid(4);
        let left = Geometry::Polygon(polygon![
            (x: 0.0, y: 0.0), (x: 2.0, y: 0.0), (x: 2.0, y: 4.0), (x: 0.0, y: 4.0)
        ]);
        let right = Geometry::Polygon(polygon![
            (x: 2.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 4.0), (x: 2.0, y: 4.0)
        ]);
        let a = cells(&left, &g, BurnMode::Fill);
        let b = cells(&right, &g, BurnMode::Fill);
        assert_eq!(a.len() + b.len(), 16);
        assert!(a.iter().all(|c| !b.contains(c)));
    }

    #[test]
    fn test_hole_is_subtracted() {
        let g = grid(5);
        let donut = Geometry::Polygon(Polygon::new(
            LineString::from(vec![(0.0, 0.0), (5.0, 0.0), (5.0, 5.0), (0.0, 5.0), (0.0, 0.0)]),
            vec![LineString::from(vec![(2.0, 2.0), (3.0, 2.0), (3.0, 3.0), (2.0, 3.0), (2.0, 2.0)])],
        ));
        let burned = cells(&donut, &g, BurnMode::Fill);
        assert_eq!(burned.len(), 24);
        assert!(!burned.contains(&(2, 2)));
    }

    #[test]
    fn test_line_traversal() {
        let g = grid(4);
        let diag = Geometry::LineString(line_string![(x: 0.5, y: 3.5), (x: 3.5, y: 3.5)]);
        assert_eq!(cells(&diag, &g, BurnMode::Fill), vec![(0, 0), (1, 0), (2, 0), (3, 0)]);

        let slant = Geometry::LineString(line_string![(x: 0.2, y: 3.9), (x: 1.8, y: 2.1)]);
        let burned = cells(&slant, &g, BurnMode::Fill);
        assert!(burned.contains(&(0, 0)));
        assert!(burned.contains(&(1, 1)));
    }

    #[test]
    fn test_point_and_outside() {
        let g = grid(4);
        let p = Geometry::Point(point!(x: 2.5, y: 0.5));
        assert_eq!(cells(&p, &g, BurnMode::Fill), vec![(2, 3)]);
        let outside = Geometry::Point(point!(x: 10.0, y: 10.0));
        assert!(cells(&outside, &g, BurnMode::Fill).is_empty());
    }

    #[test]
    fn test_outline_marks_ring_cells() {
        let g = grid(5);
        let sq = Geometry::Polygon(polygon![
            (x: 0.5, y: 0.5), (x: 4.5, y: 0.5), (x: 4.5, y: 4.5), (x: 0.5, y: 4.5)
        ]);
        let outline = cells(&sq, &g, BurnMode::Outline);
        assert_eq!(outline.len(), 16);
        assert!(!outline.contains(&(2, 2)));
    }

    #[test]
    fn test_cell_polygon() {
        let g = grid(4);
        let poly = cell_polygon(&g, 1, 0);
        let xs: Vec<f64> = poly.exterior().0.iter().map(|c| c.x).collect();
        let ys: Vec<f64> = poly.exterior().0.iter().map(|c| c.y).collect();
        assert_eq!(xs.iter().cloned().fold(f64::INFINITY, f64::min), 1.0);
        assert_eq!(ys.iter().cloned().fold(f64::NEG_INFINITY, f64::max), 4.0);
    }
}
