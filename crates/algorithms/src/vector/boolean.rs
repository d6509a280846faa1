//! Boolean overlay of geometry pairs
//!
//! Polygonal operands are checked before the overlay runs: a zero-area or
//! self-intersecting ring is rejected with [`OverlayError::InvalidTarget`].
//! A failure inside the overlay itself is reported the same way, so callers
//! can record it per pair and continue.
//!
//! The ring check is quadratic in the vertex count. Bulk callers check each
//! operand once with [`check_operand`] and then use [`overlay_unchecked`].

use std::panic::{catch_unwind, AssertUnwindSafe};

use geo::{
    Area, BooleanOps, Geometry, Intersects, Line, LineString, MultiLineString, MultiPoint,
    MultiPolygon, Polygon,
};
use thiserror::Error;

use crate::diagnostics::DiagnosticKind;

/// Geometry derived from a matched pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipOp {
    Intersection,
    Union,
    /// Left minus right
    Difference,
}

/// Why an overlay produced no geometry
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OverlayError {
    #[error("invalid clip target: {0}")]
    InvalidTarget(String),

    #[error("unsupported overlay: {0}")]
    Unsupported(String),
}

impl OverlayError {
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            OverlayError::InvalidTarget(_) => DiagnosticKind::InvalidClipTarget,
            OverlayError::Unsupported(_) => DiagnosticKind::UnsupportedOperation,
        }
    }
}

fn as_polygons(geom: &Geometry<f64>) -> Option<MultiPolygon<f64>> {
    match geom {
        Geometry::Polygon(p) => Some(MultiPolygon::new(vec![p.clone()])),
        Geometry::MultiPolygon(mp) => Some(mp.clone()),
        Geometry::Rect(r) => Some(MultiPolygon::new(vec![r.to_polygon()])),
        Geometry::Triangle(t) => Some(MultiPolygon::new(vec![t.to_polygon()])),
        _ => None,
    }
}

fn as_lines(geom: &Geometry<f64>) -> Option<MultiLineString<f64>> {
    match geom {
        Geometry::LineString(ls) => Some(MultiLineString::new(vec![ls.clone()])),
        Geometry::MultiLineString(mls) => Some(mls.clone()),
        Geometry::Line(l) => Some(MultiLineString::new(vec![LineString::from(vec![l.start, l.end])])),
        _ => None,
    }
}

fn as_points(geom: &Geometry<f64>) -> Option<MultiPoint<f64>> {
    match geom {
        Geometry::Point(p) => Some(MultiPoint::new(vec![*p])),
        Geometry::MultiPoint(mp) => Some(mp.clone()),
        _ => None,
    }
}

/// True if two non-adjacent edges of the ring meet
fn ring_self_intersects(ring: &LineString<f64>) -> bool {
    let edges: Vec<Line<f64>> = ring.lines().filter(|l| l.start != l.end).collect();
    let n = edges.len();
    for i in 0..n {
        for j in (i + 2)..n {
            // First and last edges share the closing vertex.
            if i == 0 && j == n - 1 {
                continue;
            }
            if edges[i].intersects(&edges[j]) {
                return true;
            }
        }
    }
    false
}

fn polygon_problem(poly: &Polygon<f64>) -> Option<&'static str> {
    if poly.unsigned_area() == 0.0 {
        return Some("zero-area polygon");
    }
    let rings = std::iter::once(poly.exterior()).chain(poly.interiors());
    for ring in rings {
        if ring_self_intersects(ring) {
            return Some("self-intersecting ring");
        }
    }
    None
}

/// Check every polygon of an overlay operand
pub fn validate_polygons(polys: &MultiPolygon<f64>) -> Result<(), OverlayError> {
    if polys.0.is_empty() {
        return Err(OverlayError::InvalidTarget("empty polygon".into()));
    }
    for poly in &polys.0 {
        if let Some(problem) = polygon_problem(poly) {
            return Err(OverlayError::InvalidTarget(problem.into()));
        }
    }
    Ok(())
}

fn guarded<T>(op: impl FnOnce() -> T) -> Result<T, OverlayError> {
    catch_unwind(AssertUnwindSafe(op))
        .map_err(|_| OverlayError::InvalidTarget("boolean operation failed".into()))
}

fn non_empty_polygons(mp: MultiPolygon<f64>) -> Option<Geometry<f64>> {
    let kept: Vec<Polygon<f64>> = mp.0.into_iter().filter(|p| p.unsigned_area() > 0.0).collect();
    (!kept.is_empty()).then(|| Geometry::MultiPolygon(MultiPolygon::new(kept)))
}

/// Union of the polygonal geometries in `geoms`.
///
/// Non-polygonal inputs are ignored. Returns `None` when nothing polygonal
/// remains.
pub fn union_all<'a>(geoms: impl IntoIterator<Item = &'a Geometry<f64>>) -> Result<Option<Geometry<f64>>, OverlayError> {
    let parts: Vec<MultiPolygon<f64>> = geoms.into_iter().filter_map(as_polygons).collect();
    for part in &parts {
        validate_polygons(part)?;
    }
    Ok(union_tree(parts)?.and_then(non_empty_polygons))
}

/// [`union_all`] for geometries already passed through [`check_operand`]
pub(crate) fn union_unchecked<'a>(
    geoms: impl IntoIterator<Item = &'a Geometry<f64>>,
) -> Result<Option<Geometry<f64>>, OverlayError> {
    let parts: Vec<MultiPolygon<f64>> = geoms.into_iter().filter_map(as_polygons).collect();
    Ok(union_tree(parts)?.and_then(non_empty_polygons))
}

/// Pairwise tree reduction keeps operands of similar size
pub(crate) fn union_tree(mut parts: Vec<MultiPolygon<f64>>) -> Result<Option<MultiPolygon<f64>>, OverlayError> {
    while parts.len() > 1 {
        let mut next = Vec::with_capacity(parts.len().div_ceil(2));
        let mut iter = parts.into_iter();
        while let Some(a) = iter.next() {
            match iter.next() {
                Some(b) => next.push(guarded(|| a.union(&b))?),
                None => next.push(a),
            }
        }
        parts = next;
    }
    Ok(parts.pop())
}

/// Validate one overlay operand; non-polygonal geometries always pass
pub(crate) fn check_operand(geom: &Geometry<f64>) -> Result<(), OverlayError> {
    match as_polygons(geom) {
        Some(polys) => validate_polygons(&polys),
        None => Ok(()),
    }
}

/// Whether [`overlay`] checks its operands when `left` is the left one.
/// Points are filtered by a plain intersects test and need no check.
pub(crate) fn checks_operands(left: &Geometry<f64>) -> bool {
    !matches!(left, Geometry::Point(_) | Geometry::MultiPoint(_))
}

/// Apply `op` to `left` and `right`.
///
/// Polygons combine with polygons under all three operations. Lines and
/// points support `Intersection` and `Difference` against polygons (points
/// against any geometry). `Ok(None)` means the result is empty.
pub fn overlay(left: &Geometry<f64>, right: &Geometry<f64>, op: ClipOp) -> Result<Option<Geometry<f64>>, OverlayError> {
    if checks_operands(left) {
        check_operand(left)?;
        check_operand(right)?;
    }
    overlay_unchecked(left, right, op)
}

/// [`overlay`] for operands already passed through [`check_operand`]
pub(crate) fn overlay_unchecked(
    left: &Geometry<f64>,
    right: &Geometry<f64>,
    op: ClipOp,
) -> Result<Option<Geometry<f64>>, OverlayError> {
    if let Some(lp) = as_polygons(left) {
        let rp = as_polygons(right).ok_or_else(|| {
            OverlayError::Unsupported("polygon overlay needs a polygonal right geometry".into())
        })?;
        let result = guarded(|| match op {
            ClipOp::Intersection => lp.intersection(&rp),
            ClipOp::Union => lp.union(&rp),
            ClipOp::Difference => lp.difference(&rp),
        })?;
        return Ok(non_empty_polygons(result));
    }

    if let Some(lines) = as_lines(left) {
        let rp = as_polygons(right).ok_or_else(|| {
            OverlayError::Unsupported("lines can only be clipped by polygons".into())
        })?;
        let invert = match op {
            ClipOp::Intersection => false,
            ClipOp::Difference => true,
            ClipOp::Union => return Err(OverlayError::Unsupported("union of lines".into())),
        };
        let clipped = guarded(|| rp.clip(&lines, invert))?;
        let kept: Vec<LineString<f64>> = clipped.0.into_iter().filter(|ls| ls.0.len() > 1).collect();
        return Ok((!kept.is_empty()).then(|| Geometry::MultiLineString(MultiLineString::new(kept))));
    }

    if let Some(points) = as_points(left) {
        let keep_inside = match op {
            ClipOp::Intersection => true,
            ClipOp::Difference => false,
            ClipOp::Union => return Err(OverlayError::Unsupported("union of points".into())),
        };
        let kept: Vec<_> = points
            .0
            .into_iter()
            .filter(|p| p.intersects(right) == keep_inside)
            .collect();
        return Ok((!kept.is_empty()).then(|| Geometry::MultiPoint(MultiPoint::new(kept))));
    }

    Err(OverlayError::Unsupported("geometry collections cannot be overlaid".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::measurements::area;
    use approx::assert_relative_eq;
    use geo::{line_string, point, polygon};

    fn square(x: f64, y: f64, size: f64) -> Geometry<f64> {
        Geometry::Polygon(polygon![
            (x: x, y: y),
            (x: x + size, y: y),
            (x: x + size, y: y + size),
            (x: x, y: y + size),
        ])
    }

    #[test]
    fn test_polygon_operations() {
        let a = square(0.0, 0.0, 2.0);
        let b = square(1.0, 1.0, 2.0);
        let inter = overlay(&a, &b, ClipOp::Intersection).unwrap().unwrap();
        assert_relative_eq!(area(&inter), 1.0, epsilon = 1e-9);
        let union = overlay(&a, &b, ClipOp::Union).unwrap().unwrap();
        assert_relative_eq!(area(&union), 7.0, epsilon = 1e-9);
        let diff = overlay(&a, &b, ClipOp::Difference).unwrap().unwrap();
        assert_relative_eq!(area(&diff), 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_disjoint_intersection_is_empty() {
        let a = square(0.0, 0.0, 1.0);
        let b = square(5.0, 5.0, 1.0);
        assert_eq!(overlay(&a, &b, ClipOp::Intersection).unwrap(), None);
    }

    #[test]
    fn test_invalid_targets() {
        let a = square(0.0, 0.0, 2.0);
        let flat = Geometry::Polygon(polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 2.0, y: 0.0)]);
        let bowtie = Geometry::Polygon(polygon![
            (x: 0.0, y: 0.0),
            (x: 3.0, y: 3.0),
            (x: 3.0, y: 0.0),
            (x: 0.0, y: 1.0),
        ]);
        let err = overlay(&a, &flat, ClipOp::Intersection).unwrap_err();
        assert_eq!(err.kind(), DiagnosticKind::InvalidClipTarget);
        let err = overlay(&a, &bowtie, ClipOp::Intersection).unwrap_err();
        assert_eq!(err, OverlayError::InvalidTarget("self-intersecting ring".into()));
    }

    #[test]
    fn test_line_clip() {
        let line = Geometry::LineString(line_string![(x: -1.0, y: 1.0), (x: 3.0, y: 1.0)]);
        let sq = square(0.0, 0.0, 2.0);
        let inside = overlay(&line, &sq, ClipOp::Intersection).unwrap().unwrap();
        let Geometry::MultiLineString(mls) = inside else {
            panic!("expected lines");
        };
        assert_eq!(mls.0.len(), 1);
        let outside = overlay(&line, &sq, ClipOp::Difference).unwrap().unwrap();
        let Geometry::MultiLineString(mls) = outside else {
            panic!("expected lines");
        };
        assert_eq!(mls.0.len(), 2);
        assert_eq!(
            overlay(&line, &sq, ClipOp::Union).unwrap_err().kind(),
            DiagnosticKind::UnsupportedOperation
        );
    }

    #[test]
    fn test_point_filter() {
        let pts = Geometry::Point(point!(x: 1.0, y: 1.0));
        let sq = square(0.0, 0.0, 2.0);
        assert!(overlay(&pts, &sq, ClipOp::Intersection).unwrap().is_some());
        assert!(overlay(&pts, &sq, ClipOp::Difference).unwrap().is_none());
    }

    #[test]
    fn test_union_all() {
        let squares = [square(0.0, 0.0, 1.0), square(1.0, 0.0, 1.0), square(2.0, 0.0, 1.0)];
        let merged = union_all(squares.iter()).unwrap().unwrap();
        assert_relative_eq!(area(&merged), 3.0, epsilon = 1e-9);
        let Geometry::MultiPolygon(mp) = merged else {
            panic!("expected polygons");
        };
        assert_eq!(mp.0.len(), 1);
    }

    #[test]
    fn test_checked_operands_skip_revalidation() {
        let bowtie = Geometry::Polygon(polygon![
            (x: 0.0, y: 0.0),
            (x: 3.0, y: 3.0),
            (x: 3.0, y: 0.0),
            (x: 0.0, y: 1.0),
        ]);
        let line = Geometry::LineString(line_string![(x: -1.0, y: 1.0), (x: 3.0, y: 1.0)]);
        let pt = Geometry::Point(point!(x: 1.0, y: 1.0));
        assert!(check_operand(&bowtie).is_err());
        assert!(check_operand(&line).is_ok());
        assert!(checks_operands(&line));
        assert!(!checks_operands(&pt));
        // Points are never validated, not even against a bad polygon.
        assert!(overlay(&pt, &bowtie, ClipOp::Intersection).is_ok());

        let a = square(0.0, 0.0, 2.0);
        let b = square(1.0, 1.0, 2.0);
        check_operand(&a).unwrap();
        check_operand(&b).unwrap();
        let checked = overlay(&a, &b, ClipOp::Intersection).unwrap().unwrap();
        let unchecked = overlay_unchecked(&a, &b, ClipOp::Intersection).unwrap().unwrap();
        assert_relative_eq!(area(&checked), area(&unchecked), epsilon = 1e-12);

        let parts = [square(0.0, 0.0, 1.0), square(1.0, 0.0, 1.0)];
        let merged = union_unchecked(parts.iter()).unwrap().unwrap();
        assert_relative_eq!(area(&merged), 2.0, epsilon = 1e-9);
    }
}
