//! Geometric measurements: area, distance, centroid

use geo::{Area as GeoArea, Centroid as GeoCentroid, Distance, Euclidean, Geometry, Point};

/// Calculate the area of a geometry.
///
/// Returns unsigned area in CRS units squared; zero for points and lines.
pub fn area(geom: &Geometry<f64>) -> f64 {
    match geom {
        Geometry::Polygon(p) => p.unsigned_area(),
        Geometry::MultiPolygon(mp) => mp.unsigned_area(),
        Geometry::Rect(r) => r.unsigned_area(),
        Geometry::Triangle(t) => t.unsigned_area(),
        _ => 0.0,
    }
}

/// Minimum Euclidean distance between two geometries, 0 when they touch
pub fn distance(a: &Geometry<f64>, b: &Geometry<f64>) -> f64 {
    Euclidean::distance(a, b)
}

/// Compute the centroid of a geometry
pub fn centroid(geom: &Geometry<f64>) -> Option<Point<f64>> {
    geom.centroid()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{point, LineString, Polygon};

    fn square() -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![
                (0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0), (0.0, 0.0),
            ]),
            vec![],
        )
    }

    #[test]
    fn test_area_square() {
        let a = area(&Geometry::Polygon(square()));
        assert!((a - 100.0).abs() < 1e-10);
    }

    #[test]
    fn test_area_with_hole() {
        let poly = Polygon::new(
            square().exterior().clone(),
            vec![LineString::from(vec![
                (2.0, 2.0), (8.0, 2.0), (8.0, 8.0), (2.0, 8.0), (2.0, 2.0),
            ])],
        );
        assert!((area(&Geometry::Polygon(poly)) - 64.0).abs() < 1e-10);
    }

    #[test]
    fn test_area_non_polygon() {
        let line = Geometry::LineString(LineString::from(vec![(0.0, 0.0), (10.0, 10.0)]));
        assert_eq!(area(&line), 0.0);
    }

    #[test]
    fn test_distance() {
        let p = Geometry::Point(point!(x: 13.0, y: 14.0));
        let sq = Geometry::Polygon(square());
        assert!((distance(&p, &sq) - 5.0).abs() < 1e-10);
        let inside = Geometry::Point(point!(x: 5.0, y: 5.0));
        assert_eq!(distance(&inside, &sq), 0.0);
    }

    #[test]
    fn test_centroid() {
        let c = centroid(&Geometry::Polygon(square())).unwrap();
        assert!((c.x() - 5.0).abs() < 1e-10);
        assert!((c.y() - 5.0).abs() < 1e-10);
    }
}
