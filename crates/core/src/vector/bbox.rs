//! Axis-aligned bounding boxes

use geo::{BoundingRect, Geometry, LineString, Polygon, Rect};
use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box `[xmin, ymin, xmax, ymax]`.
///
/// Always normalized: `min_* <= max_*` regardless of the order corners were given in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            min_x: x1.min(x2),
            min_y: y1.min(y2),
            max_x: x1.max(x2),
            max_y: y1.max(y2),
        }
    }

    /// Degenerate box around a single coordinate
    pub fn from_point(x: f64, y: f64) -> Self {
        Self::new(x, y, x, y)
    }

    /// Bounding box of a geometry, `None` for empty geometries
    pub fn from_geometry(geom: &Geometry<f64>) -> Option<Self> {
        geom.bounding_rect().map(Self::from)
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.min_x + self.max_x) / 2.0, (self.min_y + self.max_y) / 2.0)
    }

    pub fn is_finite(&self) -> bool {
        self.min_x.is_finite() && self.min_y.is_finite() && self.max_x.is_finite() && self.max_y.is_finite()
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }

    /// Whether `other` lies entirely inside this box (boundaries included)
    pub fn contains(&self, other: &BoundingBox) -> bool {
        other.min_x >= self.min_x
            && other.max_x <= self.max_x
            && other.min_y >= self.min_y
            && other.max_y <= self.max_y
    }

    /// Overlap test; boxes sharing only an edge or corner intersect
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min_x <= other.max_x
            && self.max_x >= other.min_x
            && self.min_y <= other.max_y
            && self.max_y >= other.min_y
    }

    /// Smallest box covering both
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    /// Grow by `d` on every side
    pub fn expand(&self, d: f64) -> BoundingBox {
        BoundingBox::new(self.min_x - d, self.min_y - d, self.max_x + d, self.max_y + d)
    }

    /// Euclidean gap between two boxes, 0 when they intersect
    pub fn distance(&self, other: &BoundingBox) -> f64 {
        let dx = (other.min_x - self.max_x).max(self.min_x - other.max_x).max(0.0);
        let dy = (other.min_y - self.max_y).max(self.min_y - other.max_y).max(0.0);
        dx.hypot(dy)
    }

    pub fn to_array(&self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }

    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new((self.min_x, self.min_y), (self.max_x, self.max_y))
    }

    pub fn to_polygon(&self) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![
                (self.min_x, self.min_y),
                (self.max_x, self.min_y),
                (self.max_x, self.max_y),
                (self.min_x, self.max_y),
                (self.min_x, self.min_y),
            ]),
            vec![],
        )
    }
}

impl From<[f64; 4]> for BoundingBox {
    fn from(b: [f64; 4]) -> Self {
        Self::new(b[0], b[1], b[2], b[3])
    }
}

impl From<BoundingBox> for [f64; 4] {
    fn from(b: BoundingBox) -> Self {
        b.to_array()
    }
}

impl From<Rect<f64>> for BoundingBox {
    fn from(rect: Rect<f64>) -> Self {
        Self::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::point;

    #[test]
    fn test_normalized() {
        let bb = BoundingBox::new(10.0, 8.0, 1.0, 2.0);
        assert_eq!(bb.to_array(), [1.0, 2.0, 10.0, 8.0]);
        let json: BoundingBox = serde_json::from_str("[5, 5, 0, 0]").unwrap();
        assert_eq!(json.to_array(), [0.0, 0.0, 5.0, 5.0]);
    }

    #[test]
    fn test_bounding_box_contains() {
        let bb = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        assert!(bb.contains_point(5.0, 5.0));
        assert!(!bb.contains_point(15.0, 5.0));
        assert!(bb.contains(&BoundingBox::new(1.0, 1.0, 10.0, 2.0)));
        assert!(!bb.contains(&BoundingBox::new(1.0, 1.0, 11.0, 2.0)));
    }

    #[test]
    fn test_bounding_box_intersects() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, 5.0, 15.0, 15.0);
        let c = BoundingBox::new(20.0, 20.0, 30.0, 30.0);
        let edge = BoundingBox::new(10.0, 0.0, 12.0, 1.0);

        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
        assert!(a.intersects(&edge));
    }

    #[test]
    fn test_distance() {
        let a = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        assert_eq!(a.distance(&BoundingBox::new(0.5, 0.5, 2.0, 2.0)), 0.0);
        assert_eq!(a.distance(&BoundingBox::new(4.0, 0.0, 5.0, 1.0)), 3.0);
        assert_eq!(a.distance(&BoundingBox::new(4.0, 5.0, 6.0, 6.0)), 5.0);
    }

    #[test]
    fn test_from_geometry() {
        let geom = Geometry::Point(point!(x: 3.0, y: -2.0));
        let bb = BoundingBox::from_geometry(&geom).unwrap();
        assert_eq!(bb, BoundingBox::from_point(3.0, -2.0));
        assert_eq!(bb.area(), 0.0);
    }

    #[test]
    fn test_bounding_box_to_polygon() {
        let bb = BoundingBox::new(1.0, 2.0, 5.0, 8.0);
        let poly = bb.to_polygon();
        let coords = &poly.exterior().0;
        assert_eq!(coords.len(), 5);
        assert_eq!(coords[0], geo::Coord { x: 1.0, y: 2.0 });
    }
}
