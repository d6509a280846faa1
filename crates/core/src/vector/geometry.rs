//! Geometry classification

use geo::Geometry;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Base geometry type shared by every non-null geometry in a collection.
///
/// Multi-part geometries share the base type of their parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryKind {
    Point,
    LineString,
    Polygon,
}

impl GeometryKind {
    /// Classify a geometry.
    ///
    /// `Line` counts as a line string, `Rect` and `Triangle` as polygons.
    /// Geometry collections have no single base type and are rejected.
    pub fn of(geom: &Geometry<f64>) -> Result<Self> {
        match geom {
            Geometry::Point(_) | Geometry::MultiPoint(_) => Ok(Self::Point),
            Geometry::Line(_) | Geometry::LineString(_) | Geometry::MultiLineString(_) => {
                Ok(Self::LineString)
            }
            Geometry::Polygon(_)
            | Geometry::MultiPolygon(_)
            | Geometry::Rect(_)
            | Geometry::Triangle(_) => Ok(Self::Polygon),
            Geometry::GeometryCollection(_) => Err(Error::UnsupportedGeometry(
                "geometry collections have no single base type".into(),
            )),
        }
    }
}

/// Whether a geometry has no coordinates to work with.
///
/// Polygons need a non-empty exterior ring; multi-geometries need at least
/// one non-empty part.
pub fn is_empty_geometry(geom: &Geometry<f64>) -> bool {
    match geom {
        Geometry::Point(_) | Geometry::Line(_) | Geometry::Rect(_) | Geometry::Triangle(_) => false,
        Geometry::LineString(ls) => ls.0.is_empty(),
        Geometry::Polygon(p) => p.exterior().0.is_empty(),
        Geometry::MultiPoint(mp) => mp.0.is_empty(),
        Geometry::MultiLineString(mls) => mls.0.iter().all(|ls| ls.0.is_empty()),
        Geometry::MultiPolygon(mp) => mp.0.iter().all(|p| p.exterior().0.is_empty()),
        Geometry::GeometryCollection(gc) => gc.0.iter().all(is_empty_geometry),
    }
}
