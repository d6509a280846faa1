//! Spatial predicates used to match feature pairs

use std::str::FromStr;

use geo::{Geometry, Intersects, Relate};
use stratagis_core::{Error, Result};

use super::measurements::distance;

/// Exact relation a pair of geometries must satisfy
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum SpatialPredicate {
    #[default]
    Intersects,
    /// Left lies within right
    Within,
    /// Left contains right
    Contains,
    Touches,
    Crosses,
    /// Topological equality
    Equals,
    /// Left covers right
    Covers,
    Disjoint,
    /// Within `radius` of the left geometry and/or among its `k` nearest.
    ///
    /// With neither set every geometry matches.
    Distance {
        radius: Option<f64>,
        k: Option<usize>,
    },
}

impl SpatialPredicate {
    pub fn within_distance(radius: f64) -> Self {
        SpatialPredicate::Distance {
            radius: Some(radius),
            k: None,
        }
    }

    pub fn nearest(k: usize) -> Self {
        SpatialPredicate::Distance {
            radius: None,
            k: Some(k),
        }
    }

    /// Whether a bbox-overlap query can produce every match
    pub fn needs_overlap(&self) -> bool {
        !matches!(
            self,
            SpatialPredicate::Disjoint | SpatialPredicate::Distance { .. }
        )
    }

    /// Test the predicate on one pair.
    ///
    /// For `Distance` only the radius is checked; the `k` limit needs the
    /// whole candidate set and is applied by the caller.
    pub fn evaluate(&self, left: &Geometry<f64>, right: &Geometry<f64>) -> bool {
        match self {
            SpatialPredicate::Intersects => left.intersects(right),
            SpatialPredicate::Disjoint => !left.intersects(right),
            SpatialPredicate::Distance { radius, .. } => {
                radius.map_or(true, |r| distance(left, right) <= r)
            }
            SpatialPredicate::Within => left.relate(right).is_within(),
            SpatialPredicate::Contains => left.relate(right).is_contains(),
            SpatialPredicate::Touches => left.relate(right).is_touches(),
            SpatialPredicate::Crosses => left.relate(right).is_crosses(),
            SpatialPredicate::Equals => left.relate(right).is_equal_topo(),
            SpatialPredicate::Covers => left.relate(right).is_covers(),
        }
    }
}

impl FromStr for SpatialPredicate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let predicate = match s.trim().to_ascii_lowercase().as_str() {
            "intersects" => SpatialPredicate::Intersects,
            "within" => SpatialPredicate::Within,
            "contains" => SpatialPredicate::Contains,
            "touches" => SpatialPredicate::Touches,
            "crosses" => SpatialPredicate::Crosses,
            "equals" => SpatialPredicate::Equals,
            "covers" => SpatialPredicate::Covers,
            "disjoint" => SpatialPredicate::Disjoint,
            "distance" => SpatialPredicate::Distance { radius: None, k: None },
            _ => {
                return Err(Error::InvalidParameter {
                    name: "predicate",
                    value: s.to_string(),
                    reason: "unknown spatial predicate".into(),
                })
            }
        };
        Ok(predicate)
    }
}
