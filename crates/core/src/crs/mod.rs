//! Coordinate reference system tag
//!
//! Rasters carry a CRS so that callers can tell whether two datasets are
//! comparable. No reprojection happens here.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinate reference system identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CRS {
    Epsg(u32),
    Wkt(String),
    Proj(String),
}

impl CRS {
    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::Epsg(4326)
    }

    pub fn epsg(&self) -> Option<u32> {
        match self {
            Self::Epsg(code) => Some(*code),
            _ => None,
        }
    }

    /// Two tags are equivalent when they are the same kind with the same payload.
    ///
    /// An EPSG code and a WKT string describing the same system compare unequal.
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        self == other
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Epsg(code) => write!(f, "EPSG:{code}"),
            Self::Proj(proj) => f.write_str(proj),
            Self::Wkt(wkt) => write!(f, "WKT:{}", wkt.chars().take(50).collect::<String>()),
        }
    }
}
