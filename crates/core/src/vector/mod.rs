//! Vector data structures
//!
//! Features carry an attribute row aligned with their collection's field
//! list and an optional `geo` geometry.

mod attribute;
mod bbox;
mod collection;
mod feature;
mod geometry;

pub use attribute::AttributeValue;
pub use bbox::BoundingBox;
pub use collection::{FeatureCollection, IndexRef};
pub use feature::{Feature, FeatureId};
pub use geometry::{is_empty_geometry, GeometryKind};
