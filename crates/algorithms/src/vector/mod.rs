//! Vector overlay and spatial join
//!
//! - Predicates: exact spatial relations between two geometries
//! - Boolean: intersection, union and difference of matched pairs
//! - Join: index-driven matching of two collections with aggregation
//! - Measurements: area, distance and centroid

mod boolean;
mod join;
mod measurements;
mod predicates;

pub use boolean::{overlay, union_all, validate_polygons, ClipOp, OverlayError};
pub(crate) use boolean::{check_operand, checks_operands, overlay_unchecked, union_tree, union_unchecked};
pub use join::{spatial_join, ConditionFn, FieldAggregation, JoinMode, JoinOptions, JoinOutput, SpatialJoin};
pub use measurements::{area, centroid, distance};
pub use predicates::SpatialPredicate;
