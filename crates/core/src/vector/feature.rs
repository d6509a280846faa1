//! A single feature: attribute row plus optional geometry

use std::sync::OnceLock;

use geo::Geometry;

use crate::vector::{AttributeValue, BoundingBox};

/// Identifier of a feature, unique within its owning collection
pub type FeatureId = u64;

/// A geographic feature with geometry and attributes.
///
/// Features are created through [`FeatureCollection::add_feature`]; the row
/// is positional and matches the collection's field list. The bounding box
/// is derived from the geometry on first use and cached until the geometry
/// changes.
///
/// [`FeatureCollection::add_feature`]: crate::vector::FeatureCollection::add_feature
#[derive(Debug, Clone)]
pub struct Feature {
    id: FeatureId,
    row: Vec<AttributeValue>,
    geometry: Option<Geometry<f64>>,
    bbox: OnceLock<Option<BoundingBox>>,
}

impl Feature {
    pub(crate) fn new(id: FeatureId, row: Vec<AttributeValue>, geometry: Option<Geometry<f64>>) -> Self {
        Self {
            id,
            row,
            geometry,
            bbox: OnceLock::new(),
        }
    }

    pub fn id(&self) -> FeatureId {
        self.id
    }

    /// Attribute values in field order
    pub fn row(&self) -> &[AttributeValue] {
        &self.row
    }

    /// Attribute values for in-place edits; the row length is fixed
    pub fn row_mut(&mut self) -> &mut [AttributeValue] {
        &mut self.row
    }

    /// Extend the row when the owning collection gains a field
    pub(crate) fn push_value(&mut self, value: AttributeValue) {
        self.row.push(value);
    }

    /// Attribute at a field position, `Null` when the row is shorter
    pub fn value_at(&self, index: usize) -> &AttributeValue {
        static NULL: AttributeValue = AttributeValue::Null;
        self.row.get(index).unwrap_or(&NULL)
    }

    pub fn geometry(&self) -> Option<&Geometry<f64>> {
        self.geometry.as_ref()
    }

    pub fn has_geometry(&self) -> bool {
        self.geometry.is_some()
    }

    /// Cached bounding box, `None` without geometry
    pub fn bbox(&self) -> Option<BoundingBox> {
        *self
            .bbox
            .get_or_init(|| self.geometry.as_ref().and_then(BoundingBox::from_geometry))
    }

    /// Replace the geometry and drop the cached bounding box.
    ///
    /// Type consistency is checked by the owning collection.
    pub(crate) fn replace_geometry(&mut self, geometry: Option<Geometry<f64>>) {
        self.geometry = geometry;
        self.bbox.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{point, polygon};

    #[test]
    fn test_bbox_cached_and_invalidated() {
        let mut feature = Feature::new(
            1,
            vec![AttributeValue::Int(1)],
            Some(Geometry::Point(point!(x: 1.0, y: 1.0))),
        );
        assert_eq!(feature.bbox(), Some(BoundingBox::from_point(1.0, 1.0)));

        feature.replace_geometry(Some(Geometry::Polygon(
            polygon![(x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 2.0)],
        )));
        assert_eq!(feature.bbox(), Some(BoundingBox::new(0.0, 0.0, 4.0, 2.0)));

        feature.replace_geometry(None);
        assert_eq!(feature.bbox(), None);
    }

    #[test]
    fn test_value_at_past_end_is_null() {
        let feature = Feature::new(3, vec![AttributeValue::from("x")], None);
        assert_eq!(feature.value_at(0), &AttributeValue::from("x"));
        assert!(feature.value_at(5).is_null());
    }
}
