//! Feature collection with an optional spatial index

use std::collections::BTreeMap;
use std::ops::Deref;

use geo::{Geometry, Intersects};
use tracing::{debug, warn};

use crate::config::IndexConfig;
use crate::error::{Error, Result};
use crate::index::SpatialIndex;
use crate::vector::{AttributeValue, BoundingBox, Feature, FeatureId, GeometryKind};

/// Ordered mapping of feature id to feature.
///
/// Ids come from a per-collection counter and only grow, so id order is
/// insertion order. All non-null geometries share one [`GeometryKind`].
///
/// The spatial index is a secondary structure: it is built on request by
/// [`create_spatial_index`](Self::create_spatial_index) and is not updated
/// when features are added, removed or reshaped. Queries against an index
/// built before such changes return stale results.
#[derive(Debug)]
pub struct FeatureCollection {
    fields: Vec<String>,
    features: BTreeMap<FeatureId, Feature>,
    next_id: FeatureId,
    kind: Option<GeometryKind>,
    index_config: IndexConfig,
    index: Option<SpatialIndex>,
}

impl Default for FeatureCollection {
    fn default() -> Self {
        Self::new(Vec::<String>::new())
    }
}

impl Clone for FeatureCollection {
    /// Clones features and schema; the spatial index is not carried over.
    fn clone(&self) -> Self {
        Self {
            fields: self.fields.clone(),
            features: self.features.clone(),
            next_id: self.next_id,
            kind: self.kind,
            index_config: self.index_config,
            index: None,
        }
    }
}

impl FeatureCollection {
    /// Empty collection with the given field names and the default index config
    pub fn new<S: Into<String>>(fields: impl IntoIterator<Item = S>) -> Self {
        Self::with_config(fields, IndexConfig::default())
    }

    /// Empty collection using `index_config` for its spatial index
    pub fn with_config<S: Into<String>>(
        fields: impl IntoIterator<Item = S>,
        index_config: IndexConfig,
    ) -> Self {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            features: BTreeMap::new(),
            next_id: 1,
            kind: None,
            index_config,
            index: None,
        }
    }

    /// Empty collection with the same schema and index config
    pub fn empty_like(&self) -> Self {
        Self::with_config(self.fields.clone(), self.index_config)
    }

    // Schema

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == name)
    }

    /// Append a field, filling existing rows with `default`
    pub fn add_field(&mut self, name: impl Into<String>, default: AttributeValue) {
        self.fields.push(name.into());
        for feature in self.features.values_mut() {
            feature.push_value(default.clone());
        }
    }

    /// Attribute of `feature` under field `name`
    pub fn value<'a>(&self, feature: &'a Feature, name: &str) -> Result<&'a AttributeValue> {
        let index = self
            .field_index(name)
            .ok_or_else(|| Error::UnknownField(name.to_string()))?;
        Ok(feature.value_at(index))
    }

    /// Base geometry type, set by the first feature with a geometry
    pub fn kind(&self) -> Option<GeometryKind> {
        self.kind
    }

    pub fn index_config(&self) -> &IndexConfig {
        &self.index_config
    }

    fn check_kind(&self, geometry: Option<&Geometry<f64>>) -> Result<Option<GeometryKind>> {
        let Some(geometry) = geometry else {
            return Ok(None);
        };
        let found = GeometryKind::of(geometry)?;
        match self.kind {
            Some(expected) if expected != found => Err(Error::GeometryTypeMismatch { expected, found }),
            _ => Ok(Some(found)),
        }
    }

    // Features

    /// Add a feature and assign it the next id.
    ///
    /// Fails if the row length differs from the field count or the geometry
    /// type differs from the collection's.
    pub fn add_feature(
        &mut self,
        row: Vec<AttributeValue>,
        geometry: Option<Geometry<f64>>,
    ) -> Result<&Feature> {
        if row.len() != self.fields.len() {
            return Err(Error::RowLength {
                expected: self.fields.len(),
                found: row.len(),
            });
        }
        let kind = self.check_kind(geometry.as_ref())?;
        if self.kind.is_none() {
            self.kind = kind;
        }
        let id = self.next_id;
        self.next_id += 1;
        Ok(self
            .features
            .entry(id)
            .or_insert(Feature::new(id, row, geometry)))
    }

    pub fn get(&self, id: FeatureId) -> Option<&Feature> {
        self.features.get(&id)
    }

    /// Mutable access to a feature's attribute row
    pub fn row_mut(&mut self, id: FeatureId) -> Result<&mut [AttributeValue]> {
        self.features
            .get_mut(&id)
            .map(Feature::row_mut)
            .ok_or(Error::FeatureNotFound(id))
    }

    /// Remove a feature; the spatial index is left untouched
    pub fn remove(&mut self, id: FeatureId) -> Option<Feature> {
        self.features.remove(&id)
    }

    /// Replace a feature's geometry
    pub fn set_geometry(&mut self, id: FeatureId, geometry: Option<Geometry<f64>>) -> Result<()> {
        let kind = self.check_kind(geometry.as_ref())?;
        let feature = self.features.get_mut(&id).ok_or(Error::FeatureNotFound(id))?;
        feature.replace_geometry(geometry);
        if self.kind.is_none() {
            self.kind = kind;
        }
        Ok(())
    }

    /// Edit a feature's geometry in place.
    ///
    /// The edit is applied to a copy and stored only if the result still
    /// matches the collection's geometry type. The cached bbox is dropped.
    pub fn touch_geometry(
        &mut self,
        id: FeatureId,
        edit: impl FnOnce(&mut Geometry<f64>),
    ) -> Result<()> {
        let feature = self.features.get(&id).ok_or(Error::FeatureNotFound(id))?;
        let Some(mut geometry) = feature.geometry().cloned() else {
            return Ok(());
        };
        edit(&mut geometry);
        self.set_geometry(id, Some(geometry))
    }

    /// Features in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.values()
    }

    /// Features that have a geometry, in insertion order
    pub fn with_geometry(&self) -> impl Iterator<Item = (&Feature, &Geometry<f64>)> {
        self.features
            .values()
            .filter_map(|f| f.geometry().map(|g| (f, g)))
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Union of all feature bounding boxes
    pub fn bbox(&self) -> Result<BoundingBox> {
        self.features
            .values()
            .filter_map(Feature::bbox)
            .reduce(|a, b| a.union(&b))
            .ok_or(Error::NoGeometry)
    }

    /// New collection holding the features accepted by `keep`.
    ///
    /// Ids and order are preserved.
    pub fn select(&self, mut keep: impl FnMut(&Feature) -> bool) -> Self {
        let mut out = self.empty_like();
        out.kind = self.kind;
        out.next_id = self.next_id;
        out.features = self
            .features
            .iter()
            .filter(|(_, f)| keep(*f))
            .map(|(id, f)| (*id, f.clone()))
            .collect();
        out
    }

    /// Features whose geometry intersects `bbox`
    pub fn crop(&self, bbox: BoundingBox) -> Self {
        let rect = bbox.to_rect();
        self.select(|f| {
            f.bbox().is_some_and(|b| b.intersects(&bbox))
                && f.geometry().is_some_and(|g| g.intersects(&rect))
        })
    }

    // Spatial index

    fn index_entries(&self) -> impl Iterator<Item = (FeatureId, BoundingBox)> + '_ {
        self.features.values().filter_map(|f| {
            let bbox = f.bbox()?;
            if !bbox.is_finite() {
                warn!(feature = f.id(), "skipping feature with non-finite bbox in spatial index");
                return None;
            }
            Some((f.id(), bbox))
        })
    }

    /// (Re)build the spatial index over the current features.
    ///
    /// Features without geometry are not indexed.
    pub fn create_spatial_index(&mut self) {
        let index = SpatialIndex::build(self.index_config, self.index_entries());
        debug!(entries = index.len(), backend = ?self.index_config.backend, "built spatial index");
        self.index = Some(index);
    }

    pub fn has_spatial_index(&self) -> bool {
        self.index.is_some()
    }

    /// The index built by [`create_spatial_index`](Self::create_spatial_index)
    pub fn spatial_index(&self) -> Result<&SpatialIndex> {
        self.index.as_ref().ok_or(Error::IndexNotBuilt)
    }

    /// The built index, or a temporary one when none has been built
    pub fn index_or_build(&self) -> IndexRef<'_> {
        match &self.index {
            Some(index) => IndexRef::Borrowed(index),
            None => IndexRef::Owned(SpatialIndex::build(self.index_config, self.index_entries())),
        }
    }

    fn resolve(&self, ids: Vec<FeatureId>) -> Vec<&Feature> {
        ids.into_iter().filter_map(|id| self.features.get(&id)).collect()
    }

    /// Features whose bbox overlaps `bbox`
    pub fn quick_overlap(&self, bbox: BoundingBox) -> Result<Vec<&Feature>> {
        Ok(self.resolve(self.spatial_index()?.intersects(bbox)))
    }

    /// Indexed features whose bbox does not overlap `bbox`
    pub fn quick_disjoint(&self, bbox: BoundingBox) -> Result<Vec<&Feature>> {
        Ok(self.resolve(self.spatial_index()?.disjoint(bbox)))
    }

    /// The `k` features with the nearest bbox to `bbox`
    pub fn quick_nearest(&self, bbox: BoundingBox, k: usize) -> Result<Vec<&Feature>> {
        Ok(self.resolve(self.spatial_index()?.nearest(bbox, k)))
    }
}

impl<'a> IntoIterator for &'a FeatureCollection {
    type Item = &'a Feature;
    type IntoIter = std::collections::btree_map::Values<'a, FeatureId, Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.values()
    }
}

/// A spatial index either owned by its collection or built on the fly
#[derive(Debug)]
pub enum IndexRef<'a> {
    Borrowed(&'a SpatialIndex),
    Owned(SpatialIndex),
}

impl Deref for IndexRef<'_> {
    type Target = SpatialIndex;

    fn deref(&self) -> &SpatialIndex {
        match self {
            IndexRef::Borrowed(index) => index,
            IndexRef::Owned(index) => index,
        }
    }
}
