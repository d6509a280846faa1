//! Spatial index over feature bounding boxes
//!
//! [`SpatialIndex`] answers bbox overlap, disjoint and k-nearest queries by
//! feature id. The structure behind it is chosen by [`IndexConfig`]; callers
//! only ever see the four query operations.
//!
//! Results are candidates: a bbox overlap does not imply a geometry overlap,
//! so exact predicates must still be applied by the caller.

mod backend;
mod quadtree;
mod rtree;

use std::collections::{HashMap, HashSet};

pub use backend::Backend;
pub use quadtree::QuadTree;
pub use rtree::RTreeBackend;

use crate::config::{IndexBackend, IndexConfig};
use crate::vector::{BoundingBox, FeatureId};

/// Spatial index keyed by feature id.
///
/// Inserting an id twice replaces the earlier entry; the replacement counts
/// as a fresh insertion for tie-breaking.
#[derive(Debug)]
pub struct SpatialIndex {
    config: IndexConfig,
    backend: Box<dyn Backend>,
    /// Insertion order: slot -> live entry
    slots: Vec<Option<(FeatureId, BoundingBox)>>,
    by_id: HashMap<FeatureId, usize>,
}

fn make_backend(config: &IndexConfig, extent: Option<BoundingBox>) -> Box<dyn Backend> {
    match config.backend {
        IndexBackend::RTree => Box::new(RTreeBackend::new()),
        IndexBackend::QuadTree => Box::new(QuadTree::new(
            extent,
            config.quadtree_capacity,
            config.quadtree_max_depth,
        )),
    }
}

impl SpatialIndex {
    /// Empty index
    pub fn new(config: IndexConfig) -> Self {
        Self {
            config,
            backend: make_backend(&config, None),
            slots: Vec::new(),
            by_id: HashMap::new(),
        }
    }

    /// Build from `(id, bbox)` entries in one pass
    pub fn build(config: IndexConfig, entries: impl IntoIterator<Item = (FeatureId, BoundingBox)>) -> Self {
        let mut slots: Vec<Option<(FeatureId, BoundingBox)>> = Vec::new();
        let mut by_id = HashMap::new();
        for (id, bbox) in entries {
            if let Some(old) = by_id.insert(id, slots.len()) {
                slots[old] = None;
            }
            slots.push(Some((id, bbox)));
        }

        let extent = slots
            .iter()
            .flatten()
            .map(|(_, b)| *b)
            .reduce(|a, b| a.union(&b));
        let mut backend = make_backend(&config, extent);
        backend.bulk_load(
            slots
                .iter()
                .enumerate()
                .filter_map(|(slot, e)| e.map(|(_, bbox)| (slot, bbox)))
                .collect(),
        );

        Self {
            config,
            backend,
            slots,
            by_id,
        }
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Add one entry; an existing entry for `id` is replaced
    pub fn insert(&mut self, id: FeatureId, bbox: BoundingBox) {
        let slot = self.slots.len();
        if let Some(old) = self.by_id.insert(id, slot) {
            self.slots[old] = None;
            self.backend.remove(old);
        }
        self.slots.push(Some((id, bbox)));
        self.backend.insert(slot, bbox);
    }

    /// Drop the entry for `id`, returning whether it existed
    pub fn remove(&mut self, id: FeatureId) -> bool {
        match self.by_id.remove(&id) {
            Some(slot) => {
                self.slots[slot] = None;
                self.backend.remove(slot);
                true
            }
            None => false,
        }
    }

    /// Bounding box stored for `id`
    pub fn bbox_of(&self, id: FeatureId) -> Option<BoundingBox> {
        let slot = *self.by_id.get(&id)?;
        self.slots[slot].map(|(_, b)| b)
    }

    fn intersecting_slots(&self, bbox: BoundingBox) -> Vec<usize> {
        let mut slots: Vec<usize> = self.backend.query_rect(bbox).collect();
        slots.sort_unstable();
        slots
    }

    /// Ids whose bbox overlaps `bbox`, in insertion order
    pub fn intersects(&self, bbox: BoundingBox) -> Vec<FeatureId> {
        self.intersecting_slots(bbox)
            .into_iter()
            .filter_map(|slot| self.slots[slot].map(|(id, _)| id))
            .collect()
    }

    /// Ids whose bbox does not overlap `bbox`, in insertion order.
    ///
    /// Together with [`intersects`](Self::intersects) this partitions the index.
    pub fn disjoint(&self, bbox: BoundingBox) -> Vec<FeatureId> {
        let hits: HashSet<usize> = self.intersecting_slots(bbox).into_iter().collect();
        self.slots
            .iter()
            .enumerate()
            .filter(|(slot, _)| !hits.contains(slot))
            .filter_map(|(_, e)| e.map(|(id, _)| id))
            .collect()
    }

    /// The `k` ids with the smallest bbox-to-bbox distance, ascending.
    ///
    /// Ties keep insertion order. Fewer than `k` ids are returned when the
    /// index is smaller.
    pub fn nearest(&self, bbox: BoundingBox, k: usize) -> Vec<FeatureId> {
        self.nearest_with_distance(bbox, k)
            .into_iter()
            .map(|(id, _)| id)
            .collect()
    }

    /// Like [`nearest`](Self::nearest) with the bbox distance of each hit
    pub fn nearest_with_distance(&self, bbox: BoundingBox, k: usize) -> Vec<(FeatureId, f64)> {
        self.backend
            .nearest(bbox, k)
            .into_iter()
            .filter_map(|(dist, slot)| self.slots[slot].map(|(id, _)| (id, dist)))
            .collect()
    }

    /// Remove every entry
    pub fn clear(&mut self) {
        self.backend.clear();
        self.slots.clear();
        self.by_id.clear();
    }
}
