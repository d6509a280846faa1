//! Backend trait for spatial index implementations

use std::cmp::Ordering;
use std::fmt::Debug;

use crate::vector::BoundingBox;

/// Spatial structure over numbered slots.
///
/// Slots are assigned by [`SpatialIndex`](super::SpatialIndex) in insertion
/// order, so ordering results by slot orders them by insertion.
pub trait Backend: Debug + Send + Sync {
    /// Insert a slot with its bounding box
    fn insert(&mut self, slot: usize, bbox: BoundingBox);

    /// Insert many slots at once; backends with a bulk loader override this
    fn bulk_load(&mut self, items: Vec<(usize, BoundingBox)>) {
        for (slot, bbox) in items {
            self.insert(slot, bbox);
        }
    }

    /// Remove a slot; unknown slots are ignored
    fn remove(&mut self, slot: usize);

    /// Clear all entries
    fn clear(&mut self);

    /// Slots whose bbox intersects `rect`, in no particular order
    fn query_rect<'a>(&'a self, rect: BoundingBox) -> Box<dyn Iterator<Item = usize> + 'a>;

    /// Up to `k` slots closest to `rect` as `(distance, slot)`, ascending by
    /// distance then slot
    fn nearest(&self, rect: BoundingBox, k: usize) -> Vec<(f64, usize)>;
}

/// Best-first search queue entry shared by the tree backends.
///
/// Orders so that a `BinaryHeap` pops the smallest distance first. At equal
/// distance, nodes pop before items, so every item at that distance is
/// discovered before any of them is emitted; items then pop by slot.
#[derive(Debug)]
pub(crate) struct Queued<N> {
    pub(crate) dist: f64,
    pub(crate) visit: Visit<N>,
}

#[derive(Debug)]
pub(crate) enum Visit<N> {
    Node(N),
    Item(usize),
}

impl<N> Queued<N> {
    fn rank(&self) -> (u8, usize) {
        match self.visit {
            Visit::Node(_) => (0, 0),
            Visit::Item(slot) => (1, slot),
        }
    }
}

impl<N> PartialEq for Queued<N> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<N> Eq for Queued<N> {}

impl<N> PartialOrd for Queued<N> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<N> Ord for Queued<N> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: BinaryHeap is a max-heap.
        other
            .dist
            .total_cmp(&self.dist)
            .then_with(|| other.rank().cmp(&self.rank()))
    }
}
