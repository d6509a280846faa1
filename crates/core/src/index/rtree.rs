//! R-tree backend built on `rstar`

use std::collections::BinaryHeap;

use rstar::{ParentNode, RTree, RTreeNode, RTreeObject, AABB};

use super::backend::{Backend, Queued, Visit};
use crate::vector::BoundingBox;

#[derive(Debug, Clone, PartialEq)]
struct Entry {
    slot: usize,
    bbox: BoundingBox,
}

impl RTreeObject for Entry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        to_aabb(&self.bbox)
    }
}

fn to_aabb(bbox: &BoundingBox) -> AABB<[f64; 2]> {
    AABB::from_corners([bbox.min_x, bbox.min_y], [bbox.max_x, bbox.max_y])
}

fn from_aabb(aabb: &AABB<[f64; 2]>) -> BoundingBox {
    let lower = aabb.lower();
    let upper = aabb.upper();
    BoundingBox::new(lower[0], lower[1], upper[0], upper[1])
}

/// R*-tree backend.
///
/// Bulk loading packs the tree in one pass; single inserts use rstar's
/// R*-insertion.
#[derive(Debug, Default)]
pub struct RTreeBackend {
    tree: RTree<Entry>,
    slots: Vec<Option<BoundingBox>>,
}

impl RTreeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn remember(&mut self, slot: usize, bbox: BoundingBox) {
        if self.slots.len() <= slot {
            self.slots.resize(slot + 1, None);
        }
        self.slots[slot] = Some(bbox);
    }
}

impl Backend for RTreeBackend {
    fn insert(&mut self, slot: usize, bbox: BoundingBox) {
        self.remember(slot, bbox);
        self.tree.insert(Entry { slot, bbox });
    }

    fn bulk_load(&mut self, items: Vec<(usize, BoundingBox)>) {
        if self.tree.size() > 0 {
            for (slot, bbox) in items {
                self.insert(slot, bbox);
            }
            return;
        }
        for (slot, bbox) in &items {
            self.remember(*slot, *bbox);
        }
        let entries = items
            .into_iter()
            .map(|(slot, bbox)| Entry { slot, bbox })
            .collect();
        self.tree = RTree::bulk_load(entries);
    }

    fn remove(&mut self, slot: usize) {
        if let Some(bbox) = self.slots.get_mut(slot).and_then(Option::take) {
            self.tree.remove(&Entry { slot, bbox });
        }
    }

    fn clear(&mut self) {
        self.tree = RTree::new();
        self.slots.clear();
    }

    fn query_rect<'a>(&'a self, rect: BoundingBox) -> Box<dyn Iterator<Item = usize> + 'a> {
        Box::new(
            self.tree
                .locate_in_envelope_intersecting(&to_aabb(&rect))
                .map(|e| e.slot),
        )
    }

    fn nearest(&self, rect: BoundingBox, k: usize) -> Vec<(f64, usize)> {
        let mut out = Vec::with_capacity(k.min(self.tree.size()));
        if k == 0 || self.tree.size() == 0 {
            return out;
        }

        let mut heap: BinaryHeap<Queued<&ParentNode<Entry>>> = BinaryHeap::new();
        let root = self.tree.root();
        heap.push(Queued {
            dist: rect.distance(&from_aabb(&root.envelope())),
            visit: Visit::Node(root),
        });

        while let Some(Queued { dist, visit }) = heap.pop() {
            match visit {
                Visit::Item(slot) => {
                    out.push((dist, slot));
                    if out.len() == k {
                        break;
                    }
                }
                Visit::Node(node) => {
                    for child in node.children() {
                        let queued = match child {
                            RTreeNode::Leaf(entry) => Queued {
                                dist: rect.distance(&entry.bbox),
                                visit: Visit::Item(entry.slot),
                            },
                            RTreeNode::Parent(parent) => Queued {
                                dist: rect.distance(&from_aabb(&parent.envelope())),
                                visit: Visit::Node(parent),
                            },
                        };
                        heap.push(queued);
                    }
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_query_remove() {
        let mut backend = RTreeBackend::new();
        backend.insert(0, BoundingBox::new(0.0, 0.0, 1.0, 1.0));
        backend.insert(1, BoundingBox::new(5.0, 5.0, 6.0, 6.0));

        let hits: Vec<_> = backend.query_rect(BoundingBox::new(0.5, 0.5, 2.0, 2.0)).collect();
        assert_eq!(hits, vec![0]);

        backend.remove(0);
        assert_eq!(backend.query_rect(BoundingBox::new(0.5, 0.5, 2.0, 2.0)).count(), 0);
        backend.remove(0);
    }

    #[test]
    fn test_nearest_bulk_loaded() {
        let mut backend = RTreeBackend::new();
        let items = (0..100)
            .map(|i| {
                let x = i as f64 * 2.0;
                (i, BoundingBox::new(x, 0.0, x + 1.0, 1.0))
            })
            .collect();
        backend.bulk_load(items);

        let near = backend.nearest(BoundingBox::from_point(40.5, 0.5), 3);
        let slots: Vec<_> = near.iter().map(|(_, s)| *s).collect();
        assert_eq!(slots[0], 20);
        assert_eq!(near[0].0, 0.0);
        assert_eq!(near.len(), 3);
        assert!(near.windows(2).all(|w| w[0].0 <= w[1].0));
    }
}
