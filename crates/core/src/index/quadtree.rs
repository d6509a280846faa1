//! Region quadtree backend
//!
//! Each entry lives in the deepest quadrant that fully contains its bbox.
//! Entries falling outside the root extent are kept on the root node, so the
//! extent is a performance hint rather than a constraint.

use std::collections::BinaryHeap;

use super::backend::{Backend, Queued, Visit};
use crate::vector::BoundingBox;

#[derive(Debug, Clone)]
struct QNode {
    bounds: BoundingBox,
    depth: usize,
    items: Vec<usize>,
    children: Option<[usize; 4]>,
}

impl QNode {
    fn new(bounds: BoundingBox, depth: usize) -> Self {
        Self {
            bounds,
            depth,
            items: Vec::new(),
            children: None,
        }
    }
}

/// Quadtree backend
#[derive(Debug, Clone)]
pub struct QuadTree {
    extent: Option<BoundingBox>,
    nodes: Vec<QNode>,
    /// Per slot: bbox and the node holding it
    slots: Vec<Option<(BoundingBox, usize)>>,
    capacity: usize,
    max_depth: usize,
}

const ROOT: usize = 0;

impl QuadTree {
    /// Create a quadtree over `extent`.
    ///
    /// Without an extent the root is sized from the first inserted bbox.
    pub fn new(extent: Option<BoundingBox>, capacity: usize, max_depth: usize) -> Self {
        Self {
            extent,
            nodes: Vec::new(),
            slots: Vec::new(),
            capacity: capacity.max(1),
            max_depth,
        }
    }

    fn ensure_root(&mut self, first: BoundingBox) {
        if !self.nodes.is_empty() {
            return;
        }
        let extent = self.extent.unwrap_or_else(|| {
            // Square root around the first entry, padded so neighbours fit.
            let (cx, cy) = first.center();
            let half = first.width().max(first.height()).max(1.0) * 2.0;
            BoundingBox::new(cx - half, cy - half, cx + half, cy + half)
        });
        self.nodes.push(QNode::new(extent, 0));
    }

    fn split(&mut self, node: usize) {
        let QNode { bounds, depth, .. } = self.nodes[node];
        let (cx, cy) = bounds.center();
        let quads = [
            BoundingBox::new(bounds.min_x, cy, cx, bounds.max_y),
            BoundingBox::new(cx, cy, bounds.max_x, bounds.max_y),
            BoundingBox::new(bounds.min_x, bounds.min_y, cx, cy),
            BoundingBox::new(cx, bounds.min_y, bounds.max_x, cy),
        ];
        let base = self.nodes.len();
        for quad in quads {
            self.nodes.push(QNode::new(quad, depth + 1));
        }
        self.nodes[node].children = Some([base, base + 1, base + 2, base + 3]);

        let items = std::mem::take(&mut self.nodes[node].items);
        for slot in items {
            if let Some((bbox, _)) = self.slots[slot] {
                let target = self.child_containing(node, &bbox).unwrap_or(node);
                self.nodes[target].items.push(slot);
                self.slots[slot] = Some((bbox, target));
            }
        }
    }

    fn child_containing(&self, node: usize, bbox: &BoundingBox) -> Option<usize> {
        self.nodes[node]
            .children?
            .into_iter()
            .find(|&c| self.nodes[c].bounds.contains(bbox))
    }

    fn place(&mut self, slot: usize, bbox: BoundingBox) {
        let mut node = ROOT;
        loop {
            if let Some(child) = self.child_containing(node, &bbox) {
                node = child;
                continue;
            }
            let n = &self.nodes[node];
            let inside = n.bounds.contains(&bbox);
            if n.children.is_none()
                && inside
                && n.items.len() >= self.capacity
                && n.depth < self.max_depth
            {
                self.split(node);
                continue;
            }
            break;
        }
        self.nodes[node].items.push(slot);
        self.slots[slot] = Some((bbox, node));
    }

    fn slot_bbox(&self, slot: usize) -> Option<BoundingBox> {
        self.slots.get(slot).copied().flatten().map(|(b, _)| b)
    }
}

impl Backend for QuadTree {
    fn insert(&mut self, slot: usize, bbox: BoundingBox) {
        self.remove(slot);
        self.ensure_root(bbox);
        if self.slots.len() <= slot {
            self.slots.resize(slot + 1, None);
        }
        self.place(slot, bbox);
    }

    fn bulk_load(&mut self, items: Vec<(usize, BoundingBox)>) {
        if self.nodes.is_empty() && self.extent.is_none() {
            self.extent = items.iter().map(|(_, b)| *b).reduce(|a, b| a.union(&b));
        }
        for (slot, bbox) in items {
            self.insert(slot, bbox);
        }
    }

    fn remove(&mut self, slot: usize) {
        if let Some((_, node)) = self.slots.get_mut(slot).and_then(Option::take) {
            let items = &mut self.nodes[node].items;
            if let Some(pos) = items.iter().position(|&s| s == slot) {
                items.swap_remove(pos);
            }
        }
    }

    fn clear(&mut self) {
        self.nodes.clear();
        self.slots.clear();
    }

    fn query_rect<'a>(&'a self, rect: BoundingBox) -> Box<dyn Iterator<Item = usize> + 'a> {
        let mut hits = Vec::new();
        if self.nodes.is_empty() {
            return Box::new(hits.into_iter());
        }
        let mut stack = vec![ROOT];
        while let Some(node) = stack.pop() {
            let n = &self.nodes[node];
            hits.extend(
                n.items
                    .iter()
                    .copied()
                    .filter(|&slot| self.slot_bbox(slot).is_some_and(|b| b.intersects(&rect))),
            );
            if let Some(children) = n.children {
                stack.extend(
                    children
                        .into_iter()
                        .filter(|&c| self.nodes[c].bounds.intersects(&rect)),
                );
            }
        }
        Box::new(hits.into_iter())
    }

    fn nearest(&self, rect: BoundingBox, k: usize) -> Vec<(f64, usize)> {
        let mut out = Vec::new();
        if k == 0 || self.nodes.is_empty() {
            return out;
        }
        let mut heap: BinaryHeap<Queued<usize>> = BinaryHeap::new();
        // Root items may lie outside the root bounds, so it cannot be pruned.
        heap.push(Queued {
            dist: 0.0,
            visit: Visit::Node(ROOT),
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
                    let n = &self.nodes[node];
                    for &slot in &n.items {
                        if let Some(bbox) = self.slot_bbox(slot) {
                            heap.push(Queued {
                                dist: rect.distance(&bbox),
                                visit: Visit::Item(slot),
                            });
                        }
                    }
                    for child in n.children.into_iter().flatten() {
                        heap.push(Queued {
                            dist: rect.distance(&self.nodes[child].bounds),
                            visit: Visit::Node(child),
                        });
                    }
                }
            }
        }
        out
    }
}
