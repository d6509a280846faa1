//! Configuration structs threaded through collection construction

use serde::{Deserialize, Serialize};

/// Spatial index backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    /// R*-tree with bulk loading
    #[default]
    RTree,
    /// Region quadtree storing each entry in the smallest enclosing quadrant
    QuadTree,
}

/// Spatial index settings.
///
/// `quadtree_capacity` and `quadtree_max_depth` only affect the quadtree backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub backend: IndexBackend,
    /// Entries a quadrant holds before it splits
    pub quadtree_capacity: usize,
    pub quadtree_max_depth: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            backend: IndexBackend::RTree,
            quadtree_capacity: 8,
            quadtree_max_depth: 16,
        }
    }
}

impl IndexConfig {
    pub fn quadtree() -> Self {
        Self {
            backend: IndexBackend::QuadTree,
            ..Self::default()
        }
    }
}
