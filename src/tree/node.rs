//! Node arena backing a random cut tree.
//!
//! Nodes live in a flat vector and reference each other through 32-bit
//! indices; the parent link is a back-reference, never an ownership edge.
//! Leaves and internal nodes share one id space so parent pointers stay
//! uniform.

use crate::geometry::{BoundingBox, Cut};
use crate::types::PointHandle;

/// Index of a node in the arena. `NULL_NODE` marks "no node".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct NodeId(pub(crate) u32);

pub(crate) const NULL_NODE: NodeId = NodeId(u32::MAX);

impl NodeId {
    pub(crate) fn is_null(self) -> bool {
        self == NULL_NODE
    }

    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Tagged node record.
#[derive(Debug)]
pub(crate) struct Node {
    pub parent: NodeId,
    pub mass: u32,
    pub kind: NodeKind,
}

#[derive(Debug)]
pub(crate) enum NodeKind {
    Internal {
        cut: Cut,
        left: NodeId,
        right: NodeId,
        /// Cached box; `None` means "recompute on demand".
        bounding_box: Option<BoundingBox>,
        /// Mass-weighted sum of the leaf points below, when enabled.
        point_sum: Option<Vec<f64>>,
    },
    Leaf {
        point: PointHandle,
        /// Multiset of sequence indexes, when enabled. Length equals mass.
        sequence_indexes: Option<Vec<u64>>,
    },
}

impl Node {
    pub(crate) fn leaf(point: PointHandle, sequence_index: Option<u64>) -> Self {
        Self {
            parent: NULL_NODE,
            mass: 1,
            kind: NodeKind::Leaf {
                point,
                sequence_indexes: sequence_index.map(|s| vec![s]),
            },
        }
    }

    pub(crate) fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf { .. })
    }
}

/// Flat arena with a free list. Released slots are reused in LIFO order.
#[derive(Debug, Default)]
pub(crate) struct NodeArena {
    nodes: Vec<Option<Node>>,
    free: Vec<u32>,
    internal_count: usize,
}

impl NodeArena {
    pub(crate) fn alloc(&mut self, node: Node) -> NodeId {
        if !node.is_leaf() {
            self.internal_count += 1;
        }
        if let Some(slot) = self.free.pop() {
            self.nodes[slot as usize] = Some(node);
            NodeId(slot)
        } else {
            self.nodes.push(Some(node));
            NodeId((self.nodes.len() - 1) as u32)
        }
    }

    pub(crate) fn release(&mut self, id: NodeId) {
        let slot = self.nodes[id.index()]
            .take()
            .expect("released node must be live");
        if !slot.is_leaf() {
            self.internal_count -= 1;
        }
        self.free.push(id.0);
    }

    pub(crate) fn get(&self, id: NodeId) -> &Node {
        self.nodes[id.index()].as_ref().expect("live node id")
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes[id.index()].as_mut().expect("live node id")
    }

    pub(crate) fn internal_count(&self) -> usize {
        self.internal_count
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len() - self.free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_release_reuses_slots() {
        let mut arena = NodeArena::default();
        let a = arena.alloc(Node::leaf(PointHandle(0), None));
        let b = arena.alloc(Node::leaf(PointHandle(1), None));
        assert_eq!(arena.len(), 2);
        arena.release(a);
        assert_eq!(arena.len(), 1);
        let c = arena.alloc(Node::leaf(PointHandle(2), Some(5)));
        assert_eq!(c, a);
        assert_ne!(c, b);
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn test_internal_count_tracking() {
        let mut arena = NodeArena::default();
        let leaf = arena.alloc(Node::leaf(PointHandle(0), None));
        assert_eq!(arena.internal_count(), 0);
        let internal = arena.alloc(Node {
            parent: NULL_NODE,
            mass: 1,
            kind: NodeKind::Internal {
                cut: Cut::new(0, 0.0),
                left: leaf,
                right: NULL_NODE,
                bounding_box: None,
                point_sum: None,
            },
        });
        assert_eq!(arena.internal_count(), 1);
        arena.release(internal);
        assert_eq!(arena.internal_count(), 0);
    }
}
