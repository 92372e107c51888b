//! Read-only node views handed to visitors during traversal.

use crate::geometry::BoundingBox;
use crate::store::PointStore;
use crate::tree::node::{NodeId, NodeKind};
use crate::tree::RandomCutTree;
use crate::types::PointHandle;

/// A window onto one tree node: cut, bounding box (cached or recomputed),
/// mass, and leaf payload. Views are cheap to construct; the bounding box
/// is materialized only when asked for.
#[derive(Clone, Copy)]
pub struct NodeView<'a> {
    tree: &'a RandomCutTree,
    store: &'a PointStore,
    node: NodeId,
}

impl<'a> NodeView<'a> {
    pub(crate) fn new(tree: &'a RandomCutTree, store: &'a PointStore, node: NodeId) -> Self {
        Self { tree, store, node }
    }

    /// Whether this is a leaf.
    pub fn is_leaf(&self) -> bool {
        self.tree.arena().get(self.node).is_leaf()
    }

    /// Number of point occurrences in the subtree.
    pub fn mass(&self) -> usize {
        self.tree.arena().get(self.node).mass as usize
    }

    /// Cut dimension, for internal nodes.
    pub fn cut_dimension(&self) -> Option<usize> {
        match &self.tree.arena().get(self.node).kind {
            NodeKind::Internal { cut, .. } => Some(cut.dimension),
            NodeKind::Leaf { .. } => None,
        }
    }

    /// Cut value, for internal nodes.
    pub fn cut_value(&self) -> Option<f64> {
        match &self.tree.arena().get(self.node).kind {
            NodeKind::Internal { cut, .. } => Some(cut.value),
            NodeKind::Leaf { .. } => None,
        }
    }

    /// Tie-to-left side test against this node's cut.
    pub fn left_of(&self, point: &[f64]) -> Option<bool> {
        match &self.tree.arena().get(self.node).kind {
            NodeKind::Internal { cut, .. } => Some(cut.is_left_of(point)),
            NodeKind::Leaf { .. } => None,
        }
    }

    /// The node's bounding box, cached or recomputed from its leaves.
    pub fn bounding_box(&self) -> BoundingBox {
        self.tree.bounding_box_of(self.store, self.node)
    }

    /// Probability that a random cut separates `point` from this subtree.
    pub fn probability_of_separation(&self, point: &[f64]) -> f64 {
        self.bounding_box().probability_of_separation(point)
    }

    /// Separation probability over the coordinates not flagged missing.
    pub fn probability_of_separation_with_missing(
        &self,
        point: &[f64],
        missing: &[bool],
    ) -> f64 {
        self.bounding_box()
            .probability_of_separation_with_missing(point, missing)
    }

    /// Handle of the leaf's point.
    pub fn leaf_handle(&self) -> Option<PointHandle> {
        match &self.tree.arena().get(self.node).kind {
            NodeKind::Leaf { point, .. } => Some(*point),
            NodeKind::Internal { .. } => None,
        }
    }

    /// The leaf's point, resolved from the store.
    pub fn leaf_point(&self) -> Option<Vec<f64>> {
        self.leaf_handle().map(|h| {
            self.store
                .get_copy(h)
                .expect("leaf handle is live while referenced by the tree")
        })
    }

    /// Mass-weighted mean of the leaf points below, when enabled.
    pub fn center_of_mass(&self) -> Option<Vec<f64>> {
        let node = self.tree.arena().get(self.node);
        match &node.kind {
            NodeKind::Internal {
                point_sum: Some(sum),
                ..
            } => {
                let mass = node.mass as f64;
                Some(sum.iter().map(|s| s / mass).collect())
            }
            NodeKind::Leaf { .. } if self.tree.center_of_mass_enabled() => self.leaf_point(),
            _ => None,
        }
    }

    /// Sequence indexes recorded at the leaf, when enabled.
    pub fn sequence_indexes(&self) -> Option<&'a [u64]> {
        match &self.tree.arena().get(self.node).kind {
            NodeKind::Leaf {
                sequence_indexes: Some(indexes),
                ..
            } => Some(indexes.as_slice()),
            _ => None,
        }
    }

    /// View of the left child, for internal nodes.
    pub fn left_child(&self) -> Option<NodeView<'a>> {
        match &self.tree.arena().get(self.node).kind {
            NodeKind::Internal { left, .. } => Some(NodeView::new(self.tree, self.store, *left)),
            NodeKind::Leaf { .. } => None,
        }
    }

    /// View of the right child, for internal nodes.
    pub fn right_child(&self) -> Option<NodeView<'a>> {
        match &self.tree.arena().get(self.node).kind {
            NodeKind::Internal { right, .. } => Some(NodeView::new(self.tree, self.store, *right)),
            NodeKind::Leaf { .. } => None,
        }
    }
}

impl std::fmt::Debug for NodeView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeView")
            .field("is_leaf", &self.is_leaf())
            .field("mass", &self.mass())
            .finish()
    }
}
