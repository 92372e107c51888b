//! The random cut tree: an incremental binary space partition over the
//! points of one sampled reservoir.
//!
//! Insertion walks from the root keeping the entered subtree's bounding
//! box; whenever the box has to grow to admit the new point, a random cut
//! is drawn on the merged box, and if it separates the point from the
//! subtree the walk stops and splits there. This realizes the random cut
//! tree distribution: the split probability at a node is proportional to
//! how much the point enlarges the node's box.
//!
//! Deletion finds the exact leaf, and when its mass reaches zero promotes
//! the sibling into the parent's place, recomputing cached boxes up the
//! spine. Both operations are atomic: any failure leaves the tree unchanged.

mod node;
mod view;

pub use view::NodeView;

use node::{Node, NodeArena, NodeId, NodeKind, NULL_NODE};

use crate::config::TreeConfig;
use crate::errors::{ForestError, Result};
use crate::geometry::{random_cut, BoundingBox, Cut};
use crate::rng::{ChaChaSource, CutSource};
use crate::store::PointStore;
use crate::types::{PointHandle, SequenceIndex};
use crate::visitor::{MultiVisitor, Visitor};

/// A single random cut tree bound to a point store by handle.
pub struct RandomCutTree {
    arena: NodeArena,
    root: NodeId,
    dimensions: usize,
    center_of_mass_enabled: bool,
    store_sequence_indexes_enabled: bool,
    bounding_box_cache_fraction: f64,
    rng: Box<dyn CutSource>,
}

impl std::fmt::Debug for RandomCutTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomCutTree")
            .field("dimensions", &self.dimensions)
            .field("mass", &self.mass())
            .field("nodes", &self.arena.len())
            .finish()
    }
}

impl RandomCutTree {
    /// Build an empty tree drawing cuts from `rng`.
    pub fn new(dimensions: usize, config: TreeConfig, rng: Box<dyn CutSource>) -> Self {
        Self {
            arena: NodeArena::default(),
            root: NULL_NODE,
            dimensions,
            center_of_mass_enabled: config.center_of_mass_enabled,
            store_sequence_indexes_enabled: config.store_sequence_indexes_enabled,
            bounding_box_cache_fraction: config.bounding_box_cache_fraction.clamp(0.0, 1.0),
            rng,
        }
    }

    /// Build an empty tree with a seeded ChaCha source.
    pub fn with_seed(dimensions: usize, config: TreeConfig, seed: u64) -> Self {
        Self::new(dimensions, config, Box::new(ChaChaSource::seeded(seed)))
    }

    /// Dimensionality of the points this tree partitions.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Total mass: number of point occurrences in the tree.
    pub fn mass(&self) -> usize {
        if self.root.is_null() {
            0
        } else {
            self.arena.get(self.root).mass as usize
        }
    }

    /// Whether the tree holds no points.
    pub fn is_empty(&self) -> bool {
        self.root.is_null()
    }

    /// Whether internal nodes carry center-of-mass accumulators.
    pub fn center_of_mass_enabled(&self) -> bool {
        self.center_of_mass_enabled
    }

    /// Whether leaves record sequence-index multisets.
    pub fn store_sequence_indexes_enabled(&self) -> bool {
        self.store_sequence_indexes_enabled
    }

    /// Current bounding-box cache fraction.
    pub fn bounding_box_cache_fraction(&self) -> f64 {
        self.bounding_box_cache_fraction
    }

    /// Retarget the bounding-box cache. Applied lazily: caches are dropped
    /// or rebuilt as updates touch the affected nodes.
    pub fn set_bounding_box_cache_fraction(&mut self, fraction: f64) {
        self.bounding_box_cache_fraction = fraction.clamp(0.0, 1.0);
    }

    /// Read-only view of the root, if any.
    pub fn root_view<'a>(&'a self, store: &'a PointStore) -> Option<NodeView<'a>> {
        if self.root.is_null() {
            None
        } else {
            Some(NodeView::new(self, store, self.root))
        }
    }

    pub(crate) fn arena(&self) -> &NodeArena {
        &self.arena
    }

    /// Insert the point behind `handle` with a unique sequence index.
    ///
    /// Returns the handle actually retained: when the point already exists
    /// in the tree, the existing leaf's handle is returned and the caller
    /// is expected to transfer the reference it holds for `handle`.
    pub fn add_point(
        &mut self,
        store: &PointStore,
        handle: PointHandle,
        sequence_index: SequenceIndex,
    ) -> Result<PointHandle> {
        let point = store.get_copy(handle)?;
        if point.len() != self.dimensions {
            return Err(ForestError::InvalidDimension {
                expected: self.dimensions,
                actual: point.len(),
            });
        }
        if self.root.is_null() {
            let seq = self.store_sequence_indexes_enabled.then_some(sequence_index);
            self.root = self.arena.alloc(Node::leaf(handle, seq));
            return Ok(handle);
        }

        let mut path: Vec<NodeId> = Vec::new();
        let mut current = self.root;
        loop {
            let (leaf_handle, cut, left, right) = match &self.arena.get(current).kind {
                NodeKind::Leaf { point: p, .. } => (Some(*p), None, NULL_NODE, NULL_NODE),
                NodeKind::Internal {
                    cut, left, right, ..
                } => (None, Some(*cut), *left, *right),
            };

            if let Some(leaf_handle) = leaf_handle {
                if store.is_equal(leaf_handle, &point)? {
                    self.absorb_duplicate(current, &path, &point, sequence_index);
                    return Ok(leaf_handle);
                }
            }

            let subtree_box = self.bounding_box_of(store, current);
            if subtree_box.contains(&point) {
                // inside the box: no randomness is consumed on this step
                path.push(current);
                current = if cut
                    .expect("a leaf's degenerate box cannot contain a distinct point")
                    .is_left_of(&point)
                {
                    left
                } else {
                    right
                };
                continue;
            }

            let merged = subtree_box.merged_with_point(&point)?;
            let factor = self.rng.next_unit();
            let candidate = random_cut(factor, &merged).ok_or_else(|| {
                ForestError::CacheState("merged box degenerate during insertion".into())
            })?;
            let dim = candidate.dimension;
            let separates = candidate.value < subtree_box.min_value(dim)
                || subtree_box.max_value(dim) <= candidate.value;
            if separates {
                self.split_at(
                    store,
                    current,
                    candidate,
                    merged,
                    &point,
                    handle,
                    sequence_index,
                    &path,
                );
                return Ok(handle);
            }
            path.push(current);
            current = if cut
                .expect("a cut on a box merged with a distinct point separates a leaf")
                .is_left_of(&point)
            {
                left
            } else {
                right
            };
        }
    }

    /// Remove one occurrence of `point` recorded at `sequence_index`.
    ///
    /// Returns the handle of the affected leaf; the caller drops the
    /// reference it holds for it.
    pub fn delete_point(
        &mut self,
        store: &PointStore,
        point: &[f64],
        sequence_index: SequenceIndex,
    ) -> Result<PointHandle> {
        if point.len() != self.dimensions {
            return Err(ForestError::InvalidDimension {
                expected: self.dimensions,
                actual: point.len(),
            });
        }
        if self.root.is_null() {
            return Err(ForestError::PointNotFound);
        }

        let mut path: Vec<NodeId> = Vec::new();
        let mut current = self.root;
        loop {
            match &self.arena.get(current).kind {
                NodeKind::Internal {
                    cut,
                    left,
                    right,
                    bounding_box,
                    ..
                } => {
                    if let Some(bbox) = bounding_box {
                        if !bbox.contains(point) {
                            return Err(ForestError::PointNotFound);
                        }
                    }
                    let next = if cut.is_left_of(point) { *left } else { *right };
                    path.push(current);
                    current = next;
                }
                NodeKind::Leaf { point: handle, .. } => {
                    if !store.is_equal(*handle, point)? {
                        return Err(ForestError::PointNotFound);
                    }
                    break;
                }
            }
        }

        let leaf = current;
        let leaf_handle = match &self.arena.get(leaf).kind {
            NodeKind::Leaf { point: handle, .. } => *handle,
            NodeKind::Internal { .. } => unreachable!("walk ends at a leaf"),
        };

        // all failure checks precede any mutation
        if self.store_sequence_indexes_enabled {
            let node = self.arena.get_mut(leaf);
            if let NodeKind::Leaf {
                sequence_indexes: Some(seqs),
                ..
            } = &mut node.kind
            {
                let position = seqs
                    .iter()
                    .position(|&s| s == sequence_index)
                    .ok_or(ForestError::SequenceNotFound(sequence_index))?;
                seqs.swap_remove(position);
            }
        }

        let remaining = {
            let node = self.arena.get_mut(leaf);
            node.mass -= 1;
            node.mass
        };
        if remaining > 0 {
            self.propagate_mass_decrement(&path, point);
            return Ok(leaf_handle);
        }

        if path.is_empty() {
            self.arena.release(leaf);
            self.root = NULL_NODE;
            return Ok(leaf_handle);
        }

        let parent = *path.last().expect("non-empty path");
        let sibling = self.sibling_of(parent, leaf);
        if path.len() == 1 {
            self.root = sibling;
            self.arena.get_mut(sibling).parent = NULL_NODE;
        } else {
            let grandparent = path[path.len() - 2];
            self.replace_child_pointer(grandparent, parent, sibling);
        }
        self.arena.release(leaf);
        self.arena.release(parent);
        self.propagate_delete(store, &path[..path.len() - 1], point);
        Ok(leaf_handle)
    }

    /// Walk the tree along `point`'s path with a visitor.
    pub fn traverse<V: Visitor>(
        &self,
        store: &PointStore,
        point: &[f64],
        mut visitor: V,
    ) -> Result<V::Output> {
        if point.len() != self.dimensions {
            return Err(ForestError::InvalidDimension {
                expected: self.dimensions,
                actual: point.len(),
            });
        }
        if let Some(index) = point.iter().position(|x| x.is_nan()) {
            // NaN only marks missing values in multi-visitor queries
            return Err(ForestError::InvalidPoint { index });
        }
        if self.root.is_null() {
            return Err(ForestError::EmptyTree);
        }

        let mut path: Vec<(NodeId, usize)> = Vec::new();
        let mut current = self.root;
        let mut depth = 0usize;
        loop {
            match &self.arena.get(current).kind {
                NodeKind::Internal {
                    cut, left, right, ..
                } => {
                    visitor.accept(&NodeView::new(self, store, current), depth);
                    path.push((current, depth));
                    current = if cut.is_left_of(point) { *left } else { *right };
                    depth += 1;
                }
                NodeKind::Leaf { .. } => {
                    visitor.accept_leaf(&NodeView::new(self, store, current), depth);
                    break;
                }
            }
        }
        if visitor.path_post_order() {
            for &(id, d) in path.iter().rev() {
                visitor.accept(&NodeView::new(self, store, id), d);
            }
        }
        Ok(visitor.result())
    }

    /// Walk the tree with a forking visitor; `point` may carry NaN in the
    /// coordinates the visitor treats as missing.
    pub fn traverse_multi<V: MultiVisitor>(
        &self,
        store: &PointStore,
        point: &[f64],
        mut visitor: V,
    ) -> Result<V::Output> {
        if point.len() != self.dimensions {
            return Err(ForestError::InvalidDimension {
                expected: self.dimensions,
                actual: point.len(),
            });
        }
        if self.root.is_null() {
            return Err(ForestError::EmptyTree);
        }
        self.multi_walk(store, point, self.root, 0, &mut visitor);
        Ok(visitor.result())
    }

    fn multi_walk<V: MultiVisitor>(
        &self,
        store: &PointStore,
        point: &[f64],
        node: NodeId,
        depth: usize,
        visitor: &mut V,
    ) {
        let (cut, left, right) = match &self.arena.get(node).kind {
            NodeKind::Leaf { .. } => {
                visitor.accept_leaf(&NodeView::new(self, store, node), depth);
                return;
            }
            NodeKind::Internal {
                cut, left, right, ..
            } => (*cut, *left, *right),
        };
        visitor.accept(&NodeView::new(self, store, node), depth);
        if visitor.trigger(&NodeView::new(self, store, node)) {
            let mut fork = visitor.new_copy();
            self.multi_walk(store, point, left, depth + 1, &mut fork);
            self.multi_walk(store, point, right, depth + 1, visitor);
            visitor.combine(fork);
        } else {
            let child = if cut.is_left_of(point) { left } else { right };
            self.multi_walk(store, point, child, depth + 1, visitor);
        }
        if visitor.path_post_order() {
            visitor.accept(&NodeView::new(self, store, node), depth);
        }
    }

    /// The node's box: cached when present, otherwise merged from its
    /// descendants, reusing any cached boxes encountered on the way.
    pub(crate) fn bounding_box_of(&self, store: &PointStore, id: NodeId) -> BoundingBox {
        let node = self.arena.get(id);
        match &node.kind {
            NodeKind::Leaf { point, .. } => BoundingBox::from_point(
                &store
                    .get_copy(*point)
                    .expect("leaf handle is live while referenced by the tree"),
            ),
            NodeKind::Internal {
                bounding_box: Some(bbox),
                ..
            } => bbox.clone(),
            NodeKind::Internal { left, right, .. } => {
                let mut stack = vec![*left, *right];
                let mut merged: Option<BoundingBox> = None;
                while let Some(next) = stack.pop() {
                    let contribution = match &self.arena.get(next).kind {
                        NodeKind::Leaf { point, .. } => Some(BoundingBox::from_point(
                            &store
                                .get_copy(*point)
                                .expect("leaf handle is live while referenced by the tree"),
                        )),
                        NodeKind::Internal {
                            bounding_box: Some(bbox),
                            ..
                        } => Some(bbox.clone()),
                        NodeKind::Internal { left, right, .. } => {
                            stack.push(*left);
                            stack.push(*right);
                            None
                        }
                    };
                    if let Some(bbox) = contribution {
                        match &mut merged {
                            Some(acc) => {
                                let _ = acc.merge_box(&bbox);
                            }
                            None => merged = Some(bbox),
                        }
                    }
                }
                merged.expect("internal node has at least two descendants")
            }
        }
    }

    fn should_cache(&self, depth: usize) -> bool {
        let fraction = self.bounding_box_cache_fraction;
        if fraction >= 1.0 {
            return true;
        }
        if fraction <= 0.0 {
            return false;
        }
        let budget = (fraction * self.arena.internal_count() as f64).floor() as usize;
        if budget == 0 {
            return false;
        }
        // whole BFS levels nearest the root fit the budget
        let levels = ((budget + 1) as f64).log2().floor() as usize;
        depth < levels
    }

    #[allow(clippy::too_many_arguments)]
    fn split_at(
        &mut self,
        store: &PointStore,
        displaced: NodeId,
        cut: Cut,
        merged_box: BoundingBox,
        point: &[f64],
        handle: PointHandle,
        sequence_index: SequenceIndex,
        path: &[NodeId],
    ) {
        let seq = self.store_sequence_indexes_enabled.then_some(sequence_index);
        let new_leaf = self.arena.alloc(Node::leaf(handle, seq));
        let displaced_mass = self.arena.get(displaced).mass;
        let point_sum = if self.center_of_mass_enabled {
            let mut sum = self.subtree_point_sum(store, displaced);
            for (s, &x) in sum.iter_mut().zip(point.iter()) {
                *s += x;
            }
            Some(sum)
        } else {
            None
        };
        let (left, right) = if cut.is_left_of(point) {
            (new_leaf, displaced)
        } else {
            (displaced, new_leaf)
        };
        let bounding_box = if self.should_cache(path.len()) {
            Some(merged_box)
        } else {
            None
        };
        let new_internal = self.arena.alloc(Node {
            parent: NULL_NODE,
            mass: displaced_mass + 1,
            kind: NodeKind::Internal {
                cut,
                left,
                right,
                bounding_box,
                point_sum,
            },
        });

        let old_parent = self.arena.get(displaced).parent;
        self.arena.get_mut(displaced).parent = new_internal;
        self.arena.get_mut(new_leaf).parent = new_internal;
        self.arena.get_mut(new_internal).parent = old_parent;
        if old_parent.is_null() {
            self.root = new_internal;
        } else {
            self.replace_child_pointer(old_parent, displaced, new_internal);
        }
        self.propagate_insert(path, point);
    }

    fn absorb_duplicate(
        &mut self,
        leaf: NodeId,
        path: &[NodeId],
        point: &[f64],
        sequence_index: SequenceIndex,
    ) {
        {
            let node = self.arena.get_mut(leaf);
            node.mass += 1;
            if let NodeKind::Leaf {
                sequence_indexes: Some(seqs),
                ..
            } = &mut node.kind
            {
                seqs.push(sequence_index);
            }
        }
        for &ancestor in path.iter().rev() {
            let node = self.arena.get_mut(ancestor);
            node.mass += 1;
            if let NodeKind::Internal {
                point_sum: Some(sum),
                ..
            } = &mut node.kind
            {
                for (s, &x) in sum.iter_mut().zip(point.iter()) {
                    *s += x;
                }
            }
        }
    }

    fn propagate_insert(&mut self, path: &[NodeId], point: &[f64]) {
        let mut boxes_done = false;
        for (depth, &ancestor) in path.iter().enumerate().rev() {
            let cache_wanted = self.should_cache(depth);
            let node = self.arena.get_mut(ancestor);
            node.mass += 1;
            if let NodeKind::Internal {
                bounding_box,
                point_sum,
                ..
            } = &mut node.kind
            {
                if let Some(sum) = point_sum {
                    for (s, &x) in sum.iter_mut().zip(point.iter()) {
                        *s += x;
                    }
                }
                if !cache_wanted {
                    *bounding_box = None;
                } else if !boxes_done {
                    if let Some(bbox) = bounding_box {
                        if let Ok(false) = bbox.merge_point(point) {
                            // the point was already inside; every box above
                            // contains this one, so they need no update
                            boxes_done = true;
                        }
                    }
                }
            }
        }
    }

    fn propagate_mass_decrement(&mut self, path: &[NodeId], point: &[f64]) {
        for &ancestor in path.iter().rev() {
            let node = self.arena.get_mut(ancestor);
            node.mass -= 1;
            if let NodeKind::Internal {
                point_sum: Some(sum),
                ..
            } = &mut node.kind
            {
                for (s, &x) in sum.iter_mut().zip(point.iter()) {
                    *s -= x;
                }
            }
        }
    }

    fn propagate_delete(&mut self, store: &PointStore, path: &[NodeId], point: &[f64]) {
        let mut boxes_done = false;
        for (depth, &ancestor) in path.iter().enumerate().rev() {
            {
                let node = self.arena.get_mut(ancestor);
                node.mass -= 1;
                if let NodeKind::Internal {
                    point_sum: Some(sum),
                    ..
                } = &mut node.kind
                {
                    for (s, &x) in sum.iter_mut().zip(point.iter()) {
                        *s -= x;
                    }
                }
            }
            if boxes_done {
                continue;
            }
            let cache_wanted = self.should_cache(depth);
            let (left, right, has_cache) = match &self.arena.get(ancestor).kind {
                NodeKind::Internal {
                    left,
                    right,
                    bounding_box,
                    ..
                } => (*left, *right, bounding_box.is_some()),
                NodeKind::Leaf { .. } => continue,
            };
            if !cache_wanted {
                if has_cache {
                    if let NodeKind::Internal { bounding_box, .. } =
                        &mut self.arena.get_mut(ancestor).kind
                    {
                        *bounding_box = None;
                    }
                }
                continue;
            }
            let mut recomputed = self.bounding_box_of(store, left);
            let right_box = self.bounding_box_of(store, right);
            let _ = recomputed.merge_box(&right_box);
            if let NodeKind::Internal { bounding_box, .. } =
                &mut self.arena.get_mut(ancestor).kind
            {
                if bounding_box.as_ref() == Some(&recomputed) {
                    boxes_done = true;
                }
                *bounding_box = Some(recomputed);
            }
        }
    }

    fn sibling_of(&self, parent: NodeId, child: NodeId) -> NodeId {
        match &self.arena.get(parent).kind {
            NodeKind::Internal { left, right, .. } => {
                if *left == child {
                    *right
                } else {
                    *left
                }
            }
            NodeKind::Leaf { .. } => NULL_NODE,
        }
    }

    fn replace_child_pointer(&mut self, parent: NodeId, old: NodeId, new: NodeId) {
        if let NodeKind::Internal { left, right, .. } = &mut self.arena.get_mut(parent).kind {
            if *left == old {
                *left = new;
            } else if *right == old {
                *right = new;
            } else {
                debug_assert!(false, "old child must be attached to parent");
            }
        }
        self.arena.get_mut(new).parent = parent;
    }

    fn subtree_point_sum(&self, store: &PointStore, id: NodeId) -> Vec<f64> {
        let node = self.arena.get(id);
        match &node.kind {
            NodeKind::Leaf { point, .. } => store
                .get_copy(*point)
                .expect("leaf handle is live while referenced by the tree")
                .iter()
                .map(|x| x * node.mass as f64)
                .collect(),
            NodeKind::Internal {
                point_sum: Some(sum),
                ..
            } => sum.clone(),
            NodeKind::Internal { left, right, .. } => {
                let mut sum = self.subtree_point_sum(store, *left);
                let right_sum = self.subtree_point_sum(store, *right);
                for (s, r) in sum.iter_mut().zip(right_sum.iter()) {
                    *s += r;
                }
                sum
            }
        }
    }

    /// Check the tree's structural invariants: mass additivity, cut-side
    /// partitioning, cached-box consistency, center-of-mass consistency,
    /// and sequence-multiset sizes. Intended for tests and debugging.
    pub fn verify_integrity(&self, store: &PointStore) -> bool {
        if self.root.is_null() {
            return true;
        }
        self.verify_node(store, self.root).is_some()
    }

    fn verify_node(
        &self,
        store: &PointStore,
        id: NodeId,
    ) -> Option<(u32, BoundingBox, Vec<f64>)> {
        let node = self.arena.get(id);
        match &node.kind {
            NodeKind::Leaf {
                point,
                sequence_indexes,
            } => {
                let p = store.get_copy(*point).ok()?;
                if let Some(seqs) = sequence_indexes {
                    if seqs.len() != node.mass as usize {
                        return None;
                    }
                }
                let sum = p.iter().map(|x| x * node.mass as f64).collect();
                Some((node.mass, BoundingBox::from_point(&p), sum))
            }
            NodeKind::Internal {
                cut,
                left,
                right,
                bounding_box,
                point_sum,
            } => {
                let (left_mass, left_box, left_sum) = self.verify_node(store, *left)?;
                let (right_mass, right_box, right_sum) = self.verify_node(store, *right)?;
                if node.mass != left_mass + right_mass {
                    return None;
                }
                if left_box.max_value(cut.dimension) > cut.value {
                    return None;
                }
                if right_box.min_value(cut.dimension) <= cut.value {
                    return None;
                }
                let merged = left_box.merged_with_box(&right_box).ok()?;
                if let Some(cached) = bounding_box {
                    if cached != &merged {
                        return None;
                    }
                }
                let mut sum = left_sum;
                for (s, r) in sum.iter_mut().zip(right_sum.iter()) {
                    *s += r;
                }
                if let Some(tracked) = point_sum {
                    let consistent = tracked.iter().zip(sum.iter()).all(|(a, b)| {
                        let scale = a.abs().max(b.abs()).max(1.0);
                        (a - b).abs() <= 1e-9 * scale
                    });
                    if !consistent {
                        return None;
                    }
                }
                Some((node.mass, merged, sum))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;

    fn tree_and_store(dimensions: usize, seed: u64) -> (RandomCutTree, PointStore) {
        let tree = RandomCutTree::with_seed(dimensions, TreeConfig::default(), seed);
        let store = PointStore::new(StoreConfig::new(dimensions, 64)).unwrap();
        (tree, store)
    }

    #[test]
    fn test_add_point_to_empty_tree() {
        let (mut tree, mut store) = tree_and_store(2, 1);
        let h = store.admit(&[111.0, -111.0], 1).unwrap();
        assert_eq!(tree.add_point(&store, h, 1).unwrap(), h);
        let root = tree.root_view(&store).unwrap();
        assert!(root.is_leaf());
        assert_eq!(root.leaf_point().unwrap(), vec![111.0, -111.0]);
        assert_eq!(tree.mass(), 1);
    }

    #[test]
    fn test_delete_last_point_empties_tree() {
        let (mut tree, mut store) = tree_and_store(2, 1);
        let h = store.admit(&[-0.1, 0.1], 1).unwrap();
        tree.add_point(&store, h, 1).unwrap();
        let removed = tree.delete_point(&store, &[-0.1, 0.1], 1).unwrap();
        assert_eq!(removed, h);
        assert!(tree.is_empty());
        assert!(tree.root_view(&store).is_none());
    }

    #[test]
    fn test_delete_child_of_root_promotes_sibling() {
        let (mut tree, mut store) = tree_and_store(2, 7);
        let h1 = store.admit(&[-0.1, 0.2], 1).unwrap();
        let h2 = store.admit(&[-0.3, 0.4], 2).unwrap();
        tree.add_point(&store, h1, 1).unwrap();
        tree.add_point(&store, h2, 2).unwrap();
        tree.delete_point(&store, &[-0.1, 0.2], 1).unwrap();
        let root = tree.root_view(&store).unwrap();
        assert!(root.is_leaf());
        assert_eq!(root.leaf_point().unwrap(), vec![-0.3, 0.4]);
    }

    #[test]
    fn test_delete_absent_point_leaves_tree_unchanged() {
        let (mut tree, mut store) = tree_and_store(2, 7);
        for (i, p) in [[0.0, 0.0], [1.0, 1.0], [2.0, 0.5]].iter().enumerate() {
            let h = store.admit(p, i as u64).unwrap();
            tree.add_point(&store, h, i as u64).unwrap();
        }
        let mass = tree.mass();
        assert!(matches!(
            tree.delete_point(&store, &[-5.0, -5.0], 0),
            Err(ForestError::PointNotFound)
        ));
        assert_eq!(tree.mass(), mass);
        assert!(tree.verify_integrity(&store));
    }

    #[test]
    fn test_traverse_empty_tree_errors() {
        let (tree, store) = tree_and_store(2, 7);
        let visitor = crate::visitor::AnomalyScoreVisitor::new(vec![0.0, 0.0], 0);
        assert!(matches!(
            tree.traverse(&store, &[0.0, 0.0], visitor),
            Err(ForestError::EmptyTree)
        ));
    }

    #[test]
    fn test_same_seed_same_structure() {
        let (mut tree1, mut store1) = tree_and_store(3, 1234567890);
        let (mut tree2, mut store2) = tree_and_store(3, 1234567890);
        let (mut tree3, mut store3) = tree_and_store(3, 2469135780);
        let points = [[0.1, 108.4, -42.2], [-0.1, 90.6, -30.7]];
        for (i, p) in points.iter().enumerate() {
            let seq = (i + 1) as u64;
            let h1 = store1.admit(p, seq).unwrap();
            tree1.add_point(&store1, h1, seq).unwrap();
            let h2 = store2.admit(p, seq).unwrap();
            tree2.add_point(&store2, h2, seq).unwrap();
            let h3 = store3.admit(p, seq).unwrap();
            tree3.add_point(&store3, h3, seq).unwrap();
        }
        let root1 = tree1.root_view(&store1).unwrap();
        let root2 = tree2.root_view(&store2).unwrap();
        let root3 = tree3.root_view(&store3).unwrap();
        assert_eq!(root1.cut_dimension(), root2.cut_dimension());
        assert_eq!(root1.cut_value(), root2.cut_value());
        assert_eq!(root1.bounding_box(), root2.bounding_box());
        let same_cut = root1.cut_dimension() == root3.cut_dimension()
            && root1.cut_value() == root3.cut_value();
        assert!(!same_cut);
    }

    #[test]
    fn test_cache_fraction_does_not_affect_structure() {
        for fraction in [0.0, 0.4, 1.0] {
            let config = TreeConfig {
                bounding_box_cache_fraction: fraction,
                ..TreeConfig::default()
            };
            let mut tree = RandomCutTree::with_seed(2, config, 77);
            let mut store = PointStore::new(StoreConfig::new(2, 64)).unwrap();
            for i in 0..32u64 {
                let p = [(i % 7) as f64, (i % 11) as f64 - 5.0];
                let h = store.admit(&p, i).unwrap();
                let used = tree.add_point(&store, h, i).unwrap();
                if used != h {
                    store.inc_ref(used).unwrap();
                    store.dec_ref(h).unwrap();
                }
                assert!(tree.verify_integrity(&store), "fraction {fraction}, step {i}");
            }
        }
    }
}
