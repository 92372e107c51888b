//! One forest component: a sampler, a tree, and the point store backing it.

use std::collections::HashMap;

use crate::errors::{ForestError, Result};
use crate::sampler::{ReservoirSampler, SamplerDecision};
use crate::store::PointStore;
use crate::tree::RandomCutTree;
use crate::types::{PointHandle, SequenceIndex};
use crate::visitor::{MultiVisitor, Visitor};

/// What one component did with an offered point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateResult {
    /// Whether the component's state changed at all.
    pub state_changed: bool,
    /// Handle and sequence index of the point that entered the tree.
    pub accepted: Option<(PointHandle, SequenceIndex)>,
    /// Handle and sequence index of the point that left the tree.
    pub evicted: Option<(PointHandle, SequenceIndex)>,
}

impl UpdateResult {
    pub(crate) fn unchanged() -> Self {
        Self {
            state_changed: false,
            accepted: None,
            evicted: None,
        }
    }
}

/// Pairs one sampler with one tree and the store holding the tree's points.
///
/// All operations on a component are serialized by the executor, so the
/// tree and its slice of the store are single-writer, single-reader.
pub struct SamplerPlusTree {
    sampler: Box<dyn ReservoirSampler>,
    tree: RandomCutTree,
    store: PointStore,
    by_sequence: HashMap<SequenceIndex, PointHandle>,
}

impl std::fmt::Debug for SamplerPlusTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SamplerPlusTree")
            .field("mass", &self.tree.mass())
            .field("reservoir", &self.sampler.size())
            .finish()
    }
}

impl SamplerPlusTree {
    /// Assemble a component.
    pub fn new(
        sampler: Box<dyn ReservoirSampler>,
        tree: RandomCutTree,
        store: PointStore,
    ) -> Self {
        Self {
            sampler,
            tree,
            store,
            by_sequence: HashMap::new(),
        }
    }

    /// The component's tree.
    pub fn tree(&self) -> &RandomCutTree {
        &self.tree
    }

    /// The component's point store.
    pub fn store(&self) -> &PointStore {
        &self.store
    }

    /// Mutable access to the store, for compaction and serialization.
    /// Only call between external updates.
    pub fn store_mut(&mut self) -> &mut PointStore {
        &mut self.store
    }

    /// Offer a point at a sequence index; the sampler decides its fate.
    ///
    /// On eviction the old point is deleted from the tree and its store
    /// reference dropped before the new point is admitted and inserted.
    pub fn update(
        &mut self,
        point: &[f64],
        sequence_index: SequenceIndex,
    ) -> Result<UpdateResult> {
        match self.sampler.decide(sequence_index) {
            SamplerDecision::Reject => Ok(UpdateResult::unchanged()),
            SamplerDecision::Accept => {
                let accepted = self.insert(point, sequence_index)?;
                Ok(UpdateResult {
                    state_changed: true,
                    accepted: Some(accepted),
                    evicted: None,
                })
            }
            SamplerDecision::AcceptEvict { evicted_sequence } => {
                let evicted = self.evict(evicted_sequence)?;
                let accepted = self.insert(point, sequence_index)?;
                Ok(UpdateResult {
                    state_changed: true,
                    accepted: Some(accepted),
                    evicted: Some(evicted),
                })
            }
        }
    }

    fn insert(
        &mut self,
        point: &[f64],
        sequence_index: SequenceIndex,
    ) -> Result<(PointHandle, SequenceIndex)> {
        let admitted = self.store.admit(point, sequence_index)?;
        let used = match self.tree.add_point(&self.store, admitted, sequence_index) {
            Ok(used) => used,
            Err(error) => {
                let _ = self.store.dec_ref(admitted);
                return Err(error);
            }
        };
        if used != admitted {
            // the tree absorbed the point into an existing leaf: move the
            // reference we hold from the fresh handle to the retained one
            self.store.inc_ref(used)?;
            self.store.dec_ref(admitted)?;
        }
        self.by_sequence.insert(sequence_index, used);
        Ok((used, sequence_index))
    }

    fn evict(&mut self, evicted_sequence: SequenceIndex) -> Result<(PointHandle, SequenceIndex)> {
        let handle = self.by_sequence.remove(&evicted_sequence).ok_or_else(|| {
            ForestError::CacheState(format!(
                "sampler evicted sequence {evicted_sequence} with no stored handle"
            ))
        })?;
        let point = self.store.get_copy(handle)?;
        let removed = self.tree.delete_point(&self.store, &point, evicted_sequence)?;
        self.store.dec_ref(removed)?;
        Ok((removed, evicted_sequence))
    }

    /// Build a visitor for this component's tree and run it to completion.
    pub fn traverse<V, F>(&self, point: &[f64], visitor_factory: &F) -> Result<V::Output>
    where
        V: Visitor,
        F: Fn(&RandomCutTree) -> V,
    {
        self.tree
            .traverse(&self.store, point, visitor_factory(&self.tree))
    }

    /// Multi-visitor counterpart of [`SamplerPlusTree::traverse`].
    pub fn traverse_multi<V, F>(&self, point: &[f64], visitor_factory: &F) -> Result<V::Output>
    where
        V: MultiVisitor,
        F: Fn(&RandomCutTree) -> V,
    {
        self.tree
            .traverse_multi(&self.store, point, visitor_factory(&self.tree))
    }
}
