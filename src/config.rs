//! Configuration for forests, trees, and point stores.

use serde::{Deserialize, Serialize};

use crate::errors::{ForestError, Result};

/// Per-tree feature flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeConfig {
    /// Maintain a mass-weighted point sum at every internal node.
    pub center_of_mass_enabled: bool,
    /// Record the multiset of sequence indexes at every leaf.
    pub store_sequence_indexes_enabled: bool,
    /// Fraction of internal nodes allowed to cache their bounding box,
    /// in `[0, 1]`. Uncached boxes are recomputed on demand.
    pub bounding_box_cache_fraction: f64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            center_of_mass_enabled: false,
            store_sequence_indexes_enabled: false,
            bounding_box_cache_fraction: 1.0,
        }
    }
}

/// Point-store layout and feature flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Dimensionality of every stored point.
    pub dimensions: usize,
    /// Maximum number of live points.
    pub capacity: usize,
    /// Shingle size; must divide `dimensions`. 1 means no shingling.
    pub shingle_size: usize,
    /// Reuse overlapping coordinates of consecutive shingles.
    pub internal_shingling_enabled: bool,
    /// Treat the shingle window cyclically (requires internal shingling).
    pub rotation_enabled: bool,
    /// Start small and grow backing arrays on demand up to `capacity`.
    pub dynamic_resizing_enabled: bool,
    /// Map handle `h` directly to offset `h * dimensions`, skipping the
    /// location indirection. Incompatible with internal shingling.
    pub direct_location_map: bool,
}

impl StoreConfig {
    /// Plain store for `capacity` points of `dimensions` coordinates.
    pub fn new(dimensions: usize, capacity: usize) -> Self {
        Self {
            dimensions,
            capacity,
            shingle_size: 1,
            internal_shingling_enabled: false,
            rotation_enabled: false,
            dynamic_resizing_enabled: true,
            direct_location_map: false,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.dimensions == 0 || self.capacity == 0 {
            return Err(ForestError::CacheState(
                "dimensions and capacity must be positive".into(),
            ));
        }
        if self.shingle_size == 0 || self.dimensions % self.shingle_size != 0 {
            return Err(ForestError::CacheState(format!(
                "shingle size {} must divide dimensions {}",
                self.shingle_size, self.dimensions
            )));
        }
        if self.rotation_enabled && !self.internal_shingling_enabled {
            return Err(ForestError::CacheState(
                "rotation requires internal shingling".into(),
            ));
        }
        if self.direct_location_map && self.internal_shingling_enabled {
            return Err(ForestError::CacheState(
                "direct location map is incompatible with internal shingling".into(),
            ));
        }
        Ok(())
    }
}

/// Forest-level configuration with chainable setters.
///
/// Defaults follow the usual ensemble parameters: 50 trees of 256 samples
/// with no time decay, executing sequentially.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestConfig {
    /// Dimensionality of input points.
    pub dimensions: usize,
    /// Number of tree/sampler components.
    pub num_trees: usize,
    /// Reservoir size per component.
    pub sample_size: usize,
    /// Decay rate of the weighted reservoir; 0 means a uniform reservoir.
    pub time_decay: f64,
    /// Run component updates and traversals on a worker pool.
    pub parallel_execution_enabled: bool,
    /// Worker pool size; 0 lets the pool pick one thread per core.
    pub thread_pool_size: usize,
    /// Seed from which all per-component RNGs are derived.
    pub seed: u64,
    /// Per-tree flags.
    pub tree: TreeConfig,
    /// Shingle size forwarded to the per-component point stores.
    pub shingle_size: usize,
    /// Enable internal shingling in the point stores.
    pub internal_shingling_enabled: bool,
}

impl ForestConfig {
    /// Configuration for `dimensions`-dimensional input with defaults.
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            num_trees: 50,
            sample_size: 256,
            time_decay: 0.0,
            parallel_execution_enabled: false,
            thread_pool_size: 0,
            seed: 42,
            tree: TreeConfig::default(),
            shingle_size: 1,
            internal_shingling_enabled: false,
        }
    }

    /// Set the number of trees.
    pub fn num_trees(mut self, num_trees: usize) -> Self {
        self.num_trees = num_trees;
        self
    }

    /// Set the per-component reservoir size.
    pub fn sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size;
        self
    }

    /// Set the reservoir decay rate.
    pub fn time_decay(mut self, time_decay: f64) -> Self {
        self.time_decay = time_decay;
        self
    }

    /// Enable the parallel executor with the given pool size (0 = auto).
    pub fn parallel(mut self, threads: usize) -> Self {
        self.parallel_execution_enabled = true;
        self.thread_pool_size = threads;
        self
    }

    /// Set the master seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Replace the tree flags.
    pub fn tree_config(mut self, tree: TreeConfig) -> Self {
        self.tree = tree;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.num_trees == 0 || self.sample_size == 0 {
            return Err(ForestError::CacheState(
                "num_trees and sample_size must be positive".into(),
            ));
        }
        self.store_config().validate()
    }

    pub(crate) fn store_config(&self) -> StoreConfig {
        StoreConfig {
            dimensions: self.dimensions,
            capacity: self.sample_size,
            shingle_size: self.shingle_size,
            internal_shingling_enabled: self.internal_shingling_enabled,
            rotation_enabled: false,
            dynamic_resizing_enabled: true,
            direct_location_map: false,
        }
    }
}
