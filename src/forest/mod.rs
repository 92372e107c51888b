//! The forest: a list of sampler-plus-tree components behind one facade,
//! executed sequentially or on an owned worker pool.

mod accumulator;
mod component;
mod executor;

pub use accumulator::{ConvergingAccumulator, MeanConvergenceAccumulator};
pub use component::{SamplerPlusTree, UpdateResult};

use executor::ExecutionMode;
use tracing::info;

use crate::config::ForestConfig;
use crate::errors::{ForestError, Result};
use crate::sampler::TimeDecayedSampler;
use crate::store::PointStore;
use crate::tree::RandomCutTree;
use crate::types::clean_copy;
use crate::visitor::{AnomalyScoreVisitor, ImputeVisitor, MultiVisitor, Visitor};

/// Splitmix64 step; keeps per-component RNG streams well separated.
fn derive_seed(seed: u64, stream: u64) -> u64 {
    let mut z = seed.wrapping_add(stream.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// An ensemble of random cut trees over a data stream.
///
/// `update` fans a cleaned copy of each point to every component; queries
/// build one visitor per tree and fold the per-tree results. For a fixed
/// seed the sequential executor is deterministic, and the parallel executor
/// produces the same per-component state (components share no mutable
/// state), so parallel results differ at most in accumulation order —
/// accumulators used with the parallel executor must be commutative.
#[derive(Debug)]
pub struct RandomCutForest {
    config: ForestConfig,
    components: Vec<SamplerPlusTree>,
    mode: ExecutionMode,
    total_updates: u64,
}

impl RandomCutForest {
    /// Build a forest from its configuration.
    pub fn new(config: ForestConfig) -> Result<Self> {
        config.validate()?;
        let mode = if config.parallel_execution_enabled {
            ExecutionMode::parallel(config.thread_pool_size)?
        } else {
            ExecutionMode::sequential()
        };
        let mut components = Vec::with_capacity(config.num_trees);
        for i in 0..config.num_trees {
            let tree_seed = derive_seed(config.seed, 2 * i as u64);
            let sampler_seed = derive_seed(config.seed, 2 * i as u64 + 1);
            let tree =
                RandomCutTree::with_seed(config.dimensions, config.tree.clone(), tree_seed);
            let sampler = Box::new(TimeDecayedSampler::new(
                config.sample_size,
                config.time_decay,
                sampler_seed,
            ));
            let store = PointStore::new(config.store_config())?;
            components.push(SamplerPlusTree::new(sampler, tree, store));
        }
        info!(
            trees = config.num_trees,
            dimensions = config.dimensions,
            sample_size = config.sample_size,
            parallel = mode.is_parallel(),
            "built random cut forest"
        );
        Ok(Self {
            config,
            components,
            mode,
            total_updates: 0,
        })
    }

    /// The forest's configuration.
    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    /// Dimensionality of accepted points.
    pub fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    /// Number of completed external updates; doubles as the sequence index.
    pub fn total_updates(&self) -> u64 {
        self.total_updates
    }

    /// The forest's components, in order.
    pub fn components(&self) -> &[SamplerPlusTree] {
        &self.components
    }

    /// Mutable access to the components, for per-component state mapping.
    /// Only call between external updates.
    pub fn components_mut(&mut self) -> &mut [SamplerPlusTree] {
        &mut self.components
    }

    /// Offer one point to every component's sampler and tree.
    pub fn update(&mut self, point: &[f64]) -> Result<Vec<UpdateResult>> {
        let clean = clean_copy(point, self.config.dimensions)?;
        self.total_updates += 1;
        self.mode
            .update_all(&mut self.components, &clean, self.total_updates)
    }

    /// Compact every component's point store. Runs between external calls
    /// by construction, since it takes the forest exclusively.
    pub fn compact_stores(&mut self) {
        for component in self.components.iter_mut() {
            component.store_mut().compact();
        }
    }

    /// Traverse every tree, folding per-tree results left to right with
    /// `accumulator` and finishing with `finisher`.
    pub fn traverse<V, R, S, F, A, Fin>(
        &self,
        point: &[f64],
        visitor_factory: F,
        accumulator: A,
        finisher: Fin,
    ) -> Result<S>
    where
        V: Visitor<Output = R>,
        R: Send,
        F: Fn(&RandomCutTree) -> V + Sync,
        A: Fn(R, R) -> R,
        Fin: FnOnce(R) -> S,
    {
        let results = self
            .mode
            .map_components(&self.components, |c| c.traverse(point, &visitor_factory))?;
        let mut iter = results.into_iter();
        let first = iter.next().ok_or(ForestError::EmptyTree)?;
        Ok(finisher(iter.fold(first, &accumulator)))
    }

    /// Traverse every tree, reducing collector-style: a fresh container
    /// from `supplier`, per-tree results folded with `accumulate`,
    /// containers merged with `combine`, and `finisher` at the end.
    pub fn traverse_collect<V, R, T, S, F, Sup, Acc, Comb, Fin>(
        &self,
        point: &[f64],
        visitor_factory: F,
        supplier: Sup,
        accumulate: Acc,
        combine: Comb,
        finisher: Fin,
    ) -> Result<S>
    where
        V: Visitor<Output = R>,
        R: Send,
        F: Fn(&RandomCutTree) -> V + Sync,
        Sup: Fn() -> T,
        Acc: Fn(&mut T, R),
        Comb: Fn(T, T) -> T,
        Fin: FnOnce(T) -> S,
    {
        let results = self
            .mode
            .map_components(&self.components, |c| c.traverse(point, &visitor_factory))?;
        Ok(finisher(Self::collect(
            results, &supplier, &accumulate, &combine,
            self.mode.is_parallel(),
        )))
    }

    /// Traverse trees in component order, stopping as soon as the
    /// accumulator declares convergence. Sequential by contract, even on a
    /// parallel forest.
    pub fn traverse_converging<V, R, S, F, A, Fin>(
        &self,
        point: &[f64],
        visitor_factory: F,
        accumulator: &mut A,
        finisher: Fin,
    ) -> Result<S>
    where
        V: Visitor<Output = R>,
        F: Fn(&RandomCutTree) -> V,
        A: ConvergingAccumulator<R> + ?Sized,
        Fin: FnOnce(R, usize) -> S,
    {
        for component in &self.components {
            let result = component.traverse(point, &visitor_factory)?;
            accumulator.accept(result);
            if accumulator.is_converged() {
                break;
            }
        }
        Ok(finisher(accumulator.value(), accumulator.accepted()))
    }

    /// Multi-visitor counterpart of [`RandomCutForest::traverse`].
    pub fn traverse_multi<V, R, S, F, A, Fin>(
        &self,
        point: &[f64],
        visitor_factory: F,
        accumulator: A,
        finisher: Fin,
    ) -> Result<S>
    where
        V: MultiVisitor<Output = R>,
        R: Send,
        F: Fn(&RandomCutTree) -> V + Sync,
        A: Fn(R, R) -> R,
        Fin: FnOnce(R) -> S,
    {
        let results = self.mode.map_components(&self.components, |c| {
            c.traverse_multi(point, &visitor_factory)
        })?;
        let mut iter = results.into_iter();
        let first = iter.next().ok_or(ForestError::EmptyTree)?;
        Ok(finisher(iter.fold(first, &accumulator)))
    }

    /// Multi-visitor counterpart of [`RandomCutForest::traverse_collect`].
    pub fn traverse_multi_collect<V, R, T, S, F, Sup, Acc, Comb, Fin>(
        &self,
        point: &[f64],
        visitor_factory: F,
        supplier: Sup,
        accumulate: Acc,
        combine: Comb,
        finisher: Fin,
    ) -> Result<S>
    where
        V: MultiVisitor<Output = R>,
        R: Send,
        F: Fn(&RandomCutTree) -> V + Sync,
        Sup: Fn() -> T,
        Acc: Fn(&mut T, R),
        Comb: Fn(T, T) -> T,
        Fin: FnOnce(T) -> S,
    {
        let results = self.mode.map_components(&self.components, |c| {
            c.traverse_multi(point, &visitor_factory)
        })?;
        Ok(finisher(Self::collect(
            results, &supplier, &accumulate, &combine,
            self.mode.is_parallel(),
        )))
    }

    fn collect<R, T>(
        results: Vec<R>,
        supplier: &impl Fn() -> T,
        accumulate: &impl Fn(&mut T, R),
        combine: &impl Fn(T, T) -> T,
        split: bool,
    ) -> T {
        if split && results.len() > 1 {
            let mid = results.len() / 2;
            let mut iter = results.into_iter();
            let mut left = supplier();
            for _ in 0..mid {
                if let Some(r) = iter.next() {
                    accumulate(&mut left, r);
                }
            }
            let mut right = supplier();
            for r in iter {
                accumulate(&mut right, r);
            }
            combine(left, right)
        } else {
            let mut acc = supplier();
            for r in results {
                accumulate(&mut acc, r);
            }
            acc
        }
    }

    /// Mean anomaly score of `point` across all trees. Errors with
    /// [`ForestError::EmptyTree`] until the forest has absorbed a point.
    pub fn anomaly_score(&self, point: &[f64]) -> Result<f64> {
        let query = clean_copy(point, self.config.dimensions)?;
        let count = self.components.len() as f64;
        let factory =
            |tree: &RandomCutTree| AnomalyScoreVisitor::new(query.clone(), tree.mass());
        self.traverse(&query, factory, |a, b| a + b, |sum| sum / count)
    }

    /// Anomaly score with sequential early exit once the running estimate
    /// stabilizes; `tolerance` is relative to the mean score.
    pub fn approximate_anomaly_score(&self, point: &[f64], tolerance: f64) -> Result<f64> {
        let query = clean_copy(point, self.config.dimensions)?;
        let factory =
            |tree: &RandomCutTree| AnomalyScoreVisitor::new(query.clone(), tree.mass());
        let min_accepted = (self.components.len() / 4).max(1);
        let mut accumulator = MeanConvergenceAccumulator::new(min_accepted, tolerance);
        self.traverse_converging(&query, factory, &mut accumulator, |sum, accepted| {
            sum / accepted as f64
        })
    }

    /// Impute the coordinates of `point` listed in `missing_indexes`, which
    /// may hold NaN placeholders. Per missing coordinate the result is the
    /// median of the per-tree imputations.
    pub fn impute_missing(&self, point: &[f64], missing_indexes: &[usize]) -> Result<Vec<f64>> {
        if point.len() != self.config.dimensions {
            return Err(ForestError::InvalidDimension {
                expected: self.config.dimensions,
                actual: point.len(),
            });
        }
        for (index, value) in point.iter().enumerate() {
            if value.is_nan() && !missing_indexes.contains(&index) {
                return Err(ForestError::InvalidPoint { index });
            }
        }
        if missing_indexes.iter().any(|&i| i >= point.len()) {
            return Err(ForestError::InvalidDimension {
                expected: self.config.dimensions,
                actual: point.len(),
            });
        }
        let factory =
            |tree: &RandomCutTree| ImputeVisitor::new(point.to_vec(), missing_indexes, tree.mass());
        let imputations: Vec<Vec<f64>> = self.traverse_multi_collect(
            point,
            factory,
            Vec::new,
            |acc: &mut Vec<Vec<f64>>, r| acc.push(r),
            |mut a, mut b| {
                a.append(&mut b);
                a
            },
            |collected| collected,
        )?;
        let mut result = point.to_vec();
        for &index in missing_indexes {
            let mut column: Vec<f64> = imputations.iter().map(|p| p[index]).collect();
            column.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            let n = column.len();
            result[index] = if n % 2 == 1 {
                column[n / 2]
            } else {
                0.5 * (column[n / 2 - 1] + column[n / 2])
            };
        }
        Ok(result)
    }
}
