//! Sequential and worker-pool execution over a forest's components.

use rayon::prelude::*;

use crate::errors::{ForestError, Result};
use crate::forest::component::{SamplerPlusTree, UpdateResult};
use crate::types::SequenceIndex;

/// How component work is scheduled. The pool, when present, is owned here
/// and torn down with the forest.
pub(crate) enum ExecutionMode {
    Sequential,
    Parallel { pool: rayon::ThreadPool },
}

impl std::fmt::Debug for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionMode::Sequential => f.write_str("Sequential"),
            ExecutionMode::Parallel { pool } => f
                .debug_struct("Parallel")
                .field("threads", &pool.current_num_threads())
                .finish(),
        }
    }
}

impl ExecutionMode {
    pub(crate) fn sequential() -> Self {
        ExecutionMode::Sequential
    }

    pub(crate) fn parallel(threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|e| ForestError::CacheState(format!("worker pool construction: {e}")))?;
        Ok(ExecutionMode::Parallel { pool })
    }

    /// Submit one `(point, sequence_index)` update to every component.
    /// Per-component effects are unordered across the pool; each component
    /// itself is single-writer.
    pub(crate) fn update_all(
        &self,
        components: &mut [SamplerPlusTree],
        point: &[f64],
        sequence_index: SequenceIndex,
    ) -> Result<Vec<UpdateResult>> {
        match self {
            ExecutionMode::Sequential => components
                .iter_mut()
                .map(|c| c.update(point, sequence_index))
                .collect(),
            ExecutionMode::Parallel { pool } => pool.install(|| {
                components
                    .par_iter_mut()
                    .map(|c| c.update(point, sequence_index))
                    .collect()
            }),
        }
    }

    /// Run a read-only operation over every component, preserving component
    /// order in the result.
    pub(crate) fn map_components<R, F>(
        &self,
        components: &[SamplerPlusTree],
        op: F,
    ) -> Result<Vec<R>>
    where
        R: Send,
        F: Fn(&SamplerPlusTree) -> Result<R> + Sync + Send,
    {
        match self {
            ExecutionMode::Sequential => components.iter().map(op).collect(),
            ExecutionMode::Parallel { pool } => {
                pool.install(|| components.par_iter().map(op).collect())
            }
        }
    }

    pub(crate) fn is_parallel(&self) -> bool {
        matches!(self, ExecutionMode::Parallel { .. })
    }
}
