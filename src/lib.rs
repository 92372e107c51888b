#![forbid(unsafe_code)]

//! # cut-forest
//!
//! Streaming anomaly detection and imputation on an ensemble of random cut
//! trees. Each tree maintains a random binary space partition over a
//! sliding reservoir of points; the ensemble is updated incrementally and
//! queried by pluggable visitors.
//!
//! The moving parts:
//! - [`store::PointStore`]: reference-counted arena of fixed-dimension
//!   points with internal shingling and compaction
//! - [`tree::RandomCutTree`]: incremental insert/delete with cached
//!   bounding boxes and visitor traversal
//! - [`forest::RandomCutForest`]: fans points out to sampler+tree
//!   components, sequentially or on an owned worker pool
//! - [`state`]: compact portable snapshots of point stores
//!
//! ## Example
//!
//! ```
//! use cut_forest::{ForestConfig, RandomCutForest};
//!
//! let mut forest = RandomCutForest::new(
//!     ForestConfig::new(2).num_trees(10).sample_size(64).seed(7),
//! ).unwrap();
//!
//! for i in 0..200u64 {
//!     let x = (i % 10) as f64 * 0.1;
//!     forest.update(&[x, 1.0 - x]).unwrap();
//! }
//!
//! let usual = forest.anomaly_score(&[0.5, 0.5]).unwrap();
//! let unusual = forest.anomaly_score(&[40.0, -40.0]).unwrap();
//! assert!(unusual > usual);
//! ```

pub mod config;
pub mod errors;
pub mod forest;
pub mod geometry;
pub mod rng;
pub mod sampler;
pub mod state;
pub mod store;
pub mod tree;
pub mod types;
pub mod visitor;

pub use config::{ForestConfig, StoreConfig, TreeConfig};
pub use errors::{ForestError, Result};
pub use forest::{
    ConvergingAccumulator, MeanConvergenceAccumulator, RandomCutForest, SamplerPlusTree,
    UpdateResult,
};
pub use geometry::{BoundingBox, Cut};
pub use rng::{ChaChaSource, CutSource, ScriptedSource};
pub use sampler::{ReservoirSampler, SamplerDecision, TimeDecayedSampler};
pub use state::{PointStoreMapper, PointStoreState};
pub use store::PointStore;
pub use tree::{NodeView, RandomCutTree};
pub use types::{PointHandle, SequenceIndex};
pub use visitor::{AnomalyScoreVisitor, ImputeVisitor, MultiVisitor, Visitor};
