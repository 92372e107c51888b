//! Compact, portable point-store state for persistence and restart.

pub mod packing;

mod point_store_state;

pub use point_store_state::{PointStoreMapper, PointStoreState, PRECISION_FLOAT_64};
