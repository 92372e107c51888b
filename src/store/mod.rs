//! Reference-counted point arena shared by the trees of one component.

mod point_store;

pub use point_store::{PointStore, INFEASIBLE_LOCATION};
