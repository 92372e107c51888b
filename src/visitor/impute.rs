//! Imputation of missing coordinates via forked traversal.
//!
//! The query carries NaN in its missing coordinates. The visitor forks on
//! every cut in a missing dimension, so both subtrees propose candidates;
//! at each leaf the missing coordinates are filled from the leaf point and
//! the candidate is ranked with the anomaly-score recurrence restricted to
//! the known coordinates. The least anomalous candidate survives `combine`.

use ordered_float::OrderedFloat;

use crate::tree::NodeView;
use crate::visitor::{MultiVisitor, Visitor};

/// Multi-visitor producing an imputed copy of a partially observed point.
#[derive(Debug, Clone)]
pub struct ImputeVisitor {
    query: Vec<f64>,
    missing: Vec<bool>,
    tree_mass: usize,
    imputed: Vec<f64>,
    rank: f64,
    /// Probability that no node visited so far separates the known
    /// coordinates of the query.
    remaining_weight: f64,
}

impl ImputeVisitor {
    /// Impute the coordinates of `query` listed in `missing_indexes`.
    /// NaN entries of `query` at those positions are placeholders.
    pub fn new(query: Vec<f64>, missing_indexes: &[usize], tree_mass: usize) -> Self {
        let mut missing = vec![false; query.len()];
        for &index in missing_indexes {
            if index < missing.len() {
                missing[index] = true;
            }
        }
        let imputed = query.clone();
        Self {
            query,
            missing,
            tree_mass,
            imputed,
            rank: 0.0,
            remaining_weight: 1.0,
        }
    }

    fn score_seen(depth: usize, mass: usize) -> f64 {
        1.0 / (depth as f64 + (mass as f64 + 1.0).log2())
    }

    fn score_unseen(depth: usize) -> f64 {
        1.0 / (depth as f64 + 1.0)
    }

    fn damp(leaf_mass: usize, tree_mass: usize) -> f64 {
        1.0 - leaf_mass as f64 / (2.0 * tree_mass as f64)
    }
}

impl Visitor for ImputeVisitor {
    type Output = Vec<f64>;

    fn accept(&mut self, node: &NodeView<'_>, depth: usize) {
        if self.remaining_weight <= 0.0 {
            return;
        }
        let p = node.probability_of_separation_with_missing(&self.query, &self.missing);
        if p > 0.0 {
            self.rank += self.remaining_weight * p * Self::score_unseen(depth);
            self.remaining_weight *= 1.0 - p;
        }
    }

    fn accept_leaf(&mut self, leaf: &NodeView<'_>, depth: usize) {
        let Some(leaf_point) = leaf.leaf_point() else {
            return;
        };
        self.imputed = self.query.clone();
        for (i, value) in self.imputed.iter_mut().enumerate() {
            if self.missing[i] {
                *value = leaf_point[i];
            }
        }
        let term = if self.imputed == leaf_point {
            if depth == 0 {
                0.0
            } else {
                Self::damp(leaf.mass(), self.tree_mass) * Self::score_seen(depth, leaf.mass())
            }
        } else {
            Self::score_unseen(depth)
        };
        self.rank += self.remaining_weight * term;
        self.remaining_weight = 0.0;
    }

    fn result(&self) -> Vec<f64> {
        self.imputed.clone()
    }
}

impl MultiVisitor for ImputeVisitor {
    fn trigger(&self, node: &NodeView<'_>) -> bool {
        node.cut_dimension()
            .map(|dim| self.missing[dim])
            .unwrap_or(false)
    }

    fn new_copy(&self) -> Self {
        self.clone()
    }

    fn combine(&mut self, other: Self) {
        if OrderedFloat(other.rank) < OrderedFloat(self.rank) {
            *self = other;
        }
    }
}
