//! Axis-aligned bounding boxes and random cuts.
//!
//! A cut `(dimension, value)` partitions space with a tie-to-left rule:
//! a point is on the left iff `point[dimension] <= value`. Random cuts are
//! drawn with probability proportional to each dimension's side length, and
//! always land in the half-open interval `[min, max)` of the chosen
//! dimension so both sides of a split are non-empty.

use crate::errors::{ForestError, Result};

/// Axis-aligned box over a finite set of points: elementwise `min`/`max`
/// with the total side-length sum kept up to date.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBox {
    min: Vec<f64>,
    max: Vec<f64>,
    range_sum: f64,
}

impl BoundingBox {
    /// Degenerate box around a single point (`min == max`).
    pub fn from_point(point: &[f64]) -> Self {
        Self {
            min: point.to_vec(),
            max: point.to_vec(),
            range_sum: 0.0,
        }
    }

    /// Box spanning two corner points.
    pub fn from_corners(a: &[f64], b: &[f64]) -> Result<Self> {
        let mut bbox = Self::from_point(a);
        bbox.merge_point(b)?;
        Ok(bbox)
    }

    /// Number of dimensions.
    pub fn dimensions(&self) -> usize {
        self.min.len()
    }

    /// Lower corner.
    pub fn min_values(&self) -> &[f64] {
        &self.min
    }

    /// Upper corner.
    pub fn max_values(&self) -> &[f64] {
        &self.max
    }

    /// Lower bound in one dimension.
    pub fn min_value(&self, dimension: usize) -> f64 {
        self.min[dimension]
    }

    /// Upper bound in one dimension.
    pub fn max_value(&self, dimension: usize) -> f64 {
        self.max[dimension]
    }

    /// Side length in one dimension.
    pub fn range(&self, dimension: usize) -> f64 {
        self.max[dimension] - self.min[dimension]
    }

    /// Sum of side lengths over all dimensions; zero iff the box is a point.
    pub fn range_sum(&self) -> f64 {
        self.range_sum
    }

    fn check_dimensions(&self, other_len: usize) -> Result<()> {
        if other_len != self.min.len() {
            return Err(ForestError::InvalidDimension {
                expected: self.min.len(),
                actual: other_len,
            });
        }
        Ok(())
    }

    /// Grow this box in place to enclose `point`. Returns `true` when the
    /// box actually changed.
    pub fn merge_point(&mut self, point: &[f64]) -> Result<bool> {
        self.check_dimensions(point.len())?;
        let mut changed = false;
        for i in 0..self.min.len() {
            if point[i] < self.min[i] {
                self.min[i] = point[i];
                changed = true;
            }
            if point[i] > self.max[i] {
                self.max[i] = point[i];
                changed = true;
            }
        }
        if changed {
            self.recompute_range_sum();
        }
        Ok(changed)
    }

    /// Grow this box in place to enclose `other`.
    pub fn merge_box(&mut self, other: &BoundingBox) -> Result<bool> {
        self.check_dimensions(other.min.len())?;
        let mut changed = false;
        for i in 0..self.min.len() {
            if other.min[i] < self.min[i] {
                self.min[i] = other.min[i];
                changed = true;
            }
            if other.max[i] > self.max[i] {
                self.max[i] = other.max[i];
                changed = true;
            }
        }
        if changed {
            self.recompute_range_sum();
        }
        Ok(changed)
    }

    /// Smallest box enclosing this one and `point`.
    pub fn merged_with_point(&self, point: &[f64]) -> Result<BoundingBox> {
        let mut merged = self.clone();
        merged.merge_point(point)?;
        Ok(merged)
    }

    /// Smallest box enclosing this one and `other`.
    pub fn merged_with_box(&self, other: &BoundingBox) -> Result<BoundingBox> {
        let mut merged = self.clone();
        merged.merge_box(other)?;
        Ok(merged)
    }

    /// Whether `point` lies inside the box (inclusive on both sides).
    pub fn contains(&self, point: &[f64]) -> bool {
        point.len() == self.min.len()
            && point
                .iter()
                .enumerate()
                .all(|(i, &x)| self.min[i] <= x && x <= self.max[i])
    }

    /// Whether `other` lies entirely inside this box.
    pub fn contains_box(&self, other: &BoundingBox) -> bool {
        other.min.len() == self.min.len()
            && (0..self.min.len())
                .all(|i| self.min[i] <= other.min[i] && other.max[i] <= self.max[i])
    }

    /// Probability that a random cut on the box merged with `point`
    /// separates `point` from the box. Zero when the point is inside.
    pub fn probability_of_separation(&self, point: &[f64]) -> f64 {
        let mut outside = 0.0;
        for i in 0..self.min.len() {
            outside += (self.min[i] - point[i]).max(0.0) + (point[i] - self.max[i]).max(0.0);
        }
        if outside <= 0.0 {
            0.0
        } else {
            outside / (outside + self.range_sum)
        }
    }

    /// Separation probability restricted to coordinates not flagged missing.
    pub fn probability_of_separation_with_missing(
        &self,
        point: &[f64],
        missing: &[bool],
    ) -> f64 {
        let mut outside = 0.0;
        let mut inside_range = 0.0;
        for i in 0..self.min.len() {
            if missing.get(i).copied().unwrap_or(false) {
                continue;
            }
            outside += (self.min[i] - point[i]).max(0.0) + (point[i] - self.max[i]).max(0.0);
            inside_range += self.max[i] - self.min[i];
        }
        if outside <= 0.0 {
            0.0
        } else {
            outside / (outside + inside_range)
        }
    }

    fn recompute_range_sum(&mut self) {
        self.range_sum = self
            .min
            .iter()
            .zip(self.max.iter())
            .map(|(lo, hi)| hi - lo)
            .sum();
    }
}

/// A split on a bounding box: `point[dimension] <= value` goes left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cut {
    /// Dimension the cut applies to.
    pub dimension: usize,
    /// Threshold value; ties go left.
    pub value: f64,
}

impl Cut {
    /// Construct a cut.
    pub fn new(dimension: usize, value: f64) -> Self {
        Self { dimension, value }
    }

    /// Tie-to-left side test.
    pub fn is_left_of(&self, point: &[f64]) -> bool {
        point[self.dimension] <= self.value
    }
}

/// Next representable f64 below `x`.
fn next_below(x: f64) -> f64 {
    if x == 0.0 {
        return -f64::from_bits(1);
    }
    let bits = x.to_bits();
    if x > 0.0 {
        f64::from_bits(bits - 1)
    } else {
        f64::from_bits(bits + 1)
    }
}

/// Draw a random cut on `bbox` using a uniform `factor` in `[0, 1)`.
///
/// The factor scales to a breakpoint along the concatenated side lengths;
/// the dimension whose span contains the breakpoint is cut at
/// `min + remainder`. Cuts never land on the max of a non-degenerate
/// dimension. Returns `None` for a degenerate box (no cut possible).
pub fn random_cut(factor: f64, bbox: &BoundingBox) -> Option<Cut> {
    let total = bbox.range_sum();
    if total <= 0.0 {
        return None;
    }
    let mut breakpoint = factor * total;
    for dimension in 0..bbox.dimensions() {
        let gap = bbox.range(dimension);
        if gap > 0.0 && breakpoint <= gap {
            let mut value = bbox.min_value(dimension) + breakpoint;
            if value >= bbox.max_value(dimension) {
                value = next_below(bbox.max_value(dimension));
            }
            return Some(Cut::new(dimension, value));
        }
        breakpoint -= gap;
    }
    None
}
