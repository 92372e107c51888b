//! Core identifier types shared across the engine.

use crate::errors::{ForestError, Result};

/// Sequence index assigned to every point admitted to the forest. Strictly
/// monotonic across external updates.
pub type SequenceIndex = u64;

/// Opaque handle to a point held in a [`crate::store::PointStore`].
///
/// Handles are stable across compactions: compaction moves backing bytes and
/// remaps offsets, but the handle value itself never changes while the point
/// is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PointHandle(pub(crate) u32);

impl PointHandle {
    /// The handle's raw index.
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Handle for a raw index. Intended for hosts resolving handles against
    /// a restored [`crate::state::PointStoreState`]; the index is not
    /// checked here, so using a stale one surfaces as a store error later.
    pub fn from_index(index: usize) -> Self {
        PointHandle(index as u32)
    }
}

/// Copy a point, coercing `-0.0` to `+0.0` and rejecting NaN coordinates.
///
/// All points entering the engine pass through this so that bitwise
/// comparisons between stored and queried points are well defined.
pub(crate) fn clean_copy(point: &[f64], dimensions: usize) -> Result<Vec<f64>> {
    if point.len() != dimensions {
        return Err(ForestError::InvalidDimension {
            expected: dimensions,
            actual: point.len(),
        });
    }
    let mut copy = Vec::with_capacity(point.len());
    for (index, &value) in point.iter().enumerate() {
        if value.is_nan() {
            return Err(ForestError::InvalidPoint { index });
        }
        copy.push(if value == 0.0 { 0.0 } else { value });
    }
    Ok(copy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_copy_normalizes_negative_zero() {
        let copy = clean_copy(&[-0.0, 1.5], 2).unwrap();
        assert_eq!(copy[0].to_bits(), 0.0f64.to_bits());
        assert_eq!(copy[1], 1.5);
    }

    #[test]
    fn test_clean_copy_rejects_nan() {
        let err = clean_copy(&[0.0, f64::NAN], 2).unwrap_err();
        assert!(matches!(err, ForestError::InvalidPoint { index: 1 }));
    }

    #[test]
    fn test_clean_copy_rejects_wrong_dimension() {
        let err = clean_copy(&[0.0], 2).unwrap_err();
        assert!(matches!(
            err,
            ForestError::InvalidDimension {
                expected: 2,
                actual: 1
            }
        ));
    }
}
