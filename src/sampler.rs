//! Reservoir sampling oracle.
//!
//! A sampler only decides, per sequence index, whether the point enters the
//! reservoir and which prior sequence index leaves to make room. Mapping
//! sequence indexes back to stored points is the component's job, so any
//! policy implementing [`ReservoirSampler`] plugs in.

use std::collections::BinaryHeap;

use ordered_float::OrderedFloat;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::types::SequenceIndex;

/// Outcome of offering one sequence index to a sampler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplerDecision {
    /// The point is not sampled; nothing changes.
    Reject,
    /// The point joins the reservoir.
    Accept,
    /// The point joins the reservoir and the point admitted at
    /// `evicted_sequence` leaves it.
    AcceptEvict {
        /// Sequence index of the evicted point.
        evicted_sequence: SequenceIndex,
    },
}

/// Accept/evict oracle keyed by sequence index.
///
/// `Send + Sync` so components can be fanned out to a worker pool; a
/// sampler is only ever driven through `&mut`.
pub trait ReservoirSampler: Send + Sync {
    /// Decide the fate of the point arriving at `sequence_index`.
    fn decide(&mut self, sequence_index: SequenceIndex) -> SamplerDecision;

    /// Maximum reservoir size.
    fn capacity(&self) -> usize;

    /// Current reservoir size.
    fn size(&self) -> usize;
}

/// Time-decayed weighted reservoir.
///
/// Each arrival draws `u` and weighs in at `ln(-ln u) - lambda * seq`; the
/// reservoir keeps the `capacity` smallest weights, evicting the current
/// maximum. Larger `lambda` biases the sample toward recent points; zero
/// decay yields a uniform reservoir.
#[derive(Debug)]
pub struct TimeDecayedSampler {
    capacity: usize,
    time_decay: f64,
    // max-heap: the worst (largest) weight is always on top
    heap: BinaryHeap<(OrderedFloat<f64>, SequenceIndex)>,
    rng: ChaCha8Rng,
}

impl TimeDecayedSampler {
    /// Build a sampler holding at most `capacity` points.
    pub fn new(capacity: usize, time_decay: f64, seed: u64) -> Self {
        Self {
            capacity,
            time_decay,
            heap: BinaryHeap::with_capacity(capacity + 1),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    fn weight(&mut self, sequence_index: SequenceIndex) -> f64 {
        let u: f64 = self.rng.gen();
        (-u.ln()).ln() - self.time_decay * sequence_index as f64
    }
}

impl ReservoirSampler for TimeDecayedSampler {
    fn decide(&mut self, sequence_index: SequenceIndex) -> SamplerDecision {
        let weight = OrderedFloat(self.weight(sequence_index));
        if self.heap.len() < self.capacity {
            self.heap.push((weight, sequence_index));
            return SamplerDecision::Accept;
        }
        match self.heap.peek() {
            Some(&(worst, _)) if weight < worst => {
                let (_, evicted_sequence) = self.heap.pop().expect("peeked entry exists");
                self.heap.push((weight, sequence_index));
                SamplerDecision::AcceptEvict { evicted_sequence }
            }
            _ => SamplerDecision::Reject,
        }
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn size(&self) -> usize {
        self.heap.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fills_to_capacity_before_evicting() {
        let mut sampler = TimeDecayedSampler::new(4, 0.0, 1);
        for seq in 0..4 {
            assert_eq!(sampler.decide(seq), SamplerDecision::Accept);
        }
        assert_eq!(sampler.size(), 4);
        for seq in 4..200 {
            match sampler.decide(seq) {
                SamplerDecision::Accept => panic!("full reservoir must evict to accept"),
                SamplerDecision::AcceptEvict { .. } | SamplerDecision::Reject => {}
            }
            assert_eq!(sampler.size(), 4);
        }
    }

    #[test]
    fn test_eviction_reports_previously_accepted_sequence() {
        let mut sampler = TimeDecayedSampler::new(8, 0.0, 7);
        let mut resident: Vec<SequenceIndex> = Vec::new();
        for seq in 0..500 {
            match sampler.decide(seq) {
                SamplerDecision::Accept => resident.push(seq),
                SamplerDecision::AcceptEvict { evicted_sequence } => {
                    let position = resident
                        .iter()
                        .position(|&s| s == evicted_sequence)
                        .expect("evicted sequence must be resident");
                    resident.swap_remove(position);
                    resident.push(seq);
                }
                SamplerDecision::Reject => {}
            }
            assert!(resident.len() <= 8);
        }
        assert_eq!(resident.len(), 8);
    }

    #[test]
    fn test_uniform_reservoir_rejects_sometimes() {
        let mut sampler = TimeDecayedSampler::new(4, 0.0, 11);
        let mut rejections = 0;
        for seq in 0..1000 {
            if sampler.decide(seq) == SamplerDecision::Reject {
                rejections += 1;
            }
        }
        // a uniform reservoir of 4 accepts roughly 4 * ln(250) of 1000
        assert!(rejections > 900);
    }

    #[test]
    fn test_strong_decay_prefers_recent_points() {
        let mut sampler = TimeDecayedSampler::new(4, 8.0, 3);
        let mut accepted_recent = 0;
        for seq in 0..100 {
            match sampler.decide(seq) {
                SamplerDecision::Accept | SamplerDecision::AcceptEvict { .. } => {
                    if seq >= 90 {
                        accepted_recent += 1;
                    }
                }
                SamplerDecision::Reject => {}
            }
        }
        // strong decay makes late arrivals nearly always accepted
        assert!(accepted_recent >= 9);
    }
}
