//! Arena of fixed-dimension `f64` vectors with reference counting,
//! internal shingling, and compaction.
//!
//! Handles are small integers; `location_list` maps a handle to its offset
//! in the packed backing array. A freed handle keeps its backing bytes until
//! the next [`PointStore::compact`], which slides live runs leftward while
//! preserving both handle values and the relative order of live offsets.
//!
//! With internal shingling enabled, consecutive shingles that share their
//! overlapping coordinates are stored once: admitting the next shingle
//! appends only the trailing stride. The vectors callers admit and read
//! back are plain oldest-first shingles in every mode; detection of
//! duplicates and overlaps never depends on the storage layout.
//!
//! With rotation enabled the shingle window is additionally treated
//! cyclically: a window starting a new storage run is placed at a location
//! congruent to `((seq + 1) % shingle_size) * stride` modulo `dimensions`,
//! and chained windows keep that lockstep as both the location and the
//! sequence index advance. A backing offset `x` therefore always holds the
//! observation occupying slot `x % dimensions` of the rotating window.
//! Compaction moves windows only by whole-window multiples so the
//! alignment survives reclamation.

use tracing::debug;

use crate::config::StoreConfig;
use crate::errors::{ForestError, Result};
use crate::types::{clean_copy, PointHandle, SequenceIndex};

/// Sentinel in `location_list` meaning "this handle is free".
pub const INFEASIBLE_LOCATION: u32 = u32::MAX;

enum Reuse {
    Duplicate(PointHandle),
    Overlap(PointHandle),
    None,
}

/// Reference-counted arena of `d`-dimensional points.
#[derive(Debug)]
pub struct PointStore {
    dimensions: usize,
    shingle_size: usize,
    capacity: usize,
    index_capacity: usize,
    store: Vec<f64>,
    ref_count: Vec<u32>,
    location_list: Vec<u32>,
    free_handles: Vec<u32>,
    start_of_free_segment: usize,
    internal_shingling_enabled: bool,
    rotation_enabled: bool,
    dynamic_resizing_enabled: bool,
    direct_location_map: bool,
    known_shingle: Vec<f64>,
    next_sequence_index: SequenceIndex,
    last_handle: Option<PointHandle>,
}

impl PointStore {
    /// Build an empty store from its configuration.
    pub fn new(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let d = config.dimensions;
        let index_capacity = if config.dynamic_resizing_enabled {
            config.capacity.min(4)
        } else {
            config.capacity
        };
        let store_points = if config.dynamic_resizing_enabled {
            index_capacity
        } else {
            config.capacity
        };
        Ok(Self {
            dimensions: d,
            shingle_size: config.shingle_size,
            capacity: config.capacity,
            index_capacity,
            store: vec![0.0; store_points * d],
            ref_count: vec![0; index_capacity],
            location_list: vec![INFEASIBLE_LOCATION; index_capacity],
            free_handles: (0..index_capacity as u32).rev().collect(),
            start_of_free_segment: 0,
            internal_shingling_enabled: config.internal_shingling_enabled,
            rotation_enabled: config.rotation_enabled,
            dynamic_resizing_enabled: config.dynamic_resizing_enabled,
            direct_location_map: config.direct_location_map,
            known_shingle: Vec::new(),
            next_sequence_index: 0,
            last_handle: None,
        })
    }

    /// Rebuild a store from persisted parts. Used by the state mapper.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn restore(
        config: StoreConfig,
        index_capacity: usize,
        store: Vec<f64>,
        ref_count: Vec<u32>,
        location_list: Vec<u32>,
        start_of_free_segment: usize,
        known_shingle: Vec<f64>,
        next_sequence_index: SequenceIndex,
    ) -> Self {
        let free_handles = (0..index_capacity as u32)
            .rev()
            .filter(|&h| location_list[h as usize] == INFEASIBLE_LOCATION)
            .collect();
        Self {
            dimensions: config.dimensions,
            shingle_size: config.shingle_size,
            capacity: config.capacity,
            index_capacity,
            store,
            ref_count,
            location_list,
            free_handles,
            start_of_free_segment,
            internal_shingling_enabled: config.internal_shingling_enabled,
            rotation_enabled: config.rotation_enabled,
            dynamic_resizing_enabled: config.dynamic_resizing_enabled,
            direct_location_map: config.direct_location_map,
            known_shingle,
            next_sequence_index,
            // conservative: the restored tail is not extended in place
            last_handle: None,
        }
    }

    /// Dimensionality of every stored point.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Configured shingle size.
    pub fn shingle_size(&self) -> usize {
        self.shingle_size
    }

    /// Maximum number of live points.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Currently allocated handle slots.
    pub fn index_capacity(&self) -> usize {
        self.index_capacity
    }

    /// Backing array size in points.
    pub fn current_store_capacity(&self) -> usize {
        self.store.len() / self.dimensions
    }

    /// First backing offset not used by any live point.
    pub fn start_of_free_segment(&self) -> usize {
        self.start_of_free_segment
    }

    /// Whether internal shingling is enabled.
    pub fn internal_shingling_enabled(&self) -> bool {
        self.internal_shingling_enabled
    }

    /// Whether the shingle window is cyclic.
    pub fn rotation_enabled(&self) -> bool {
        self.rotation_enabled
    }

    /// Whether backing arrays grow on demand.
    pub fn dynamic_resizing_enabled(&self) -> bool {
        self.dynamic_resizing_enabled
    }

    /// Whether handles map directly to offsets.
    pub fn direct_location_map(&self) -> bool {
        self.direct_location_map
    }

    /// The most recently admitted shingle, empty before the first admit.
    pub fn known_shingle(&self) -> &[f64] {
        &self.known_shingle
    }

    /// Sequence index expected on the next admit.
    pub fn next_sequence_index(&self) -> SequenceIndex {
        self.next_sequence_index
    }

    pub(crate) fn ref_counts(&self) -> &[u32] {
        &self.ref_count
    }

    pub(crate) fn locations(&self) -> &[u32] {
        &self.location_list
    }

    pub(crate) fn store_data(&self) -> &[f64] {
        &self.store
    }

    /// Number of live handles.
    pub fn live_count(&self) -> usize {
        self.index_capacity - self.free_handles.len()
    }

    fn base_dimensions(&self) -> usize {
        self.dimensions / self.shingle_size
    }

    fn is_live(&self, handle: PointHandle) -> bool {
        handle.index() < self.index_capacity
            && self.location_list[handle.index()] != INFEASIBLE_LOCATION
    }

    fn location_of(&self, handle: PointHandle) -> Result<usize> {
        if !self.is_live(handle) {
            return Err(ForestError::CacheState(format!(
                "handle {} is not live",
                handle.index()
            )));
        }
        Ok(self.location_list[handle.index()] as usize)
    }

    /// Admit a point, returning a handle with its reference count bumped.
    ///
    /// With internal shingling the store may recognize the point as the
    /// previous shingle (same handle, extra reference) or as its successor
    /// (only the trailing stride is stored).
    pub fn admit(&mut self, point: &[f64], sequence_index: SequenceIndex) -> Result<PointHandle> {
        let clean = clean_copy(point, self.dimensions)?;
        let handle = match self.classify_reuse(&clean) {
            Reuse::Duplicate(prev) => {
                self.inc_ref(prev)?;
                prev
            }
            Reuse::Overlap(prev) => self.admit_overlap(&clean, prev, sequence_index)?,
            Reuse::None => self.admit_fresh(&clean, sequence_index)?,
        };
        if self.internal_shingling_enabled {
            self.known_shingle = clean;
        }
        self.next_sequence_index = sequence_index.wrapping_add(1);
        Ok(handle)
    }

    fn classify_reuse(&self, clean: &[f64]) -> Reuse {
        if !self.internal_shingling_enabled {
            return Reuse::None;
        }
        // the most recent live admit is the preferred reuse window
        let Some(prev) = self.last_handle else {
            return Reuse::None;
        };
        if !self.is_live(prev) || self.known_shingle.is_empty() {
            return Reuse::None;
        }
        if clean == self.known_shingle.as_slice() {
            return Reuse::Duplicate(prev);
        }
        if self.shingle_size > 1 && self.overlap_matches(clean) {
            return Reuse::Overlap(prev);
        }
        Reuse::None
    }

    fn overlap_matches(&self, clean: &[f64]) -> bool {
        // the successor relation is on the logical vectors and is the same
        // in every storage mode
        let d = self.dimensions;
        let base = self.base_dimensions();
        clean[..d - base] == self.known_shingle[base..]
    }

    fn admit_overlap(
        &mut self,
        clean: &[f64],
        prev: PointHandle,
        sequence_index: SequenceIndex,
    ) -> Result<PointHandle> {
        let d = self.dimensions;
        let base = self.base_dimensions();
        // overlap storage only works when the previous vector is the tail
        // of the used segment
        if self.location_list[prev.index()] as usize + d != self.start_of_free_segment {
            return self.admit_fresh(clean, sequence_index);
        }
        if self.rotation_enabled
            && self.rotation_origin(sequence_index)
                != (self.location_list[prev.index()] as usize + base) % d
        {
            // a gap in the sequence would break the slot alignment, so the
            // window starts a new run instead of extending this one
            return self.admit_fresh(clean, sequence_index);
        }
        self.ensure_room(base)?;
        // compaction inside ensure_room may have slid the tail leftward
        let location = self.location_list[prev.index()] as usize + base;
        let handle = self.allocate_handle()?;
        // the leading d - base values are already in place
        self.store[location + d - base..location + d].copy_from_slice(&clean[d - base..]);
        self.location_list[handle.index()] = location as u32;
        self.ref_count[handle.index()] = 1;
        self.start_of_free_segment = location + d;
        self.last_handle = Some(handle);
        Ok(handle)
    }

    /// Location residue a window admitted at `sequence_index` must occupy
    /// when rotation is enabled, so that a backing offset `x` always holds
    /// slot `x % dimensions` of the rotating window.
    fn rotation_origin(&self, sequence_index: SequenceIndex) -> usize {
        let slot = (sequence_index % self.shingle_size as u64) as usize;
        (slot + 1) % self.shingle_size * self.base_dimensions()
    }

    /// Padding that moves the free segment onto the residue required for a
    /// window admitted at `sequence_index`.
    fn rotation_padding(&self, sequence_index: SequenceIndex) -> usize {
        let d = self.dimensions;
        let target = self.rotation_origin(sequence_index);
        (target + d - self.start_of_free_segment % d) % d
    }

    fn admit_fresh(
        &mut self,
        clean: &[f64],
        sequence_index: SequenceIndex,
    ) -> Result<PointHandle> {
        let d = self.dimensions;
        if self.direct_location_map {
            let handle = self.allocate_handle()?;
            let location = handle.index() * d;
            if location + d > self.store.len() {
                self.store.resize((location + d).max(self.store.len() * 2).min(self.capacity * d), 0.0);
            }
            self.store[location..location + d].copy_from_slice(clean);
            self.location_list[handle.index()] = location as u32;
            self.ref_count[handle.index()] = 1;
            self.start_of_free_segment = self.start_of_free_segment.max(location + d);
            self.last_handle = Some(handle);
            return Ok(handle);
        }
        // a new storage run is pinned to its admitting sequence index;
        // chained successors stay aligned because location and sequence
        // advance in lockstep
        let mut padding = if self.rotation_enabled {
            self.rotation_padding(sequence_index)
        } else {
            0
        };
        self.ensure_room(padding + d)?;
        if self.rotation_enabled {
            // compaction inside ensure_room can move the free segment;
            // re-derive the padding against its final position
            let realigned = self.rotation_padding(sequence_index);
            if realigned != padding {
                padding = realigned;
                self.ensure_room(padding + d)?;
            }
        }
        let location = self.start_of_free_segment + padding;
        let handle = self.allocate_handle()?;
        self.store[location..location + d].copy_from_slice(clean);
        self.location_list[handle.index()] = location as u32;
        self.ref_count[handle.index()] = 1;
        self.start_of_free_segment = location + d;
        self.last_handle = Some(handle);
        Ok(handle)
    }

    fn ensure_room(&mut self, extra: usize) -> Result<()> {
        if self.start_of_free_segment + extra <= self.store.len() {
            return Ok(());
        }
        self.compact();
        if self.start_of_free_segment + extra <= self.store.len() {
            return Ok(());
        }
        let needed = self.start_of_free_segment + extra;
        let max_len = self.capacity * self.dimensions;
        if self.dynamic_resizing_enabled && self.store.len() < max_len {
            let new_len = (self.store.len() * 2).max(needed).min(max_len);
            if new_len >= needed {
                self.store.resize(new_len, 0.0);
                return Ok(());
            }
        }
        Err(ForestError::CapacityExceeded {
            capacity: self.capacity,
        })
    }

    fn allocate_handle(&mut self) -> Result<PointHandle> {
        if let Some(h) = self.free_handles.pop() {
            return Ok(PointHandle(h));
        }
        if self.index_capacity < self.capacity {
            let new_capacity = (self.index_capacity * 2).clamp(self.index_capacity + 1, self.capacity);
            self.ref_count.resize(new_capacity, 0);
            self.location_list.resize(new_capacity, INFEASIBLE_LOCATION);
            for h in (self.index_capacity as u32..new_capacity as u32).rev() {
                self.free_handles.push(h);
            }
            self.index_capacity = new_capacity;
            if let Some(h) = self.free_handles.pop() {
                return Ok(PointHandle(h));
            }
        }
        Err(ForestError::CapacityExceeded {
            capacity: self.capacity,
        })
    }

    /// Add a reference to a live handle, returning the new count.
    pub fn inc_ref(&mut self, handle: PointHandle) -> Result<u32> {
        self.location_of(handle)?;
        self.ref_count[handle.index()] += 1;
        Ok(self.ref_count[handle.index()])
    }

    /// Drop a reference. At zero the handle is freed; its backing bytes are
    /// reclaimed at the next compaction.
    pub fn dec_ref(&mut self, handle: PointHandle) -> Result<u32> {
        self.location_of(handle)?;
        let count = &mut self.ref_count[handle.index()];
        *count -= 1;
        let remaining = *count;
        if remaining == 0 {
            self.location_list[handle.index()] = INFEASIBLE_LOCATION;
            self.free_handles.push(handle.index() as u32);
            if self.last_handle == Some(handle) {
                self.last_handle = None;
            }
        }
        Ok(remaining)
    }

    /// View of a live handle's point. With rotation enabled the window's
    /// location additionally encodes the cyclic slot alignment
    /// (`location % dimensions` is the handle's rotation origin); the
    /// values themselves are the plain point in every mode.
    pub fn get(&self, handle: PointHandle) -> Result<&[f64]> {
        let location = self.location_of(handle)?;
        Ok(&self.store[location..location + self.dimensions])
    }

    /// Copy of a live handle's point.
    pub fn get_copy(&self, handle: PointHandle) -> Result<Vec<f64>> {
        Ok(self.get(handle)?.to_vec())
    }

    /// Whether the live handle's point equals `point` coordinatewise.
    pub fn is_equal(&self, handle: PointHandle, point: &[f64]) -> Result<bool> {
        Ok(self.get(handle)? == point)
    }

    /// Slide live runs leftward, reclaiming interior holes. Handle values
    /// are preserved; only offsets change, in a way that keeps the relative
    /// order of live handles. Must not run while a tree traversal on this
    /// store is in flight; the forest schedules it between external calls.
    pub fn compact(&mut self) {
        if self.direct_location_map {
            return;
        }
        let d = self.dimensions;
        let mut live: Vec<(usize, u32)> = (0..self.index_capacity)
            .filter(|&h| self.location_list[h] != INFEASIBLE_LOCATION)
            .map(|h| (self.location_list[h] as usize, h as u32))
            .collect();
        live.sort_unstable();

        // union of covered source ranges, in order
        let mut segments: Vec<(usize, usize)> = Vec::new();
        for &(location, _) in &live {
            let end = location + d;
            match segments.last_mut() {
                Some((_, seg_end)) if location <= *seg_end => *seg_end = (*seg_end).max(end),
                _ => segments.push((location, end)),
            }
        }

        // leftward shift of each segment = total gap preceding it
        let mut shifts: Vec<usize> = Vec::with_capacity(segments.len());
        let mut total_shift = 0usize;
        let mut previous_end = 0usize;
        for &(start, end) in &segments {
            let mut gap = start - previous_end;
            if self.rotation_enabled {
                // windows shift only by whole-window multiples so every
                // location keeps the residue pinned by its sequence index
                gap -= gap % d;
            }
            total_shift += gap;
            shifts.push(total_shift);
            previous_end = end;
        }

        for (&(start, end), &shift) in segments.iter().zip(shifts.iter()) {
            if shift > 0 {
                self.store.copy_within(start..end, start - shift);
            }
        }

        // remap live locations, walking the sorted handles and segments together
        let mut segment_index = 0usize;
        for &(location, handle) in &live {
            while segment_index + 1 < segments.len() && location >= segments[segment_index].1 {
                segment_index += 1;
            }
            self.location_list[handle as usize] = (location - shifts.get(segment_index).copied().unwrap_or(0)) as u32;
        }

        let old_start = self.start_of_free_segment;
        self.start_of_free_segment = previous_end - total_shift;
        if old_start != self.start_of_free_segment {
            debug!(
                reclaimed = old_start - self.start_of_free_segment,
                live = live.len(),
                "compacted point store"
            );
        }
    }

    /// Smallest `k` such that every handle `>= k` is free; the serialized
    /// `ref_count` and `location_list` arrays are truncated to this length.
    pub fn valid_prefix(&self) -> usize {
        (0..self.index_capacity)
            .rev()
            .find(|&h| self.location_list[h] != INFEASIBLE_LOCATION)
            .map_or(0, |h| h + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain_store(dimensions: usize, capacity: usize) -> PointStore {
        PointStore::new(StoreConfig::new(dimensions, capacity)).unwrap()
    }

    fn shingled_config(dimensions: usize, shingle_size: usize, capacity: usize) -> StoreConfig {
        let mut config = StoreConfig::new(dimensions, capacity);
        config.shingle_size = shingle_size;
        config.internal_shingling_enabled = true;
        config
    }

    #[test]
    fn test_admit_and_get() {
        let mut store = plain_store(2, 8);
        let h = store.admit(&[1.0, -2.0], 1).unwrap();
        assert_eq!(store.get(h).unwrap(), &[1.0, -2.0]);
        assert_eq!(store.get_copy(h).unwrap(), vec![1.0, -2.0]);
        assert!(store.is_equal(h, &[1.0, -2.0]).unwrap());
        assert!(!store.is_equal(h, &[1.0, -2.1]).unwrap());
    }

    #[test]
    fn test_admit_cleans_negative_zero() {
        let mut store = plain_store(1, 4);
        let h = store.admit(&[-0.0], 1).unwrap();
        assert_eq!(store.get(h).unwrap()[0].to_bits(), 0.0f64.to_bits());
    }

    #[test]
    fn test_ref_counting_frees_slot() {
        let mut store = plain_store(2, 4);
        let h = store.admit(&[1.0, 1.0], 1).unwrap();
        assert_eq!(store.inc_ref(h).unwrap(), 2);
        assert_eq!(store.dec_ref(h).unwrap(), 1);
        assert_eq!(store.dec_ref(h).unwrap(), 0);
        assert!(store.get(h).is_err());
        assert_eq!(store.live_count(), 0);
        // slot is reusable
        let h2 = store.admit(&[2.0, 2.0], 2).unwrap();
        assert_eq!(h2, h);
    }

    #[test]
    fn test_capacity_exceeded_without_resizing() {
        let mut config = StoreConfig::new(1, 2);
        config.dynamic_resizing_enabled = false;
        let mut store = PointStore::new(config).unwrap();
        store.admit(&[1.0], 1).unwrap();
        store.admit(&[2.0], 2).unwrap();
        let err = store.admit(&[3.0], 3).unwrap_err();
        assert!(matches!(err, ForestError::CapacityExceeded { capacity: 2 }));
    }

    #[test]
    fn test_dynamic_resizing_reaches_capacity() {
        let mut store = plain_store(3, 64);
        let handles: Vec<_> = (0..64)
            .map(|i| store.admit(&[i as f64, 0.0, 1.0], i as u64).unwrap())
            .collect();
        assert_eq!(store.live_count(), 64);
        for (i, h) in handles.iter().enumerate() {
            assert_eq!(store.get(*h).unwrap()[0], i as f64);
        }
        assert!(store.admit(&[0.0, 0.0, 0.0], 65).is_err());
    }

    #[test]
    fn test_compact_preserves_live_points_and_order() {
        let mut store = plain_store(2, 8);
        let handles: Vec<_> = (0..6)
            .map(|i| store.admit(&[i as f64, -(i as f64)], i as u64).unwrap())
            .collect();
        // free interior points
        store.dec_ref(handles[1]).unwrap();
        store.dec_ref(handles[3]).unwrap();
        let before: Vec<_> = [0, 2, 4, 5]
            .iter()
            .map(|&i| store.get_copy(handles[i]).unwrap())
            .collect();
        store.compact();
        let after: Vec<_> = [0, 2, 4, 5]
            .iter()
            .map(|&i| store.get_copy(handles[i]).unwrap())
            .collect();
        assert_eq!(before, after);
        // order of live offsets is preserved
        let offsets: Vec<_> = [0, 2, 4, 5]
            .iter()
            .map(|&i| store.locations()[handles[i].index()])
            .collect();
        assert!(offsets.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(store.start_of_free_segment(), 4 * 2);
    }

    #[test]
    fn test_valid_prefix_tracks_highest_live_handle() {
        let mut store = plain_store(1, 8);
        let handles: Vec<_> = (0..5)
            .map(|i| store.admit(&[i as f64], i as u64).unwrap())
            .collect();
        assert_eq!(store.valid_prefix(), 5);
        store.dec_ref(handles[4]).unwrap();
        assert_eq!(store.valid_prefix(), 4);
        store.dec_ref(handles[1]).unwrap();
        assert_eq!(store.valid_prefix(), 4);
    }

    #[test]
    fn test_shingle_duplicate_returns_same_handle() {
        let mut store = PointStore::new(shingled_config(4, 2, 8)).unwrap();
        let h1 = store.admit(&[1.0, 2.0, 3.0, 4.0], 1).unwrap();
        let h2 = store.admit(&[1.0, 2.0, 3.0, 4.0], 2).unwrap();
        assert_eq!(h1, h2);
        assert_eq!(store.dec_ref(h1).unwrap(), 1);
    }

    #[test]
    fn test_shingle_overlap_shares_storage() {
        let mut store = PointStore::new(shingled_config(4, 2, 8)).unwrap();
        // consecutive shingles with stride 2 share their middle coordinates
        let h1 = store.admit(&[1.0, 2.0, 3.0, 4.0], 1).unwrap();
        let h2 = store.admit(&[3.0, 4.0, 5.0, 6.0], 2).unwrap();
        assert_ne!(h1, h2);
        assert_eq!(store.get_copy(h1).unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(store.get_copy(h2).unwrap(), vec![3.0, 4.0, 5.0, 6.0]);
        // 4 + 2 floats used rather than 8
        assert_eq!(store.start_of_free_segment(), 6);
        let loc1 = store.locations()[h1.index()];
        let loc2 = store.locations()[h2.index()];
        assert_eq!(loc2, loc1 + 2);
    }

    #[test]
    fn test_shingle_overlap_survives_compaction() {
        let mut store = PointStore::new(shingled_config(4, 2, 16)).unwrap();
        let h1 = store.admit(&[1.0, 2.0, 3.0, 4.0], 1).unwrap();
        let h2 = store.admit(&[3.0, 4.0, 5.0, 6.0], 2).unwrap();
        let h3 = store.admit(&[5.0, 6.0, 7.0, 8.0], 3).unwrap();
        store.dec_ref(h1).unwrap();
        store.compact();
        assert_eq!(store.get_copy(h2).unwrap(), vec![3.0, 4.0, 5.0, 6.0]);
        assert_eq!(store.get_copy(h3).unwrap(), vec![5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn test_rotation_round_trips_and_shares_overlapping_bytes() {
        let mut config = shingled_config(4, 2, 16);
        config.rotation_enabled = true;
        let mut store = PointStore::new(config).unwrap();
        let points = [
            [1.0, 2.0, 3.0, 4.0],
            [3.0, 4.0, 5.0, 6.0],
            [5.0, 6.0, 7.0, 8.0],
        ];
        let handles: Vec<_> = points
            .iter()
            .enumerate()
            .map(|(i, p)| store.admit(p, i as u64).unwrap())
            .collect();
        for (p, h) in points.iter().zip(handles.iter()) {
            assert_eq!(store.get_copy(*h).unwrap(), p.to_vec());
            assert!(store.is_equal(*h, p).unwrap());
        }
        // the run starts at the residue pinned by sequence index 0, then
        // each successor appends only its trailing stride
        let locations: Vec<_> = handles
            .iter()
            .map(|h| store.locations()[h.index()] as usize)
            .collect();
        assert_eq!(locations, vec![2, 4, 6]);
        assert_eq!(store.start_of_free_segment(), 10);
        for (i, &location) in locations.iter().enumerate() {
            assert_eq!(location % 4, (i + 1) % 2 * 2, "sequence {i}");
        }
    }

    #[test]
    fn test_rotation_overlap_survives_compaction() {
        let mut config = shingled_config(4, 2, 16);
        config.rotation_enabled = true;
        let mut store = PointStore::new(config).unwrap();
        let h1 = store.admit(&[1.0, 2.0, 3.0, 4.0], 0).unwrap();
        let h2 = store.admit(&[3.0, 4.0, 5.0, 6.0], 1).unwrap();
        let h3 = store.admit(&[5.0, 6.0, 7.0, 8.0], 2).unwrap();
        store.dec_ref(h1).unwrap();
        store.compact();
        assert_eq!(store.get_copy(h2).unwrap(), vec![3.0, 4.0, 5.0, 6.0]);
        assert_eq!(store.get_copy(h3).unwrap(), vec![5.0, 6.0, 7.0, 8.0]);
        // compaction shifted by a whole window, keeping the alignment
        assert_eq!(store.locations()[h2.index()] % 4, 0);
        assert_eq!(store.locations()[h3.index()] % 4, 2);
        // the chain keeps extending in place after compaction
        let h4 = store.admit(&[7.0, 8.0, 9.0, 10.0], 3).unwrap();
        assert_eq!(store.get_copy(h4).unwrap(), vec![7.0, 8.0, 9.0, 10.0]);
        assert_eq!(
            store.locations()[h4.index()] as usize,
            store.locations()[h3.index()] as usize + 2
        );
        assert_eq!(store.locations()[h4.index()] % 4, 0);
    }

    #[test]
    fn test_direct_location_map() {
        let mut config = StoreConfig::new(2, 8);
        config.direct_location_map = true;
        let mut store = PointStore::new(config).unwrap();
        let h1 = store.admit(&[1.0, 2.0], 1).unwrap();
        let h2 = store.admit(&[3.0, 4.0], 2).unwrap();
        assert_eq!(store.locations()[h1.index()] as usize, h1.index() * 2);
        assert_eq!(store.locations()[h2.index()] as usize, h2.index() * 2);
        store.compact();
        assert_eq!(store.get(h1).unwrap(), &[1.0, 2.0]);
        assert_eq!(store.get(h2).unwrap(), &[3.0, 4.0]);
    }
}
