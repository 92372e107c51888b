//! Mapping between a live [`PointStore`] and its portable state record.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::StoreConfig;
use crate::errors::{ForestError, Result};
use crate::state::packing;
use crate::store::{PointStore, INFEASIBLE_LOCATION};

/// Precision tag written by this implementation.
pub const PRECISION_FLOAT_64: &str = "FLOAT_64";

/// Versioned, self-describing snapshot of a point store.
///
/// `ref_count` and `location_list` are truncated to the store's valid
/// prefix; `point_data` holds the live prefix of the backing array. The
/// `compressed` flag records which integer packing was used so either
/// branch round-trips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointStoreState {
    /// Dimensionality of stored points.
    pub dimensions: u32,
    /// Maximum number of live points.
    pub capacity: u32,
    /// Allocated handle slots at serialization time.
    pub index_capacity: u32,
    /// Backing array size in points.
    pub current_store_capacity: u32,
    /// Shingle size.
    pub shingle_size: u32,
    /// First unused backing offset.
    pub start_of_free_segment: u64,
    /// Floating-point precision tag; only `FLOAT_64` is supported here.
    pub precision: String,
    /// Whether internal shingling was enabled.
    pub internal_shingling_enabled: bool,
    /// Whether the shingle window is cyclic.
    pub rotation_enabled: bool,
    /// Whether backing arrays grow on demand.
    pub dynamic_resizing_enabled: bool,
    /// Whether handles map directly to offsets.
    pub direct_location_map: bool,
    /// Whether integer arrays use delta+varint packing.
    pub compressed: bool,
    /// Rolling shingle buffer, empty when shingling is disabled.
    pub internal_shingle: Vec<f64>,
    /// Sequence index expected on the next admit.
    pub last_time_stamp: u64,
    /// Packed doubles: the backing array up to `start_of_free_segment`.
    pub point_data: Vec<u8>,
    /// Packed reference counts, truncated to the valid prefix.
    pub ref_count: Vec<u8>,
    /// Packed locations, truncated to the valid prefix.
    pub location_list: Vec<u8>,
}

/// Converts between live point stores and [`PointStoreState`] records.
#[derive(Debug, Clone)]
pub struct PointStoreMapper {
    /// Pack integer arrays with the delta+varint scheme.
    pub compression_enabled: bool,
}

impl Default for PointStoreMapper {
    fn default() -> Self {
        Self {
            compression_enabled: true,
        }
    }
}

impl PointStoreMapper {
    /// Snapshot a store. Compacts it first so the serialized prefix is dense.
    pub fn to_state(&self, store: &mut PointStore) -> PointStoreState {
        store.compact();
        let prefix = store.valid_prefix();
        let state = PointStoreState {
            dimensions: store.dimensions() as u32,
            capacity: store.capacity() as u32,
            index_capacity: store.index_capacity() as u32,
            current_store_capacity: store.current_store_capacity() as u32,
            shingle_size: store.shingle_size() as u32,
            start_of_free_segment: store.start_of_free_segment() as u64,
            precision: PRECISION_FLOAT_64.to_string(),
            internal_shingling_enabled: store.internal_shingling_enabled(),
            rotation_enabled: store.rotation_enabled(),
            dynamic_resizing_enabled: store.dynamic_resizing_enabled(),
            direct_location_map: store.direct_location_map(),
            compressed: self.compression_enabled,
            internal_shingle: store.known_shingle().to_vec(),
            last_time_stamp: store.next_sequence_index(),
            point_data: packing::pack_f64s(&store.store_data()[..store.start_of_free_segment()]),
            ref_count: packing::pack_u32s(&store.ref_counts()[..prefix], self.compression_enabled),
            location_list: packing::pack_u32s(&store.locations()[..prefix], self.compression_enabled),
        };
        debug!(
            live = store.live_count(),
            prefix,
            bytes = state.point_data.len() + state.ref_count.len() + state.location_list.len(),
            "serialized point store"
        );
        state
    }

    /// Rebuild a live store from a state record.
    pub fn to_model(&self, state: &PointStoreState) -> Result<PointStore> {
        if state.precision != PRECISION_FLOAT_64 {
            return Err(ForestError::PrecisionMismatch {
                expected: PRECISION_FLOAT_64,
                found: state.precision.clone(),
            });
        }
        let dimensions = state.dimensions as usize;
        let index_capacity = state.index_capacity as usize;
        let start_of_free_segment = state.start_of_free_segment as usize;

        let config = StoreConfig {
            dimensions,
            capacity: state.capacity as usize,
            shingle_size: state.shingle_size as usize,
            internal_shingling_enabled: state.internal_shingling_enabled,
            rotation_enabled: state.rotation_enabled,
            dynamic_resizing_enabled: state.dynamic_resizing_enabled,
            direct_location_map: state.direct_location_map,
        };
        config.validate()?;

        let mut store = vec![0.0; state.current_store_capacity as usize * dimensions];
        let decoded = packing::unpack_f64s(&state.point_data)?;
        if decoded.len() != start_of_free_segment || decoded.len() > store.len() {
            return Err(ForestError::CacheState(
                "point data length disagrees with start of free segment".into(),
            ));
        }
        store[..decoded.len()].copy_from_slice(&decoded);

        let ref_prefix = packing::unpack_u32s(&state.ref_count, state.compressed)?;
        let location_prefix = packing::unpack_u32s(&state.location_list, state.compressed)?;
        if ref_prefix.len() != location_prefix.len() || ref_prefix.len() > index_capacity {
            return Err(ForestError::CacheState(
                "ref count and location prefixes disagree".into(),
            ));
        }
        let mut ref_count = vec![0u32; index_capacity];
        let mut location_list = vec![INFEASIBLE_LOCATION; index_capacity];
        ref_count[..ref_prefix.len()].copy_from_slice(&ref_prefix);
        location_list[..location_prefix.len()].copy_from_slice(&location_prefix);
        for (&count, &location) in ref_count.iter().zip(location_list.iter()) {
            let live = location != INFEASIBLE_LOCATION;
            if live != (count > 0) {
                return Err(ForestError::CacheState(
                    "ref count and location disagree on liveness".into(),
                ));
            }
            if live && location as usize + dimensions > start_of_free_segment {
                return Err(ForestError::CacheState(
                    "live location reaches past the free segment".into(),
                ));
            }
        }

        Ok(PointStore::restore(
            config,
            index_capacity,
            store,
            ref_count,
            location_list,
            start_of_free_segment,
            state.internal_shingle.clone(),
            state.last_time_stamp,
        ))
    }
}
