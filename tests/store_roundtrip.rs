//! Round-trip laws for the point-store state mapper, over plain, shingled,
//! and rotated configurations.

use cut_forest::{ForestError, PointHandle, PointStore, PointStoreMapper, StoreConfig};

fn configurations() -> Vec<StoreConfig> {
    let plain = StoreConfig::new(4, 32);
    let mut shingled = StoreConfig::new(4, 32);
    shingled.shingle_size = 2;
    shingled.internal_shingling_enabled = true;
    let mut rotated = shingled.clone();
    rotated.rotation_enabled = true;
    let mut fixed = StoreConfig::new(4, 32);
    fixed.dynamic_resizing_enabled = false;
    vec![plain, shingled, rotated, fixed]
}

fn populate(store: &mut PointStore) -> Vec<PointHandle> {
    let mut handles = Vec::new();
    for i in 0..12u64 {
        let base = 2.0 * i as f64;
        // consecutive points overlap by half so shingled stores share bytes
        let point = [base, base + 1.0, base + 2.0, base + 3.0];
        handles.push(store.admit(&point, i).unwrap());
    }
    // punch holes
    for &i in &[1usize, 5, 9] {
        store.dec_ref(handles[i]).unwrap();
    }
    handles
}

#[test]
fn test_to_model_to_state_preserves_every_live_point() {
    for config in configurations() {
        let mut store = PointStore::new(config).unwrap();
        let handles = populate(&mut store);
        let mapper = PointStoreMapper::default();
        let state = mapper.to_state(&mut store);
        let restored = mapper.to_model(&state).unwrap();
        for (i, &h) in handles.iter().enumerate() {
            match store.get_copy(h) {
                Ok(expected) => assert_eq!(restored.get_copy(h).unwrap(), expected, "handle {i}"),
                Err(_) => assert!(restored.get_copy(h).is_err(), "handle {i} must stay free"),
            }
        }
        assert_eq!(restored.live_count(), store.live_count());
        assert_eq!(restored.start_of_free_segment(), store.start_of_free_segment());
    }
}

#[test]
fn test_state_bytes_stable_for_both_compression_branches() {
    for compression_enabled in [false, true] {
        for config in configurations() {
            let mut store = PointStore::new(config).unwrap();
            populate(&mut store);
            let mapper = PointStoreMapper {
                compression_enabled,
            };
            let state = mapper.to_state(&mut store);
            assert_eq!(state.compressed, compression_enabled);
            let mut restored = mapper.to_model(&state).unwrap();
            let state_again = mapper.to_state(&mut restored);
            assert_eq!(
                bincode::serialize(&state).unwrap(),
                bincode::serialize(&state_again).unwrap()
            );
        }
    }
}

#[test]
fn test_rotated_store_shares_overlapping_bytes() {
    let mut shingled = StoreConfig::new(4, 32);
    shingled.shingle_size = 2;
    shingled.internal_shingling_enabled = true;
    let mut rotated = shingled.clone();
    rotated.rotation_enabled = true;

    let mut plain_store = PointStore::new(shingled).unwrap();
    let mut rotated_store = PointStore::new(rotated).unwrap();
    for i in 0..12u64 {
        let base = 2.0 * i as f64;
        let point = [base, base + 1.0, base + 2.0, base + 3.0];
        let h = plain_store.admit(&point, i).unwrap();
        let r = rotated_store.admit(&point, i).unwrap();
        assert_eq!(rotated_store.get_copy(r).unwrap(), plain_store.get_copy(h).unwrap());
    }
    // one full window, eleven trailing strides, and at most one window of
    // alignment padding at the start of the run
    assert_eq!(plain_store.start_of_free_segment(), 4 + 11 * 2);
    assert_eq!(rotated_store.start_of_free_segment(), 2 + 4 + 11 * 2);
}

#[test]
fn test_wrong_precision_tag_is_rejected() {
    let mut store = PointStore::new(StoreConfig::new(2, 8)).unwrap();
    store.admit(&[1.0, 2.0], 1).unwrap();
    let mapper = PointStoreMapper::default();
    let mut state = mapper.to_state(&mut store);
    state.precision = "FLOAT_32".into();
    assert!(matches!(
        mapper.to_model(&state),
        Err(ForestError::PrecisionMismatch { .. })
    ));
}

#[test]
fn test_restored_store_accepts_further_admissions() {
    for config in configurations() {
        let capacity = config.capacity;
        let mut store = PointStore::new(config).unwrap();
        populate(&mut store);
        let mapper = PointStoreMapper::default();
        let state = mapper.to_state(&mut store);
        let mut restored = mapper.to_model(&state).unwrap();
        let before = restored.live_count();
        let h = restored.admit(&[50.0, 51.0, 52.0, 53.0], 100).unwrap();
        assert_eq!(restored.get_copy(h).unwrap(), vec![50.0, 51.0, 52.0, 53.0]);
        assert_eq!(restored.live_count(), before + 1);
        assert!(restored.live_count() <= capacity);
    }
}
