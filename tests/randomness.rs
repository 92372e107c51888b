//! Statistical behavior of the random cut draw and seed determinism.

use cut_forest::geometry::random_cut;
use cut_forest::{
    BoundingBox, ChaChaSource, CutSource, PointStore, PointStoreMapper, RandomCutTree,
    StoreConfig, TreeConfig,
};

#[test]
fn test_cut_dimension_frequencies_match_side_lengths() {
    // side lengths 10, 0, 30: dimension shares must be 0.25, 0, 0.75
    let bbox = BoundingBox::from_corners(&[0.0, 0.0, 0.0], &[10.0, 0.0, 30.0]).unwrap();
    let mut source = ChaChaSource::seeded(987_654_321);
    let draws = 100_000;
    let mut counts = [0usize; 3];
    for _ in 0..draws {
        let cut = random_cut(source.next_unit(), &bbox).unwrap();
        counts[cut.dimension] += 1;
        assert!(cut.value >= bbox.min_value(cut.dimension));
        assert!(cut.value < bbox.max_value(cut.dimension));
    }
    assert_eq!(counts[1], 0, "degenerate dimensions never receive cuts");
    let share0 = counts[0] as f64 / draws as f64;
    let share2 = counts[2] as f64 / draws as f64;
    assert!((share0 - 0.25).abs() < 0.01, "share {share0}");
    assert!((share2 - 0.75).abs() < 0.01, "share {share2}");
}

fn grow(seed: u64) -> (RandomCutTree, PointStore) {
    let mut tree = RandomCutTree::with_seed(3, TreeConfig::default(), seed);
    let mut store = PointStore::new(StoreConfig::new(3, 64)).unwrap();
    for i in 0..50u64 {
        let point = [
            (i % 7) as f64 * 1.3 - 4.0,
            ((i * 31) % 11) as f64 * 0.7,
            (i % 5) as f64 - 2.0,
        ];
        let handle = store.admit(&point, i).unwrap();
        let used = tree.add_point(&store, handle, i).unwrap();
        if used != handle {
            store.inc_ref(used).unwrap();
            store.dec_ref(handle).unwrap();
        }
    }
    (tree, store)
}

#[test]
fn test_same_seed_produces_byte_equal_store_state() {
    let (tree_a, mut store_a) = grow(424_242);
    let (tree_b, mut store_b) = grow(424_242);

    let root_a = tree_a.root_view(&store_a).unwrap();
    let root_b = tree_b.root_view(&store_b).unwrap();
    assert_eq!(root_a.cut_dimension(), root_b.cut_dimension());
    assert_eq!(root_a.cut_value(), root_b.cut_value());
    assert_eq!(root_a.bounding_box(), root_b.bounding_box());

    let mapper = PointStoreMapper::default();
    let state_a = mapper.to_state(&mut store_a);
    let state_b = mapper.to_state(&mut store_b);
    let bytes_a = bincode::serialize(&state_a).unwrap();
    let bytes_b = bincode::serialize(&state_b).unwrap();
    assert_eq!(bytes_a, bytes_b);
}

#[test]
fn test_different_seeds_produce_different_cuts() {
    let (tree_a, store_a) = grow(1);
    let (tree_b, store_b) = grow(2);
    let root_a = tree_a.root_view(&store_a).unwrap();
    let root_b = tree_b.root_view(&store_b).unwrap();
    let same = root_a.cut_dimension() == root_b.cut_dimension()
        && root_a.cut_value() == root_b.cut_value();
    assert!(!same, "distinct seeds should disagree on the root cut");
}
