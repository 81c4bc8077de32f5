//! Test the seven-key sample through deletes, borrows, merges and reinserts.

use std::collections::BTreeSet;

use crate::e2e_tests::helpers::*;
use crate::storage::KeyedStorage;

#[test]
fn test_sample_delete_and_reinsert_payloads() {
    let tree = sample_tree();
    assert_eq!(payloads(&tree), BTreeSet::from(*b"cmopqrs"));

    assert_eq!(tree.delete(3), Ok(b'o'));
    assert_eq!(payloads(&tree), BTreeSet::from(*b"cmpqrs"));
    tree.validate().expect("valid after delete 3");

    assert_eq!(tree.delete(4), Ok(b'p'));
    tree.insert(3, b'o').expect("nonzero key");
    tree.insert(-2, b't').expect("nonzero key");

    assert_eq!(payloads(&tree), BTreeSet::from(*b"cmqrsot"));
    assert_eq!(tree.len(), 7);
    tree.validate().expect("valid after reinserts");
}

#[test]
fn test_sample_shapes_follow_borrow_preference() {
    let tree = sample_tree();
    assert_eq!(
        tree.layout(),
        vec![vec![vec![2, 4]], vec![vec![-1, 1], vec![3], vec![5, 6]]]
    );

    // [3] underflows and borrows from its right sibling first.
    tree.delete(3).expect("present");
    assert_eq!(
        tree.layout(),
        vec![vec![vec![2, 5]], vec![vec![-1, 1], vec![4], vec![6]]]
    );

    // The right sibling has nothing to spare, so the left one lends.
    tree.delete(4).expect("present");
    assert_eq!(
        tree.layout(),
        vec![vec![vec![1, 5]], vec![vec![-1], vec![2], vec![6]]]
    );

    tree.insert(3, b'o').expect("nonzero key");
    tree.insert(-2, b't').expect("nonzero key");
    assert_eq!(
        tree.layout(),
        vec![vec![vec![1, 5]], vec![vec![-2, -1], vec![2, 3], vec![6]]]
    );
    assert_eq!(traversal_keys(&tree), vec![1, 5, -2, -1, 2, 3, 6]);
}

#[test]
fn test_sample_matches_map_backend() {
    let tree = sample_tree();
    let map = sample_map();

    for storage in [&tree as &dyn KeyedStorage<u8>, &map] {
        assert_eq!(storage.delete(3), Ok(b'o'));
        assert_eq!(storage.delete(4), Ok(b'p'));
        storage.insert(3, b'o').expect("nonzero key");
        storage.insert(-2, b't').expect("nonzero key");
    }

    assert_eq!(payloads(&tree), payloads(&map));
    let mut tree_keys = traversal_keys(&tree);
    let mut map_keys = traversal_keys(&map);
    tree_keys.sort_unstable();
    map_keys.sort_unstable();
    assert_eq!(tree_keys, map_keys);
}

#[test]
fn test_drain_sample_to_empty() {
    let tree = sample_tree();
    for (key, payload) in SAMPLE {
        assert_eq!(tree.delete(key), Ok(payload));
        tree.validate().expect("valid while draining");
    }
    assert!(tree.is_empty());
    assert_eq!(
        tree.delete(1),
        Err(crate::storage::StorageError::UninitializedStorage)
    );
}
