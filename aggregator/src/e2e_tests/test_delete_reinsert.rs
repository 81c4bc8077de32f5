//! Test that deleted keys stay deleted and come back as fresh inserts.

use crate::e2e_tests::helpers::*;
use crate::storage::{BTreeStorage, KeyedStorage, MapStorage, StorageError};

fn check_delete_then_reinsert(storage: &dyn KeyedStorage<u8>) {
    for (key, payload) in SAMPLE {
        storage.insert(key, payload).expect("nonzero key");
    }

    assert_eq!(storage.delete(5), Ok(b'q'));
    assert_eq!(storage.search(5), Err(StorageError::NotFound(5)));

    // Inserting a neighbour must not resurrect the old payload.
    storage.insert(7, b'x').expect("nonzero key");
    assert_eq!(storage.search(5), Err(StorageError::NotFound(5)));
    assert_eq!(storage.delete(5), Err(StorageError::KeyNotFound(5)));

    assert_eq!(storage.insert(5, b'y'), Ok(None));
    assert_eq!(storage.search(5), Ok(b'y'));
    assert_eq!(storage.len(), SAMPLE.len() + 1);
}

#[test]
fn test_delete_then_reinsert_btree() {
    let tree = BTreeStorage::<u8>::new(2).expect("valid degree");
    check_delete_then_reinsert(&tree);
    tree.validate().expect("valid tree");
}

#[test]
fn test_delete_then_reinsert_map() {
    check_delete_then_reinsert(&MapStorage::<u8>::new());
}

#[test]
fn test_failed_delete_leaves_tree_unchanged() {
    let tree = sample_tree();
    let layout = tree.layout();

    assert_eq!(tree.delete(42), Err(StorageError::KeyNotFound(42)));
    assert_eq!(tree.delete(0), Err(StorageError::InvalidKey));
    assert_eq!(tree.layout(), layout);
}

#[test]
fn test_delete_on_never_populated_storage() {
    let tree = BTreeStorage::<u8>::new(3).expect("valid degree");
    assert_eq!(tree.delete(1), Err(StorageError::UninitializedStorage));
    assert_eq!(tree.delete(0), Err(StorageError::UninitializedStorage));

    let map = MapStorage::<u8>::new();
    assert_eq!(map.delete(1), Err(StorageError::UninitializedStorage));
}
