//! Test that the sentinel key is rejected everywhere without side effects.

use crate::e2e_tests::helpers::*;
use crate::storage::{KeyedStorage, SENTINEL_KEY, StorageError};

fn check_sentinel_rejected(storage: &dyn KeyedStorage<u8>) {
    let before = payloads(storage);

    assert_eq!(storage.insert(SENTINEL_KEY, b'z'), Err(StorageError::InvalidKey));
    assert_eq!(storage.search(SENTINEL_KEY), Err(StorageError::InvalidKey));
    assert_eq!(storage.delete(SENTINEL_KEY), Err(StorageError::InvalidKey));

    assert_eq!(payloads(storage), before);
    assert_eq!(storage.len(), SAMPLE.len());
}

#[test]
fn test_sentinel_rejected_by_btree() {
    let tree = sample_tree();
    let layout = tree.layout();
    check_sentinel_rejected(&tree);
    assert_eq!(tree.layout(), layout);
}

#[test]
fn test_sentinel_rejected_by_map() {
    check_sentinel_rejected(&sample_map());
}

#[test]
fn test_sentinel_on_empty_tree() {
    let tree = crate::storage::BTreeStorage::<u8>::new(2).expect("valid degree");
    assert_eq!(tree.insert(SENTINEL_KEY, 1), Err(StorageError::InvalidKey));
    assert_eq!(tree.search(SENTINEL_KEY), Err(StorageError::InvalidKey));
    assert!(tree.is_empty());
}
