//! Test that inserting an existing key replaces only its payload.

use crate::e2e_tests::helpers::*;
use crate::storage::{BTreeStorage, KeyedStorage};

#[test]
fn test_upsert_keeps_shape() {
    let tree = sample_tree();
    let layout = tree.layout();
    let stats = tree.stats();

    for (key, _) in SAMPLE {
        let previous = tree.insert(key, b'u').expect("nonzero key");
        assert!(previous.is_some());
    }

    assert_eq!(tree.layout(), layout);
    assert_eq!(tree.stats(), stats);
    let mut values = Vec::new();
    tree.traverse(&mut |entry| values.push(entry.value));
    assert_eq!(values, vec![b'u'; SAMPLE.len()]);
}

#[test]
fn test_upsert_returns_previous_payload() {
    let map = sample_map();
    assert_eq!(map.insert(-1, b'a'), Ok(Some(b'r')));
    assert_eq!(map.insert(-1, b'b'), Ok(Some(b'a')));
    assert_eq!(map.search(-1), Ok(b'b'));
    assert_eq!(map.len(), SAMPLE.len());
}

#[test]
fn test_upsert_on_internal_node() {
    let tree = BTreeStorage::<u8>::new(2).expect("valid degree");
    for key in 1..=10 {
        tree.insert(key, 0).expect("nonzero key");
    }
    let root_keys = tree.layout()[0][0].clone();

    for &key in &root_keys {
        assert_eq!(tree.insert(key, 9), Ok(Some(0)));
        assert_eq!(tree.search(key), Ok(9));
    }
    assert_eq!(tree.layout()[0][0], root_keys);
    assert_eq!(tree.len(), 10);
}
