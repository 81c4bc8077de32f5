//! Property test: any operation sequence leaves the tree equivalent to an
//! ordered map, with every structural invariant intact.

use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;

use crate::storage::{BTreeStorage, Key, StorageError};

#[derive(Debug, Clone)]
enum Op {
    Insert(Key, u32),
    Delete(Key),
    Search(Key),
}

fn key() -> impl Strategy<Value = Key> {
    prop_oneof![
        9 => (-50_i64..=50).prop_filter("nonzero", |k| *k != 0),
        1 => Just(0_i64),
    ]
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        5 => (key(), any::<u32>()).prop_map(|(k, v)| Op::Insert(k, v)),
        3 => key().prop_map(Op::Delete),
        2 => key().prop_map(Op::Search),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn test_tree_matches_ordered_map(
        degree in 2_usize..6,
        ops in prop::collection::vec(op(), 1..300),
    ) {
        let tree = BTreeStorage::<u32>::new(degree).expect("valid degree");
        let mut model = BTreeMap::new();

        for op in ops {
            match op {
                Op::Insert(0, v) => {
                    prop_assert_eq!(tree.insert(0, v), Err(StorageError::InvalidKey));
                }
                Op::Insert(k, v) => {
                    prop_assert_eq!(tree.insert(k, v), Ok(model.insert(k, v)));
                }
                Op::Delete(k) => {
                    let expected = if model.is_empty() {
                        Err(StorageError::UninitializedStorage)
                    } else if k == 0 {
                        Err(StorageError::InvalidKey)
                    } else {
                        model.remove(&k).ok_or(StorageError::KeyNotFound(k))
                    };
                    prop_assert_eq!(tree.delete(k), expected);
                }
                Op::Search(0) => {
                    prop_assert_eq!(tree.search(0), Err(StorageError::InvalidKey));
                }
                Op::Search(k) => {
                    let expected = model.get(&k).copied().ok_or(StorageError::NotFound(k));
                    prop_assert_eq!(tree.search(k), expected);
                }
            }

            let stats = tree.validate();
            prop_assert!(stats.is_ok(), "{:?}", stats);
        }

        let mut visited = Vec::new();
        tree.traverse(&mut |entry| visited.push(entry.key));
        let unique: BTreeSet<Key> = visited.iter().copied().collect();
        prop_assert_eq!(unique.len(), visited.len());
        prop_assert!(unique.iter().eq(model.keys()));
        prop_assert_eq!(tree.len(), model.len());
    }
}
