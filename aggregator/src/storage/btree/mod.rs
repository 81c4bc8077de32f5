//! In-memory B-tree backend.
//!
//! # Structure
//!
//! - `node`: entry layout plus split, borrow and merge on owned nodes
//! - `tree`: the locked container exposing the public operations
//!
//! Degree `d` bounds every node to `2d − 1` entries and every non-root node
//! to at least `d − 1`. Inserts split full nodes on the way down, so a
//! single top-down pass is always enough.
//!
//! # Usage
//!
//! ```
//! use aggregator::storage::btree::BTreeStorage;
//!
//! let tree = BTreeStorage::new(2).expect("degree is valid");
//! for key in [1, 2, 3, 4] {
//!     tree.insert(key, key * 10).expect("nonzero key");
//! }
//!
//! assert_eq!(tree.layout(), vec![vec![vec![2]], vec![vec![1], vec![3, 4]]]);
//! assert_eq!(tree.delete(2), Ok(20));
//! ```

mod node;
mod tree;

pub use node::{max_children, max_entries, min_entries};
pub use tree::{BTreeStorage, DEFAULT_DEGREE, InvariantViolation, TreeStats};
