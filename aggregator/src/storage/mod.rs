//! Keyed in-memory storage for the live aircraft aggregate.
//!
//! Two interchangeable backends implement [`KeyedStorage`]:
//!
//! - [`BTreeStorage`]: a classic B-tree with a configurable degree
//! - [`MapStorage`]: a hash map behind a mutex
//!
//! Both reject the sentinel key `0` and serialize every operation behind a
//! single lock, so a `search` blocks a concurrent `insert` and vice versa.
//!
//! # Usage
//!
//! ```
//! use aggregator::storage::{BTreeStorage, KeyedStorage, StorageError};
//!
//! let storage = BTreeStorage::new(2).expect("degree is valid");
//! storage.insert(0xA1B2C3, "N12345").expect("nonzero key");
//!
//! assert_eq!(storage.search(0xA1B2C3), Ok("N12345"));
//! assert_eq!(storage.search(0), Err(StorageError::InvalidKey));
//! ```

use std::cmp::Ordering;

pub mod archive;
pub mod btree;
mod map;
pub mod time;

pub use archive::{Archive, ArchiveError};
pub use btree::{BTreeStorage, DEFAULT_DEGREE, InvariantViolation, TreeStats};
pub use map::MapStorage;
pub use time::{ManualClock, SystemClock, TimeSource};

/// Storage key. Aircraft are keyed by their 24-bit ICAO address.
pub type Key = i64;

/// Reserved key marking an empty slot. Never a valid stored key.
pub const SENTINEL_KEY: Key = 0;

/// A key and its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry<V> {
    pub key: Key,
    pub value: V,
}

impl<V> Entry<V> {
    #[must_use]
    pub const fn new(key: Key, value: V) -> Self {
        Self { key, value }
    }
}

/// Three-way comparison between two keys.
///
/// The comparator is fixed when a container is built; swapping it between
/// calls would break the ordering the tree was built with.
pub trait KeyComparator: Send + Sync {
    fn compare(&self, left: Key, right: Key) -> Ordering;
}

/// Ascending numeric order.
#[derive(Debug, Clone, Copy, Default)]
pub struct NaturalOrder;

impl KeyComparator for NaturalOrder {
    fn compare(&self, left: Key, right: Key) -> Ordering {
        left.cmp(&right)
    }
}

impl<F> KeyComparator for F
where
    F: Fn(Key, Key) -> Ordering + Send + Sync,
{
    fn compare(&self, left: Key, right: Key) -> Ordering {
        self(left, right)
    }
}

/// Contract shared by every storage backend.
///
/// Implementations hold one exclusive lock for the full duration of each
/// call. Payloads leave the container by value; callers never see
/// references into its internals beyond the lifetime of a `traverse` visit.
pub trait KeyedStorage<V>: Send + Sync {
    /// Insert or overwrite the payload for `key`.
    ///
    /// Returns the replaced payload if the key was already present.
    fn insert(&self, key: Key, value: V) -> Result<Option<V>, StorageError>;

    /// Look up the payload stored for `key`.
    fn search(&self, key: Key) -> Result<V, StorageError>
    where
        V: Clone;

    /// Remove `key` and return its payload.
    fn delete(&self, key: Key) -> Result<V, StorageError>;

    /// Visit every live entry exactly once.
    ///
    /// The visitor runs while the storage lock is held and must not call
    /// back into the same storage.
    fn traverse(&self, visit: &mut dyn FnMut(&Entry<V>)) -> Result<(), StorageError>;

    /// Number of live entries.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reject the sentinel key before touching any container state.
pub(crate) const fn check_key(key: Key) -> Result<(), StorageError> {
    if key == SENTINEL_KEY {
        return Err(StorageError::InvalidKey);
    }
    Ok(())
}

/// Errors returned by storage backends.
///
/// Every error is reported before any structural change, so a failed call
/// leaves the container untouched.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// The reserved sentinel key was presented.
    #[error("key 0 is reserved and cannot be stored")]
    InvalidKey,
    /// A search missed.
    #[error("key {0} not found")]
    NotFound(Key),
    /// A delete was attempted on storage holding no entries.
    #[error("storage is not initialized, insert entries before deleting")]
    UninitializedStorage,
    /// A delete named a key that is not stored.
    #[error("cannot delete key {0}: not found")]
    KeyNotFound(Key),
    /// The requested B-tree degree is below the minimum of 2.
    #[error("invalid degree {0}: must be at least 2")]
    InvalidDegree(usize),
}
