//! The locked B-tree container.
//!
//! `BTreeStorage` owns the root node and serializes every public operation,
//! reads included, behind one `parking_lot::Mutex`. All structural mutation
//! happens below the lock in [`Node`].

use parking_lot::Mutex;

use crate::storage::btree::node::{Node, max_children, max_entries, min_entries};
use crate::storage::{
    Entry, Key, KeyComparator, KeyedStorage, NaturalOrder, SENTINEL_KEY, StorageError, check_key,
};

/// Default branching factor.
pub const DEFAULT_DEGREE: usize = 2;

/// Size summary of a tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TreeStats {
    /// Live entries.
    pub entries: usize,
    /// Allocated nodes.
    pub nodes: usize,
    /// Levels from root to leaves; 0 for an empty tree.
    pub height: usize,
}

/// A B-tree keyed by nonzero integers.
///
/// # Invariants
///
/// Between operations:
/// - entries within a node are strictly ascending; no key appears twice
/// - every node holds at most `2·degree − 1` entries, every non-root node at
///   least `degree − 1`
/// - internal nodes have one more child than entries
/// - all leaves sit at the same depth
/// - the root is `None` exactly when the tree is empty
pub struct BTreeStorage<V, C = NaturalOrder> {
    root: Mutex<Option<Node<V>>>,
    degree: usize,
    comparator: C,
}

impl<V> BTreeStorage<V> {
    /// Create an empty tree ordered by ascending key.
    pub fn new(degree: usize) -> Result<Self, StorageError> {
        Self::with_comparator(degree, NaturalOrder)
    }
}

impl<V, C: KeyComparator> BTreeStorage<V, C> {
    /// Create an empty tree ordered by `comparator`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InvalidDegree` if `degree < 2`.
    pub fn with_comparator(degree: usize, comparator: C) -> Result<Self, StorageError> {
        if degree < 2 {
            return Err(StorageError::InvalidDegree(degree));
        }
        Ok(Self {
            root: Mutex::new(None),
            degree,
            comparator,
        })
    }

    /// The branching factor fixed at construction.
    #[must_use]
    pub const fn degree(&self) -> usize {
        self.degree
    }

    /// Insert or overwrite the payload for `key`.
    ///
    /// A full root is split before descending; that is the only point at
    /// which the tree grows taller.
    pub fn insert(&self, key: Key, value: V) -> Result<Option<V>, StorageError> {
        check_key(key)?;
        let degree = self.degree;
        let mut root = self.root.lock();

        let node = match root.take() {
            None => {
                let mut leaf = Node::new_leaf(degree);
                leaf.entries.push(Entry::new(key, value));
                *root = Some(leaf);
                return Ok(None);
            }
            Some(mut node) if node.is_full(degree) => {
                let (median, sibling) = node.split(degree);
                tracing::trace!(median = median.key, "splitting full root");
                Node::new_root(degree, node, median, sibling)
            }
            Some(node) => node,
        };

        let node = root.insert(node);
        Ok(node.insert(Entry::new(key, value), degree, &self.comparator))
    }

    /// Look up the payload stored for `key`.
    ///
    /// # Errors
    ///
    /// `InvalidKey` for the sentinel key, `NotFound` on a miss.
    pub fn search(&self, key: Key) -> Result<V, StorageError>
    where
        V: Clone,
    {
        check_key(key)?;
        let root = self.root.lock();

        let mut current = root.as_ref();
        while let Some(node) = current {
            match node.search(key, &self.comparator) {
                Ok(pos) => return Ok(node.entries[pos].value.clone()),
                Err(pos) => current = node.children.get(pos),
            }
        }
        Err(StorageError::NotFound(key))
    }

    /// Remove `key` and return its payload.
    ///
    /// # Errors
    ///
    /// `UninitializedStorage` on an empty tree, `InvalidKey` for the
    /// sentinel key, `KeyNotFound` when the key is absent. A failed delete
    /// leaves the tree unchanged.
    pub fn delete(&self, key: Key) -> Result<V, StorageError> {
        let mut root = self.root.lock();
        let Some(node) = root.as_mut() else {
            return Err(StorageError::UninitializedStorage);
        };
        check_key(key)?;

        let removed = node
            .remove(key, self.degree, &self.comparator)
            .ok_or(StorageError::KeyNotFound(key))?;

        if node.len() == 0 {
            if node.is_leaf() {
                *root = None;
            } else {
                tracing::trace!("collapsing empty root");
                let child = node.children.pop();
                *root = child;
            }
        }

        Ok(removed.value)
    }

    /// Visit every live entry exactly once.
    ///
    /// The order is node-major: a node's own entries in ascending order,
    /// then each of its children from left to right. Globally this is not
    /// sorted; only the entries of a single node are.
    pub fn traverse(&self, visit: &mut dyn FnMut(&Entry<V>)) {
        let root = self.root.lock();
        if let Some(node) = root.as_ref() {
            node.traverse(visit);
        }
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.root.lock().as_ref().map_or(0, Node::entry_count)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.root.lock().is_none()
    }

    /// Entry, node and level counts.
    #[must_use]
    pub fn stats(&self) -> TreeStats {
        let root = self.root.lock();
        root.as_ref().map_or_else(TreeStats::default, |node| TreeStats {
            entries: node.entry_count(),
            nodes: node.node_count(),
            height: node.height(),
        })
    }

    /// Keys grouped by level, then by node, left to right.
    ///
    /// `layout()[0]` is the root level and always holds a single node when
    /// the tree is non-empty.
    #[must_use]
    pub fn layout(&self) -> Vec<Vec<Vec<Key>>> {
        let root = self.root.lock();
        let mut levels = Vec::new();
        if let Some(node) = root.as_ref() {
            node.collect_layout(0, &mut levels);
        }
        levels
    }

    /// Check every structural invariant and return the tree's stats.
    ///
    /// # Errors
    ///
    /// Returns the first violation found, walking depth-first from the root.
    pub fn validate(&self) -> Result<TreeStats, InvariantViolation> {
        let root = self.root.lock();
        let Some(node) = root.as_ref() else {
            return Ok(TreeStats::default());
        };

        let mut walk = Validation {
            degree: self.degree,
            comparator: &self.comparator,
            leaf_depth: None,
        };
        walk.check(node, 0, None, None)?;

        Ok(TreeStats {
            entries: node.entry_count(),
            nodes: node.node_count(),
            height: node.height(),
        })
    }
}

/// Depth-first invariant walk.
struct Validation<'a, C> {
    degree: usize,
    comparator: &'a C,
    leaf_depth: Option<usize>,
}

impl<C: KeyComparator> Validation<'_, C> {
    fn check<V>(
        &mut self,
        node: &Node<V>,
        depth: usize,
        lower: Option<Key>,
        upper: Option<Key>,
    ) -> Result<(), InvariantViolation> {
        let count = node.entries.len();
        if count > max_entries(self.degree) {
            return Err(InvariantViolation::Overfull { depth, count });
        }
        if depth > 0 && count < min_entries(self.degree) {
            return Err(InvariantViolation::Underfull { depth, count });
        }
        if depth == 0 && count == 0 {
            return Err(InvariantViolation::EmptyRoot);
        }

        let mut previous = lower;
        for entry in &node.entries {
            if entry.key == SENTINEL_KEY {
                return Err(InvariantViolation::SentinelKey { depth });
            }
            if let Some(prev) = previous {
                if self.comparator.compare(prev, entry.key).is_ge() {
                    return Err(InvariantViolation::OutOfOrder {
                        depth,
                        previous: prev,
                        key: entry.key,
                    });
                }
            }
            previous = Some(entry.key);
        }
        if let (Some(last), Some(bound)) = (previous, upper) {
            if self.comparator.compare(last, bound).is_ge() {
                return Err(InvariantViolation::OutOfOrder {
                    depth,
                    previous: last,
                    key: bound,
                });
            }
        }

        if node.is_leaf() {
            return match self.leaf_depth {
                None => {
                    self.leaf_depth = Some(depth);
                    Ok(())
                }
                Some(expected) if expected == depth => Ok(()),
                Some(expected) => Err(InvariantViolation::UnevenLeaves {
                    expected,
                    found: depth,
                }),
            };
        }

        if node.children.len() != count + 1 || node.children.len() > max_children(self.degree) {
            return Err(InvariantViolation::ChildCount {
                depth,
                entries: count,
                children: node.children.len(),
            });
        }

        for (i, child) in node.children.iter().enumerate() {
            let child_lower = if i == 0 { lower } else { Some(node.entries[i - 1].key) };
            let child_upper = node.entries.get(i).map_or(upper, |entry| Some(entry.key));
            self.check(child, depth + 1, child_lower, child_upper)?;
        }
        Ok(())
    }
}

/// A structural invariant that does not hold.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("node at depth {depth} holds {count} entries, above the maximum")]
    Overfull { depth: usize, count: usize },
    #[error("node at depth {depth} holds {count} entries, below the minimum")]
    Underfull { depth: usize, count: usize },
    #[error("root node holds no entries")]
    EmptyRoot,
    #[error("sentinel key stored at depth {depth}")]
    SentinelKey { depth: usize },
    #[error("key {key} at depth {depth} does not follow {previous}")]
    OutOfOrder {
        depth: usize,
        previous: Key,
        key: Key,
    },
    #[error("internal node at depth {depth} has {entries} entries and {children} children")]
    ChildCount {
        depth: usize,
        entries: usize,
        children: usize,
    },
    #[error("leaf at depth {found}, expected every leaf at depth {expected}")]
    UnevenLeaves { expected: usize, found: usize },
}

impl<V: Send, C: KeyComparator> KeyedStorage<V> for BTreeStorage<V, C> {
    fn insert(&self, key: Key, value: V) -> Result<Option<V>, StorageError> {
        Self::insert(self, key, value)
    }

    fn search(&self, key: Key) -> Result<V, StorageError>
    where
        V: Clone,
    {
        Self::search(self, key)
    }

    fn delete(&self, key: Key) -> Result<V, StorageError> {
        Self::delete(self, key)
    }

    fn traverse(&self, visit: &mut dyn FnMut(&Entry<V>)) -> Result<(), StorageError> {
        Self::traverse(self, visit);
        Ok(())
    }

    fn len(&self) -> usize {
        Self::len(self)
    }
}
