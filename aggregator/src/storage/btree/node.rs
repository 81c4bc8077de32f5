//! B-tree node layout and the structural operations on it.
//!
//! A node holds up to `2·degree − 1` entries sorted by key and, when
//! internal, exactly one more child than it has entries. A node is a leaf
//! iff it has no children; nothing else records the distinction.
//!
//! Children are owned outright by their parent. Splits, borrows and merges
//! move entries and child nodes between owners instead of aliasing them.

use std::cmp::Ordering;
use std::mem;

use crate::storage::{Entry, Key, KeyComparator};

/// Maximum number of entries a node may hold.
#[must_use]
pub const fn max_entries(degree: usize) -> usize {
    2 * degree - 1
}

/// Maximum number of children an internal node may hold.
#[must_use]
pub const fn max_children(degree: usize) -> usize {
    2 * degree
}

/// Minimum number of entries in a non-root node.
#[must_use]
pub const fn min_entries(degree: usize) -> usize {
    degree - 1
}

/// A single B-tree node.
#[derive(Debug)]
pub struct Node<V> {
    /// Entries in ascending key order.
    pub(crate) entries: Vec<Entry<V>>,
    /// Child nodes. Empty for leaves, `entries.len() + 1` otherwise.
    pub(crate) children: Vec<Node<V>>,
}

impl<V> Node<V> {
    /// Create an empty leaf sized for `degree`.
    #[must_use]
    pub fn new_leaf(degree: usize) -> Self {
        Self {
            entries: Vec::with_capacity(max_entries(degree)),
            children: Vec::new(),
        }
    }

    /// Create a root holding a single separator between two subtrees.
    ///
    /// This is the only way the tree grows in height.
    #[must_use]
    pub fn new_root(degree: usize, left: Self, separator: Entry<V>, right: Self) -> Self {
        let mut entries = Vec::with_capacity(max_entries(degree));
        entries.push(separator);
        let mut children = Vec::with_capacity(max_children(degree));
        children.push(left);
        children.push(right);
        Self { entries, children }
    }

    #[must_use]
    pub const fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub const fn is_full(&self, degree: usize) -> bool {
        self.entries.len() >= max_entries(degree)
    }

    /// Binary search for `key` among this node's entries.
    ///
    /// `Ok(i)` is an exact match at `i`; `Err(i)` is the insertion position,
    /// which for an internal node is also the child to descend into.
    pub fn search<C: KeyComparator + ?Sized>(&self, key: Key, cmp: &C) -> Result<usize, usize> {
        self.entries
            .binary_search_by(|entry| cmp.compare(entry.key, key))
    }

    /// Split a full node around its median.
    ///
    /// The median (index `degree − 1`) is returned for the caller to push
    /// up. Everything after it, and the trailing children of an internal
    /// node, move into the returned sibling. Both halves end with exactly
    /// `degree − 1` entries.
    pub fn split(&mut self, degree: usize) -> (Entry<V>, Self) {
        let median = min_entries(degree);

        let mut right_entries = Vec::with_capacity(max_entries(degree));
        right_entries.extend(self.entries.drain(median + 1..));

        let mut right_children = Vec::new();
        if !self.is_leaf() {
            right_children.reserve(max_children(degree));
            right_children.extend(self.children.drain(median + 1..));
        }

        let median_entry = self.entries.remove(median);

        (
            median_entry,
            Self {
                entries: right_entries,
                children: right_children,
            },
        )
    }

    /// Upsert below this node, which must not be full.
    ///
    /// Full children are split before descending into them, so a split never
    /// has to travel back up. Returns the replaced payload on overwrite.
    pub fn insert<C: KeyComparator + ?Sized>(
        &mut self,
        entry: Entry<V>,
        degree: usize,
        cmp: &C,
    ) -> Option<V> {
        let mut pos = match self.search(entry.key, cmp) {
            Ok(pos) => return Some(mem::replace(&mut self.entries[pos].value, entry.value)),
            Err(pos) => pos,
        };

        if self.is_leaf() {
            self.entries.insert(pos, entry);
            return None;
        }

        if self.children[pos].is_full(degree) {
            let (median, sibling) = self.children[pos].split(degree);
            self.entries.insert(pos, median);
            self.children.insert(pos + 1, sibling);

            match cmp.compare(entry.key, self.entries[pos].key) {
                Ordering::Less => {}
                Ordering::Greater => pos += 1,
                Ordering::Equal => {
                    return Some(mem::replace(&mut self.entries[pos].value, entry.value));
                }
            }
        }

        self.children[pos].insert(entry, degree, cmp)
    }

    /// Remove `key` from the subtree rooted here.
    ///
    /// Returns `None` when the key is absent; in that case nothing has been
    /// modified. Any child left below the minimum fill is repaired before
    /// returning, so only this node itself may end up underfull.
    pub fn remove<C: KeyComparator + ?Sized>(
        &mut self,
        key: Key,
        degree: usize,
        cmp: &C,
    ) -> Option<Entry<V>> {
        match self.search(key, cmp) {
            Ok(pos) if self.is_leaf() => Some(self.entries.remove(pos)),
            Ok(pos) => {
                // The separator stays in place; its in-order successor (the
                // minimum of the right subtree) takes over its slot.
                let successor = self.children[pos + 1].remove_min(degree);
                let removed = mem::replace(&mut self.entries[pos], successor);
                self.fix_underflow(pos + 1, degree);
                Some(removed)
            }
            Err(_) if self.is_leaf() => None,
            Err(pos) => {
                let removed = self.children[pos].remove(key, degree, cmp)?;
                self.fix_underflow(pos, degree);
                Some(removed)
            }
        }
    }

    /// Remove and return the smallest entry of this subtree.
    ///
    /// The subtree must be non-empty.
    fn remove_min(&mut self, degree: usize) -> Entry<V> {
        if self.is_leaf() {
            return self.entries.remove(0);
        }
        let min = self.children[0].remove_min(degree);
        self.fix_underflow(0, degree);
        min
    }

    /// Restore the minimum fill of `children[pos]` if it dropped below it.
    ///
    /// Borrowing from the right sibling is always tried first, then the left
    /// sibling; merging is the fallback when neither has a spare entry.
    fn fix_underflow(&mut self, pos: usize, degree: usize) {
        let min = min_entries(degree);
        if self.children[pos].len() >= min {
            return;
        }

        let has_right = pos + 1 < self.children.len();
        if has_right && self.children[pos + 1].len() > min {
            self.borrow_from_right(pos);
        } else if pos > 0 && self.children[pos - 1].len() > min {
            self.borrow_from_left(pos);
        } else if has_right {
            self.merge_children(pos);
        } else {
            self.merge_children(pos - 1);
        }
    }

    /// Rotate one entry from `children[pos + 1]` through the separator into
    /// `children[pos]`.
    fn borrow_from_right(&mut self, pos: usize) {
        let (head, tail) = self.children.split_at_mut(pos + 1);
        let child = &mut head[pos];
        let right = &mut tail[0];

        let up = right.entries.remove(0);
        let down = mem::replace(&mut self.entries[pos], up);
        child.entries.push(down);

        if !right.is_leaf() {
            child.children.push(right.children.remove(0));
        }
    }

    /// Rotate one entry from `children[pos - 1]` through the separator into
    /// `children[pos]`.
    fn borrow_from_left(&mut self, pos: usize) {
        let (head, tail) = self.children.split_at_mut(pos);
        let left = &mut head[pos - 1];
        let child = &mut tail[0];

        let up = left.entries.remove(left.entries.len() - 1);
        let down = mem::replace(&mut self.entries[pos - 1], up);
        child.entries.insert(0, down);

        if !left.is_leaf() {
            let last = left.children.len() - 1;
            child.children.insert(0, left.children.remove(last));
        }
    }

    /// Merge `children[pos + 1]` and the separator at `pos` into
    /// `children[pos]`. The right node is consumed.
    fn merge_children(&mut self, pos: usize) {
        let right = self.children.remove(pos + 1);
        let separator = self.entries.remove(pos);

        let left = &mut self.children[pos];
        left.entries.push(separator);
        left.entries.extend(right.entries);
        left.children.extend(right.children);
    }

    /// Node-major walk: this node's entries in order, then each child left
    /// to right.
    pub fn traverse(&self, visit: &mut dyn FnMut(&Entry<V>)) {
        for entry in &self.entries {
            visit(entry);
        }
        for child in &self.children {
            child.traverse(visit);
        }
    }

    /// Number of nodes in this subtree.
    #[must_use]
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(Self::node_count).sum::<usize>()
    }

    /// Number of entries in this subtree.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.entries.len() + self.children.iter().map(Self::entry_count).sum::<usize>()
    }

    /// Number of levels from this node down to its leaves, following the
    /// leftmost path.
    #[must_use]
    pub fn height(&self) -> usize {
        self.children.first().map_or(1, |child| 1 + child.height())
    }

    /// Collect keys per level, per node, left to right.
    pub(crate) fn collect_layout(&self, depth: usize, levels: &mut Vec<Vec<Vec<Key>>>) {
        if levels.len() <= depth {
            levels.push(Vec::new());
        }
        levels[depth].push(self.entries.iter().map(|entry| entry.key).collect());
        for child in &self.children {
            child.collect_layout(depth + 1, levels);
        }
    }
}
