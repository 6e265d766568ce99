// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Entry storage and detached subtrees.

use alloc::vec;
use alloc::vec::Vec;

use crate::types::{EntryFlags, EntryId};

#[derive(Clone, Debug)]
pub(crate) struct Entry<T> {
    pub(crate) generation: u32,
    /// `None` for top-level entries.
    pub(crate) parent: Option<EntryId>,
    pub(crate) children: Vec<EntryId>,
    /// Index in the parent's child list. Kept current on every list mutation.
    pub(crate) list_pos: usize,
    /// Pre-order index; only meaningful while the tree's absolute cache is valid.
    pub(crate) abs_pos: usize,
    pub(crate) flags: EntryFlags,
    pub(crate) payload: T,
}

impl<T> Entry<T> {
    pub(crate) fn new(generation: u32, flags: EntryFlags, payload: T) -> Self {
        Self {
            generation,
            parent: None,
            children: Vec::new(),
            list_pos: 0,
            abs_pos: 0,
            flags,
            payload,
        }
    }
}

/// A detached subtree, ready to be spliced in with
/// [`TreeList::insert_tree`](crate::TreeList::insert_tree).
///
/// Children keep the order given here; they are not re-sorted on insertion.
/// [`TreeList::insert_tree`](crate::TreeList::insert_tree) and
/// [`TreeList::copy`](crate::TreeList::copy) handle subtrees of any depth.
/// The derived `Clone`, `PartialEq`, and `Debug`, and dropping a `Subtree`
/// that was never inserted, recurse once per level.
///
/// ```rust
/// use understory_tree_list::{APPEND, Subtree, TreeList};
///
/// let mut tree = TreeList::new();
/// let folder = Subtree::new("src").with_child(Subtree::new("lib.rs"));
/// let root = tree.insert_tree(folder, None, APPEND).unwrap();
/// assert_eq!(tree.child_count(Some(root)), 1);
/// assert_eq!(tree.entry_count(), 2);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Subtree<T> {
    /// Payload of the subtree root.
    pub payload: T,
    /// Flags of the subtree root.
    pub flags: EntryFlags,
    /// Child subtrees in order.
    pub children: Vec<Self>,
}

impl<T> Subtree<T> {
    /// Create a leaf with default flags.
    pub fn new(payload: T) -> Self {
        Self {
            payload,
            flags: EntryFlags::empty(),
            children: Vec::new(),
        }
    }

    /// Append a child subtree.
    #[must_use]
    pub fn with_child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }

    /// Replace the root's flags.
    #[must_use]
    pub fn with_flags(mut self, flags: EntryFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Number of entries in the subtree, including its root.
    pub fn len(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(subtree) = stack.pop() {
            count += 1;
            stack.extend(subtree.children.iter());
        }
        count
    }

    /// Always `false`; a subtree has at least its root.
    pub fn is_empty(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subtree_len_counts_every_node() {
        let s = Subtree::new(0)
            .with_child(Subtree::new(1).with_child(Subtree::new(2)))
            .with_child(Subtree::new(3));
        assert_eq!(s.len(), 4);
        assert_eq!(s.children.len(), 2);
    }

    #[test]
    fn subtree_flags() {
        let s = Subtree::new(()).with_flags(EntryFlags::CHILDREN_ON_DEMAND);
        assert!(s.flags.contains(EntryFlags::CHILDREN_ON_DEMAND));
    }
}
