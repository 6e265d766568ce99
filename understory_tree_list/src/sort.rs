// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Sibling ordering: sort mode, compare handler, sorted insertion, and resort.

use alloc::boxed::Box;
use alloc::vec;
use core::cmp::Ordering;

use crate::tree::{CompareFn, TreeList};
use crate::types::{EntryId, ListAction, Notification, SortMode};

fn directed(mode: SortMode, ordering: Ordering) -> Ordering {
    match mode {
        SortMode::Descending => ordering.reverse(),
        SortMode::Ascending | SortMode::None => ordering,
    }
}

impl<T> TreeList<T> {
    /// Set the sibling ordering used by [`TreeList::insert`] and [`TreeList::resort`].
    ///
    /// Changing the mode does not reorder anything by itself.
    pub fn set_sort_mode(&mut self, mode: SortMode) {
        self.sort_mode = mode;
    }

    /// The current sort mode.
    pub const fn sort_mode(&self) -> SortMode {
        self.sort_mode
    }

    /// Install the three-way comparison over sibling payloads.
    pub fn set_compare_handler(&mut self, compare: impl Fn(&T, &T) -> Ordering + 'static) {
        self.compare = Some(Box::new(compare));
    }

    /// Compare the payloads of two live entries with the compare handler.
    ///
    /// This is the raw handler result, independent of the sort mode. Without a
    /// handler every pair compares `Equal`. Returns `None` if either handle is stale.
    pub fn compare(&self, left: EntryId, right: EntryId) -> Option<Ordering> {
        let left = self.node_opt(left)?;
        let right = self.node_opt(right)?;
        Some(
            self.compare
                .as_deref()
                .map_or(Ordering::Equal, |compare| compare(&left.payload, &right.payload)),
        )
    }

    /// Returns true if insertions are placed by the compare handler.
    pub fn is_sorting(&self) -> bool {
        self.sort_mode != SortMode::None && self.compare.is_some()
    }

    /// The position [`TreeList::insert`] would give `payload` under `parent`.
    ///
    /// Binary search over the siblings, landing after every sibling that
    /// compares equal. Returns `None` when sorting is inactive, in which case
    /// `insert` uses the caller's position.
    pub fn insertion_pos(&self, parent: Option<EntryId>, payload: &T) -> Option<usize> {
        if self.sort_mode == SortMode::None {
            return None;
        }
        let compare = self.compare.as_deref()?;
        let siblings = self.children_of(parent);
        Some(siblings.partition_point(|&sibling| {
            directed(self.sort_mode, compare(&self.node(sibling).payload, payload))
                != Ordering::Greater
        }))
    }

    /// Re-sort every level of the tree.
    ///
    /// Each child list is sorted on its own with a stable sort, so siblings
    /// that compare equal keep their relative order and a second call changes
    /// nothing. With [`SortMode::None`] or no compare handler the order is
    /// left alone. Broadcasts [`ListAction::Resorting`] and
    /// [`ListAction::Resorted`] either way.
    pub fn resort(&mut self) {
        self.broadcast(Notification::new(ListAction::Resorting));
        let mode = self.sort_mode;
        if mode != SortMode::None
            && let Some(compare) = self.compare.take()
        {
            self.sort_levels(mode, &compare);
            self.compare = Some(compare);
            self.invalidate_abs_positions();
        }
        self.broadcast(Notification::new(ListAction::Resorted));
    }

    fn sort_levels(&mut self, mode: SortMode, compare: &CompareFn<T>) {
        let mut stack = vec![None];
        let mut levels = 0_usize;
        while let Some(parent) = stack.pop() {
            let mut list = core::mem::take(self.child_list_mut(parent));
            list.sort_by(|&a, &b| {
                directed(mode, compare(&self.node(a).payload, &self.node(b).payload))
            });
            stack.extend(
                list.iter()
                    .filter(|&&child| !self.node(child).children.is_empty())
                    .map(|&child| Some(child)),
            );
            *self.child_list_mut(parent) = list;
            self.renumber(parent, 0);
            levels += 1;
        }
        tracing::trace!(?mode, levels, "resorted");
    }
}

#[cfg(test)]
mod tests {
    use crate::{APPEND, SortMode, TreeList};
    use alloc::vec::Vec;
    use core::cmp::Ordering;

    fn keys(tree: &TreeList<(char, u32)>) -> Vec<char> {
        tree.iter().map(|id| tree.payload(id).unwrap().0).collect()
    }

    fn by_number(tree: &mut TreeList<(char, u32)>) {
        tree.set_compare_handler(|l: &(char, u32), r: &(char, u32)| l.1.cmp(&r.1));
    }

    #[test]
    fn resort_orders_top_level() {
        let mut tree = TreeList::new();
        let a = tree.insert(None, APPEND, ('A', 3)).unwrap();
        let b = tree.insert(None, APPEND, ('B', 1)).unwrap();
        let c = tree.insert(None, APPEND, ('C', 2)).unwrap();
        assert_eq!(tree.entry_at_abs_pos(0), Some(a));
        assert_eq!(tree.entry_at_abs_pos(1), Some(b));
        assert_eq!(tree.entry_at_abs_pos(2), Some(c));

        tree.set_sort_mode(SortMode::Ascending);
        by_number(&mut tree);
        tree.resort();
        assert_eq!(keys(&tree), ['B', 'C', 'A']);
        assert_eq!(tree.entry_at_abs_pos(0), Some(b));
        assert_eq!(tree.abs_pos(a), Some(2));
        assert_eq!(tree.rel_pos(c), Some(1));
    }

    #[test]
    fn resort_without_mode_keeps_order() {
        let mut tree = TreeList::new();
        by_number(&mut tree);
        for (k, n) in [('A', 3), ('B', 1), ('C', 2)] {
            tree.insert(None, APPEND, (k, n)).unwrap();
        }
        tree.resort();
        assert_eq!(keys(&tree), ['A', 'B', 'C']);
    }

    #[test]
    fn resort_descending_and_per_level() {
        let mut tree = TreeList::new();
        let p = tree.insert(None, APPEND, ('p', 0)).unwrap();
        let q = tree.insert(None, APPEND, ('q', 5)).unwrap();
        for (k, n) in [('x', 1), ('y', 3), ('z', 2)] {
            tree.insert(Some(p), APPEND, (k, n)).unwrap();
        }
        tree.set_sort_mode(SortMode::Descending);
        by_number(&mut tree);
        tree.resort();
        // Children are sorted among themselves only.
        assert_eq!(keys(&tree), ['q', 'p', 'y', 'z', 'x']);
        assert_eq!(tree.rel_pos(q), Some(0));

        let once = keys(&tree);
        tree.resort();
        assert_eq!(keys(&tree), once, "resort is idempotent");
    }

    #[test]
    fn resort_is_stable_for_equal_keys() {
        let mut tree = TreeList::new();
        for (k, n) in [('a', 1), ('b', 0), ('c', 1), ('d', 0)] {
            tree.insert(None, APPEND, (k, n)).unwrap();
        }
        tree.set_sort_mode(SortMode::Ascending);
        by_number(&mut tree);
        tree.resort();
        assert_eq!(keys(&tree), ['b', 'd', 'a', 'c']);
    }

    #[test]
    fn sorted_insert_lands_after_equals() {
        let mut tree = TreeList::new();
        tree.set_sort_mode(SortMode::Ascending);
        by_number(&mut tree);
        tree.insert(None, APPEND, ('a', 2)).unwrap();
        tree.insert(None, 0, ('b', 4)).unwrap();
        tree.insert(None, APPEND, ('c', 1)).unwrap();
        let d = tree.insert(None, 0, ('d', 2)).unwrap();
        assert_eq!(keys(&tree), ['c', 'a', 'd', 'b']);
        assert_eq!(tree.rel_pos(d), Some(2));
        assert_eq!(tree.insertion_pos(None, &('?', 3)), Some(3));
        assert_eq!(tree.insertion_pos(None, &('?', 0)), Some(0));
    }

    #[test]
    fn sorted_insert_descending() {
        let mut tree = TreeList::new();
        tree.set_sort_mode(SortMode::Descending);
        by_number(&mut tree);
        for (k, n) in [('a', 1), ('b', 3), ('c', 2)] {
            tree.insert(None, APPEND, (k, n)).unwrap();
        }
        assert_eq!(keys(&tree), ['b', 'c', 'a']);
    }

    #[test]
    fn insertion_pos_inactive_without_handler_or_mode() {
        let mut tree: TreeList<(char, u32)> = TreeList::new();
        tree.set_sort_mode(SortMode::Ascending);
        assert!(!tree.is_sorting());
        assert_eq!(tree.insertion_pos(None, &('a', 1)), None);
        by_number(&mut tree);
        assert!(tree.is_sorting());
        tree.set_sort_mode(SortMode::None);
        assert_eq!(tree.insertion_pos(None, &('a', 1)), None);
    }

    #[test]
    fn compare_is_raw_handler_result() {
        let mut tree = TreeList::new();
        let a = tree.insert(None, APPEND, ('a', 1)).unwrap();
        let b = tree.insert(None, APPEND, ('b', 2)).unwrap();
        assert_eq!(tree.compare(a, b), Some(Ordering::Equal));
        by_number(&mut tree);
        tree.set_sort_mode(SortMode::Descending);
        assert_eq!(tree.compare(a, b), Some(Ordering::Less));
        tree.remove(b);
        assert_eq!(tree.compare(a, b), None);
    }
}
