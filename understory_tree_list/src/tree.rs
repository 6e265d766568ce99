// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core tree implementation: structure, traversal, absolute positions, broadcasting.

use alloc::boxed::Box;
use alloc::vec;
use alloc::vec::Vec;
use core::cmp::Ordering;
use core::ops::{Deref, DerefMut};

use smallvec::SmallVec;

use crate::entry::{Entry, Subtree};
use crate::error::TreeError;
use crate::types::{EntryFlags, EntryId, ListAction, Notification, SortMode, ViewId};
use crate::view::ViewSlot;

pub(crate) type CompareFn<T> = Box<dyn Fn(&T, &T) -> Ordering>;
pub(crate) type CloneFn<T> = Box<dyn Fn(&T) -> T>;

/// Hierarchical list model shared by any number of views.
///
/// The tree exclusively owns its entries, addressed by generational
/// [`EntryId`]s. Top-level entries hang off an implicit root that is never
/// exposed; APIs that take a parent use `None` for it.
///
/// Every structural mutation clears a single tree-wide "absolute positions
/// valid" bit. The first position query afterwards rebuilds the whole cache in
/// one pre-order pass, so repeated queries between mutations are O(1). Those
/// queries take `&mut self` for that reason.
///
/// Mutations are broadcast as [`Notification`]s to every registered view, in
/// registration order, before the call returns. See [`TreeList::add_view`].
///
/// ## Example
///
/// ```rust
/// use understory_tree_list::{APPEND, TreeList};
///
/// let mut tree = TreeList::new();
/// let a = tree.insert(None, APPEND, "a").unwrap();
/// let b = tree.insert(Some(a), APPEND, "b").unwrap();
/// let c = tree.insert(None, APPEND, "c").unwrap();
///
/// assert_eq!(tree.abs_pos(c), Some(2));
/// assert_eq!(tree.entry_at_abs_pos(1), Some(b));
///
/// // Only `a` and `c` are visible until `a` is expanded.
/// let view = tree.owner_view();
/// assert_eq!(tree.visible_count(view), 2);
/// tree.expand(view, a);
/// assert_eq!(tree.visible_pos(view, c), Some(2));
/// ```
pub struct TreeList<T> {
    /// slots
    entries: Vec<Option<Entry<T>>>,
    /// last generation per slot (persists across frees)
    generations: Vec<u32>,
    free_list: Vec<usize>,
    /// children of the implicit root
    roots: Vec<EntryId>,
    entry_count: usize,
    abs_positions_valid: bool,
    /// pre-order snapshot backing `entry_at_abs_pos`
    abs_order: Vec<EntryId>,
    pub(crate) sort_mode: SortMode,
    pub(crate) compare: Option<CompareFn<T>>,
    clone: Option<CloneFn<T>>,
    invalidate_enabled: bool,
    pub(crate) views: Vec<Option<ViewSlot<T>>>,
}

impl<T> core::fmt::Debug for TreeList<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let views = self.views.iter().filter(|v| v.is_some()).count();
        f.debug_struct("TreeList")
            .field("entry_count", &self.entry_count)
            .field("slots_total", &self.entries.len())
            .field("free_list", &self.free_list.len())
            .field("abs_positions_valid", &self.abs_positions_valid)
            .field("sort_mode", &self.sort_mode)
            .field("invalidate_enabled", &self.invalidate_enabled)
            .field("views", &views)
            .finish_non_exhaustive()
    }
}

impl<T> Default for TreeList<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of [`TreeList::copy`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Copied {
    /// Root of the inserted copy.
    pub entry: EntryId,
    /// Number of entries cloned (one clone handler call each).
    pub count: usize,
}

impl<T> TreeList<T> {
    /// Create an empty tree with its owner view registered.
    ///
    /// The owner view lives as long as the tree; see [`TreeList::owner_view`].
    pub fn new() -> Self {
        let mut tree = Self {
            entries: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            roots: Vec::new(),
            entry_count: 0,
            abs_positions_valid: true,
            abs_order: Vec::new(),
            sort_mode: SortMode::None,
            compare: None,
            clone: None,
            invalidate_enabled: true,
            views: Vec::new(),
        };
        tree.views.push(Some(ViewSlot::new(None)));
        tree
    }

    /// The view created together with this tree. It cannot be removed.
    pub const fn owner_view(&self) -> ViewId {
        ViewId(0)
    }

    /// Number of live entries.
    pub const fn entry_count(&self) -> usize {
        self.entry_count
    }

    /// Returns true if the tree holds no entries.
    pub const fn is_empty(&self) -> bool {
        self.entry_count == 0
    }

    // --- structure ---

    /// Insert `payload` as a child of `parent` (top level if `None`) at `pos`.
    ///
    /// `pos` may be [`APPEND`](crate::APPEND) or any index past the end to
    /// append. When a sort mode other than [`SortMode::None`] and a compare
    /// handler are set, `pos` is ignored and the entry is placed after all
    /// siblings that compare less than or equal to it.
    ///
    /// Broadcasts [`ListAction::Inserted`].
    pub fn insert(
        &mut self,
        parent: Option<EntryId>,
        pos: usize,
        payload: T,
    ) -> Result<EntryId, TreeError> {
        self.check_parent(parent)?;
        let pos = self.insertion_pos(parent, &payload).unwrap_or(pos);
        let id = self.alloc(EntryFlags::empty(), payload);
        let pos = self.link(id, parent, pos);
        self.entry_count += 1;
        self.abs_positions_valid = false;
        self.broadcast(Notification::for_entry(ListAction::Inserted, id).with_target(parent, pos));
        Ok(id)
    }

    /// Splice a detached [`Subtree`] under `parent` at `pos`.
    ///
    /// The subtree keeps its internal order and its root is placed at `pos`
    /// regardless of the sort mode. Broadcasts [`ListAction::InsertedTree`]
    /// once, for the subtree root.
    pub fn insert_tree(
        &mut self,
        subtree: Subtree<T>,
        parent: Option<EntryId>,
        pos: usize,
    ) -> Result<EntryId, TreeError> {
        self.check_parent(parent)?;
        let (id, count) = self.adopt(subtree);
        let pos = self.link(id, parent, pos);
        self.entry_count += count;
        self.abs_positions_valid = false;
        self.broadcast(
            Notification::for_entry(ListAction::InsertedTree, id).with_target(parent, pos),
        );
        Ok(id)
    }

    /// Move `source` (with its subtree) under `target` at `pos`.
    ///
    /// `pos` indexes the target's child list as it is before `source` is
    /// detached, so moving an entry to the position it already occupies (or the
    /// one right after it) changes nothing and broadcasts nothing. Returns the
    /// final position among the new siblings.
    ///
    /// Fails with [`TreeError::WouldCycle`] when `target` is `source` or lies
    /// anywhere inside its subtree; the tree is left untouched and nothing is
    /// broadcast. Otherwise broadcasts [`ListAction::Moving`] while `source`
    /// is still attached and [`ListAction::Moved`] afterwards.
    pub fn move_entry(
        &mut self,
        source: EntryId,
        target: Option<EntryId>,
        pos: usize,
    ) -> Result<usize, TreeError> {
        self.check_alive(source)?;
        self.check_parent(target)?;
        if let Some(t) = target
            && (t == source || self.is_descendant(t, source))
        {
            tracing::debug!(moved = ?source, target = ?t, "rejected move into own subtree");
            return Err(TreeError::WouldCycle {
                moved: source,
                target: t,
            });
        }

        let (old_parent, old_pos) = {
            let n = self.node(source);
            (n.parent, n.list_pos)
        };
        let mut pos = pos.min(self.child_list(target).len());
        if old_parent == target && (pos == old_pos || pos == old_pos + 1) {
            return Ok(old_pos);
        }

        self.broadcast(
            Notification::for_entry(ListAction::Moving, source).with_target(target, pos),
        );
        self.unlink(source);
        if old_parent == target && pos > old_pos {
            pos -= 1;
        }
        let pos = self.link(source, target, pos);
        self.abs_positions_valid = false;
        self.broadcast(Notification::for_entry(ListAction::Moved, source).with_target(target, pos));
        Ok(pos)
    }

    /// Move `source` directly after `anchor` among the anchor's siblings.
    ///
    /// With `anchor == None` the entry becomes the first top-level entry.
    pub fn move_after(
        &mut self,
        source: EntryId,
        anchor: Option<EntryId>,
    ) -> Result<usize, TreeError> {
        let Some(anchor) = anchor else {
            return self.move_entry(source, None, 0);
        };
        let (parent, pos) = {
            let n = self.node_opt(anchor).ok_or(TreeError::StaleEntry(anchor))?;
            (n.parent, n.list_pos + 1)
        };
        self.move_entry(source, parent, pos)
    }

    /// Deep-copy `source` through the clone handler and insert the copy under
    /// `target` at `pos`.
    ///
    /// The clone handler runs once per entry in post-order, so every child is
    /// cloned before its parent. Entry flags are copied as they are. The copy is
    /// inserted like [`TreeList::insert_tree`] and broadcasts
    /// [`ListAction::InsertedTree`].
    pub fn copy(
        &mut self,
        source: EntryId,
        target: Option<EntryId>,
        pos: usize,
    ) -> Result<Copied, TreeError> {
        self.check_parent(target)?;
        let mut count = 0;
        let subtree = self.clone_counted(source, &mut count)?;
        let entry = self.insert_tree(subtree, target, pos)?;
        Ok(Copied { entry, count })
    }

    /// Remove `id` and its whole subtree.
    ///
    /// Broadcasts [`ListAction::Removing`] while the subtree is still linked,
    /// so views can purge their state, and [`ListAction::Removed`] once every
    /// handle in it is stale. Returns `false` if `id` is not part of this tree.
    pub fn remove(&mut self, id: EntryId) -> bool {
        if !self.is_alive(id) {
            tracing::debug!(entry = ?id, "remove of stale entry");
            return false;
        }
        let (parent, pos) = {
            let n = self.node(id);
            (n.parent, n.list_pos)
        };
        self.broadcast(Notification::for_entry(ListAction::Removing, id).with_target(parent, pos));
        self.unlink(id);
        let freed = self.free_subtree(id);
        self.entry_count -= freed;
        self.abs_positions_valid = false;
        self.broadcast(Notification::for_entry(ListAction::Removed, id).with_target(parent, pos));
        true
    }

    /// Remove every entry.
    ///
    /// Always bracketed by [`ListAction::Clearing`] and [`ListAction::Cleared`].
    pub fn clear(&mut self) {
        self.broadcast(Notification::new(ListAction::Clearing));
        for (idx, slot) in self.entries.iter_mut().enumerate() {
            if slot.take().is_some() {
                self.free_list.push(idx);
            }
        }
        self.roots.clear();
        self.abs_order.clear();
        self.entry_count = 0;
        self.abs_positions_valid = false;
        self.broadcast(Notification::new(ListAction::Cleared));
    }

    // --- cloning ---

    /// Install the handler used by [`TreeList::copy`] to duplicate a payload.
    pub fn set_clone_handler(&mut self, clone: impl Fn(&T) -> T + 'static) {
        self.clone = Some(Box::new(clone));
    }

    /// Clone a single payload through the clone handler.
    ///
    /// Returns `None` for stale entries or when no handler is set.
    pub fn clone_entry(&self, id: EntryId) -> Option<T> {
        let clone = self.clone.as_deref()?;
        self.node_opt(id).map(|n| clone(&n.payload))
    }

    /// Clone the subtree rooted at `id` into a detached [`Subtree`].
    pub fn clone_subtree(&self, id: EntryId) -> Result<Subtree<T>, TreeError> {
        let mut count = 0;
        self.clone_counted(id, &mut count)
    }

    fn clone_counted(&self, id: EntryId, count: &mut usize) -> Result<Subtree<T>, TreeError> {
        self.check_alive(id)?;
        let Some(clone) = self.clone.as_deref() else {
            tracing::debug!(entry = ?id, "copy without clone handler");
            return Err(TreeError::NoCloneHandler);
        };
        Ok(self.clone_post_order(id, clone, count))
    }

    /// Clone the subtree at `id` in post-order with an explicit two-phase stack.
    fn clone_post_order(
        &self,
        id: EntryId,
        clone: &dyn Fn(&T) -> T,
        count: &mut usize,
    ) -> Subtree<T> {
        // (entry, children already cloned)
        let mut pending: Vec<(EntryId, bool)> = vec![(id, false)];
        let mut built: Vec<Subtree<T>> = Vec::new();
        while let Some((current, finished)) = pending.pop() {
            let node = self.node(current);
            if !finished {
                pending.push((current, true));
                pending.extend(node.children.iter().rev().map(|&child| (child, false)));
                continue;
            }
            let children = built.split_off(built.len() - node.children.len());
            *count += 1;
            built.push(Subtree {
                payload: clone(&node.payload),
                flags: node.flags,
                children,
            });
        }
        debug_assert_eq!(built.len(), 1, "post-order walk leaves only the root");
        built.pop().expect("post-order walk yields the root")
    }

    // --- entry data ---

    /// Returns true if `id` refers to a live entry of this tree.
    pub fn is_alive(&self, id: EntryId) -> bool {
        self.node_opt(id).is_some()
    }

    /// The payload of a live entry.
    pub fn payload(&self, id: EntryId) -> Option<&T> {
        self.node_opt(id).map(|n| &n.payload)
    }

    /// Mutable access to the payload of a live entry.
    ///
    /// Changing a payload does not re-sort its siblings; call
    /// [`TreeList::resort`] if the sort key changed, or
    /// [`TreeList::invalidate_entry`] to let views refresh it.
    pub fn payload_mut(&mut self, id: EntryId) -> Option<&mut T> {
        self.node_opt_mut(id).map(|n| &mut n.payload)
    }

    /// The flags of a live entry.
    pub fn entry_flags(&self, id: EntryId) -> Option<EntryFlags> {
        self.node_opt(id).map(|n| n.flags)
    }

    /// Update the flags of a live entry.
    pub fn set_entry_flags(&mut self, id: EntryId, flags: EntryFlags) {
        if let Some(n) = self.node_opt_mut(id) {
            n.flags = flags;
        }
    }

    // --- relationships ---

    /// Returns the parent of a live entry, or `None` for top-level or stale entries.
    pub fn parent_of(&self, id: EntryId) -> Option<EntryId> {
        self.node_opt(id).and_then(|n| n.parent)
    }

    /// The ordered children of `parent` (top level if `None`), or an empty
    /// slice for a stale parent.
    pub fn children_of(&self, parent: Option<EntryId>) -> &[EntryId] {
        match parent {
            None => &self.roots,
            Some(p) => self.node_opt(p).map_or(&[], |n| &n.children),
        }
    }

    /// First child of `parent` (first top-level entry if `None`).
    pub fn first_child(&self, parent: Option<EntryId>) -> Option<EntryId> {
        self.children_of(parent).first().copied()
    }

    /// Number of immediate children of `parent`.
    pub fn child_count(&self, parent: Option<EntryId>) -> usize {
        self.children_of(parent).len()
    }

    /// Number of entries below `parent`, at any depth.
    ///
    /// `None` counts the whole tree.
    pub fn descendant_count(&self, parent: Option<EntryId>) -> usize {
        let Some(parent) = parent else {
            return self.entry_count;
        };
        if !self.is_alive(parent) {
            return 0;
        }
        let mut count = 0;
        let mut stack: SmallVec<[EntryId; 16]> = SmallVec::new();
        stack.extend(self.node(parent).children.iter().copied());
        while let Some(id) = stack.pop() {
            count += 1;
            stack.extend(self.node(id).children.iter().copied());
        }
        count
    }

    /// The child of `parent` at `pos`.
    pub fn entry_at(&self, parent: Option<EntryId>, pos: usize) -> Option<EntryId> {
        self.children_of(parent).get(pos).copied()
    }

    /// Position of a live entry among its siblings.
    pub fn rel_pos(&self, id: EntryId) -> Option<usize> {
        self.node_opt(id).map(|n| n.list_pos)
    }

    /// Number of ancestors of a live entry; top-level entries have depth 0.
    pub fn depth(&self, id: EntryId) -> Option<usize> {
        let mut node = self.node_opt(id)?;
        let mut depth = 0;
        while let Some(parent) = node.parent {
            depth += 1;
            node = self.node(parent);
        }
        Some(depth)
    }

    /// Returns true if `id` is a live top-level entry.
    pub fn is_at_root_depth(&self, id: EntryId) -> bool {
        self.node_opt(id).is_some_and(|n| n.parent.is_none())
    }

    /// The top-level ancestor of `id` (or `id` itself at top level).
    pub fn root_level_parent(&self, id: EntryId) -> Option<EntryId> {
        let mut current = id;
        let mut node = self.node_opt(id)?;
        while let Some(parent) = node.parent {
            current = parent;
            node = self.node(parent);
        }
        Some(current)
    }

    /// Returns true if `id` is live and has at least one child.
    pub fn has_children(&self, id: EntryId) -> bool {
        self.node_opt(id).is_some_and(|n| !n.children.is_empty())
    }

    /// Returns true if `id` is live and below the top level.
    pub fn has_parent(&self, id: EntryId) -> bool {
        self.node_opt(id).is_some_and(|n| n.parent.is_some())
    }

    /// Returns true if `ancestor` is a proper ancestor of `id`.
    ///
    /// Walks the full parent chain of `id`.
    pub fn is_descendant(&self, id: EntryId, ancestor: EntryId) -> bool {
        if !self.is_alive(ancestor) {
            return false;
        }
        let mut current = self.parent_of(id);
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            current = self.node(p).parent;
        }
        false
    }

    // --- traversal ---

    /// First entry in pre-order.
    pub fn first(&self) -> Option<EntryId> {
        self.roots.first().copied()
    }

    /// Next entry in pre-order, or `None` at the end or for stale entries.
    pub fn next(&self, current: EntryId) -> Option<EntryId> {
        if !self.is_alive(current) {
            return None;
        }
        self.step_forward(current, true).map(|(id, _)| id)
    }

    /// Next entry in pre-order together with its depth, given the depth of `current`.
    pub fn next_with_depth(&self, current: EntryId, depth: usize) -> Option<(EntryId, usize)> {
        if !self.is_alive(current) {
            return None;
        }
        self.step_forward(current, true)
            .map(|(id, delta)| (id, depth.saturating_add_signed(delta)))
    }

    /// Previous entry in pre-order, or `None` at the start or for stale entries.
    pub fn prev(&self, current: EntryId) -> Option<EntryId> {
        if !self.is_alive(current) {
            return None;
        }
        self.step_backward(current, |_| true).map(|(id, _)| id)
    }

    /// Last entry in pre-order.
    pub fn last(&self) -> Option<EntryId> {
        let root = *self.roots.last()?;
        Some(self.last_in_subtree(root, |_| true).0)
    }

    /// Iterate every entry in pre-order.
    pub fn iter(&self) -> impl Iterator<Item = EntryId> + '_ {
        core::iter::successors(self.first(), move |&id| self.next(id))
    }

    /// Step one entry forward in pre-order, descending into `current` only if
    /// `descend` is set. Also returns the depth change.
    pub(crate) fn step_forward(&self, current: EntryId, descend: bool) -> Option<(EntryId, isize)> {
        if descend && let Some(&child) = self.node(current).children.first() {
            return Some((child, 1));
        }
        let mut node = current;
        let mut delta = 0;
        loop {
            if let Some(next) = self.next_sibling(node) {
                return Some((next, delta));
            }
            node = self.node(node).parent?;
            delta -= 1;
        }
    }

    /// Step one entry backward in pre-order. `descend` decides whether the
    /// children of an entry are part of the walk.
    pub(crate) fn step_backward(
        &self,
        current: EntryId,
        descend: impl Fn(EntryId) -> bool,
    ) -> Option<(EntryId, isize)> {
        if let Some(prev) = self.prev_sibling(current) {
            return Some(self.last_in_subtree(prev, descend));
        }
        self.node(current).parent.map(|p| (p, -1))
    }

    /// Deepest last descendant of `id` reachable through entries accepted by `descend`.
    pub(crate) fn last_in_subtree(
        &self,
        id: EntryId,
        descend: impl Fn(EntryId) -> bool,
    ) -> (EntryId, isize) {
        let mut node = id;
        let mut delta = 0;
        while descend(node) {
            let Some(&last) = self.node(node).children.last() else {
                break;
            };
            node = last;
            delta += 1;
        }
        (node, delta)
    }

    fn next_sibling(&self, id: EntryId) -> Option<EntryId> {
        let n = self.node(id);
        self.child_list(n.parent).get(n.list_pos + 1).copied()
    }

    fn prev_sibling(&self, id: EntryId) -> Option<EntryId> {
        let n = self.node(id);
        let pos = n.list_pos.checked_sub(1)?;
        self.child_list(n.parent).get(pos).copied()
    }

    // --- absolute positions ---

    /// Pre-order index of `id` among all entries, expanded or not.
    pub fn abs_pos(&mut self, id: EntryId) -> Option<usize> {
        if !self.is_alive(id) {
            return None;
        }
        self.ensure_abs_positions();
        Some(self.node(id).abs_pos)
    }

    /// Entry at pre-order index `pos`.
    pub fn entry_at_abs_pos(&mut self, pos: usize) -> Option<EntryId> {
        self.ensure_abs_positions();
        self.abs_order.get(pos).copied()
    }

    /// Returns true if the absolute-position cache is current.
    pub const fn abs_positions_valid(&self) -> bool {
        self.abs_positions_valid
    }

    fn ensure_abs_positions(&mut self) {
        if self.abs_positions_valid {
            return;
        }
        tracing::trace!(entries = self.entry_count, "rebuilding absolute positions");
        let mut order = core::mem::take(&mut self.abs_order);
        order.clear();
        let mut current = self.first();
        while let Some(id) = current {
            self.node_mut(id).abs_pos = order.len();
            order.push(id);
            current = self.step_forward(id, true).map(|(next, _)| next);
        }
        debug_assert_eq!(
            order.len(),
            self.entry_count,
            "entry count disagrees with a full walk"
        );
        self.abs_order = order;
        self.abs_positions_valid = true;
    }

    // --- broadcasting ---

    /// Deliver `notification` to every registered view, in registration order.
    ///
    /// Each view first applies its default handling and then runs its
    /// listener, if any. Nothing is delivered while broadcasts are disabled;
    /// see [`TreeList::set_invalidate_enabled`].
    pub fn broadcast(&mut self, notification: Notification) {
        if !self.invalidate_enabled {
            tracing::trace!(action = ?notification.action, "broadcast suppressed");
            return;
        }
        tracing::trace!(
            action = ?notification.action,
            entry = ?notification.entry,
            target = ?notification.target,
            pos = notification.pos,
            "broadcast"
        );
        for idx in 0..self.views.len() {
            let Some(slot) = self.views[idx].as_mut() else {
                continue;
            };
            let mut state = core::mem::take(&mut slot.state);
            let listener = slot.listener.take();
            state.apply(self, &notification);
            if let Some(slot) = self.views[idx].as_mut() {
                slot.state = state;
            }
            if let Some(mut listener) = listener {
                #[allow(
                    clippy::cast_possible_truncation,
                    reason = "ViewId uses 32-bit indices by design."
                )]
                listener.notify(self, ViewId(idx as u32), &notification);
                if let Some(slot) = self.views[idx].as_mut() {
                    slot.listener = Some(listener);
                }
            }
        }
    }

    /// Tell every view that the presentation of `id` changed.
    pub fn invalidate_entry(&mut self, id: EntryId) {
        if self.is_alive(id) {
            self.broadcast(Notification::for_entry(ListAction::InvalidateEntry, id));
        }
    }

    /// Enable or disable delivery of notifications. Returns the previous setting.
    ///
    /// Structural operations keep working while disabled, but no view hears
    /// about them; call [`TreeList::resynchronize_views`] afterwards. Prefer
    /// [`TreeList::suspend_broadcasts`], which restores the setting on drop.
    pub fn set_invalidate_enabled(&mut self, enabled: bool) -> bool {
        core::mem::replace(&mut self.invalidate_enabled, enabled)
    }

    /// Returns true if notifications are delivered.
    pub const fn is_invalidate_enabled(&self) -> bool {
        self.invalidate_enabled
    }

    /// Disable notifications until the returned guard is dropped.
    ///
    /// The guard dereferences to the tree, and restores the previous setting
    /// when it goes out of scope.
    ///
    /// ```rust
    /// use understory_tree_list::{APPEND, TreeList};
    ///
    /// let mut tree = TreeList::new();
    /// {
    ///     let mut bulk = tree.suspend_broadcasts();
    ///     for i in 0..100 {
    ///         bulk.insert(None, APPEND, i).unwrap();
    ///     }
    /// }
    /// tree.resynchronize_views();
    /// assert!(tree.is_invalidate_enabled());
    /// assert_eq!(tree.entry_count(), 100);
    /// ```
    pub fn suspend_broadcasts(&mut self) -> SuspendedBroadcasts<'_, T> {
        let previous = self.set_invalidate_enabled(false);
        SuspendedBroadcasts {
            tree: self,
            previous,
        }
    }

    // --- internals ---

    /// Access an entry; panics if `id` is stale.
    pub(crate) fn node(&self, id: EntryId) -> &Entry<T> {
        self.entries[id.idx()].as_ref().expect("dangling EntryId")
    }

    /// Access an entry mutably; panics if `id` is stale.
    pub(crate) fn node_mut(&mut self, id: EntryId) -> &mut Entry<T> {
        self.entries[id.idx()].as_mut().expect("dangling EntryId")
    }

    pub(crate) fn node_opt(&self, id: EntryId) -> Option<&Entry<T>> {
        let n = self.entries.get(id.idx())?.as_ref()?;
        (n.generation == id.1).then_some(n)
    }

    fn node_opt_mut(&mut self, id: EntryId) -> Option<&mut Entry<T>> {
        let n = self.entries.get_mut(id.idx())?.as_mut()?;
        if n.generation != id.1 {
            return None;
        }
        Some(n)
    }

    fn check_alive(&self, id: EntryId) -> Result<(), TreeError> {
        if self.is_alive(id) {
            Ok(())
        } else {
            tracing::debug!(entry = ?id, "stale entry");
            Err(TreeError::StaleEntry(id))
        }
    }

    fn check_parent(&self, parent: Option<EntryId>) -> Result<(), TreeError> {
        match parent {
            Some(p) => self.check_alive(p),
            None => Ok(()),
        }
    }

    pub(crate) fn child_list(&self, parent: Option<EntryId>) -> &[EntryId] {
        match parent {
            Some(p) => &self.node(p).children,
            None => &self.roots,
        }
    }

    pub(crate) fn child_list_mut(&mut self, parent: Option<EntryId>) -> &mut Vec<EntryId> {
        match parent {
            Some(p) => &mut self.node_mut(p).children,
            None => &mut self.roots,
        }
    }

    /// Refresh the cached sibling positions of `parent`'s children from `from` on.
    pub(crate) fn renumber(&mut self, parent: Option<EntryId>, from: usize) {
        let list = core::mem::take(self.child_list_mut(parent));
        for (pos, &child) in list.iter().enumerate().skip(from) {
            self.node_mut(child).list_pos = pos;
        }
        *self.child_list_mut(parent) = list;
    }

    /// Mark cached absolute positions stale.
    pub(crate) fn invalidate_abs_positions(&mut self) {
        self.abs_positions_valid = false;
    }

    fn alloc(&mut self, flags: EntryFlags, payload: T) -> EntryId {
        if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            self.entries[idx] = Some(Entry::new(generation, flags, payload));
            #[allow(
                clippy::cast_possible_truncation,
                reason = "EntryId uses 32-bit indices by design."
            )]
            EntryId::new(idx as u32, generation)
        } else {
            let generation = 1_u32;
            self.entries.push(Some(Entry::new(generation, flags, payload)));
            self.generations.push(generation);
            #[allow(
                clippy::cast_possible_truncation,
                reason = "EntryId uses 32-bit indices by design."
            )]
            EntryId::new((self.entries.len() - 1) as u32, generation)
        }
    }

    /// Allocate every entry of `subtree`, linking children to their parents.
    ///
    /// Walks with an explicit stack, so any depth is fine.
    fn adopt(&mut self, subtree: Subtree<T>) -> (EntryId, usize) {
        let Subtree {
            payload,
            flags,
            children,
        } = subtree;
        let root = self.alloc(flags, payload);
        let mut count = 1;
        let mut stack: Vec<(Subtree<T>, EntryId)> =
            children.into_iter().rev().map(|child| (child, root)).collect();
        while let Some((child, parent)) = stack.pop() {
            let Subtree {
                payload,
                flags,
                children,
            } = child;
            let id = self.alloc(flags, payload);
            count += 1;
            let siblings = &mut self.node_mut(parent).children;
            let pos = siblings.len();
            siblings.push(id);
            let node = self.node_mut(id);
            node.parent = Some(parent);
            node.list_pos = pos;
            stack.extend(children.into_iter().rev().map(|grandchild| (grandchild, id)));
        }
        (root, count)
    }

    fn link(&mut self, id: EntryId, parent: Option<EntryId>, pos: usize) -> usize {
        let list = self.child_list_mut(parent);
        let pos = pos.min(list.len());
        list.insert(pos, id);
        self.node_mut(id).parent = parent;
        self.renumber(parent, pos);
        pos
    }

    fn unlink(&mut self, id: EntryId) {
        let (parent, pos) = {
            let n = self.node(id);
            (n.parent, n.list_pos)
        };
        let list = self.child_list_mut(parent);
        debug_assert_eq!(list.get(pos), Some(&id), "stale sibling position");
        list.remove(pos);
        self.renumber(parent, pos);
        self.node_mut(id).parent = None;
    }

    /// Free `id` and everything below it. Returns the number of freed entries.
    fn free_subtree(&mut self, id: EntryId) -> usize {
        let mut freed = 0;
        let mut stack: SmallVec<[EntryId; 16]> = SmallVec::new();
        stack.push(id);
        while let Some(id) = stack.pop() {
            if let Some(entry) = self.entries[id.idx()].take() {
                stack.extend(entry.children);
                self.free_list.push(id.idx());
                freed += 1;
            }
        }
        freed
    }
}

/// Guard returned by [`TreeList::suspend_broadcasts`].
///
/// Notifications stay disabled while the guard is alive; dropping it restores
/// the previous setting.
pub struct SuspendedBroadcasts<'a, T> {
    tree: &'a mut TreeList<T>,
    previous: bool,
}

impl<T> core::fmt::Debug for SuspendedBroadcasts<'_, T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SuspendedBroadcasts")
            .field("tree", &self.tree)
            .field("previous", &self.previous)
            .finish()
    }
}

impl<T> Deref for SuspendedBroadcasts<'_, T> {
    type Target = TreeList<T>;

    fn deref(&self) -> &Self::Target {
        self.tree
    }
}

impl<T> DerefMut for SuspendedBroadcasts<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.tree
    }
}

impl<T> Drop for SuspendedBroadcasts<'_, T> {
    fn drop(&mut self) {
        self.tree.invalidate_enabled = self.previous;
    }
}
