// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Views: per-observer expansion, selection, and visible-position state.
//!
//! A view never owns entries. It keeps sparse per-entry [`ViewData`] keyed by
//! [`EntryId`], created on first write, and a lazily rebuilt visible-order
//! cache. Views are stored inside the [`TreeList`] and addressed by [`ViewId`],
//! so that every structural change reaches them before it becomes observable.

use alloc::boxed::Box;
use alloc::vec::Vec;

use hashbrown::HashMap;
use kurbo::Size;
use smallvec::SmallVec;

use crate::error::TreeError;
use crate::tree::TreeList;
use crate::types::{EntryFlags, EntryId, ListAction, Notification, ViewFlags, ViewId};

/// Hook run for every notification a view receives, after the view's default handling.
///
/// Listeners see the tree read-only; the borrow checker rules out mutating the
/// tree from inside a notification. Closures of the matching shape implement
/// this trait.
///
/// ```rust
/// use understory_tree_list::{APPEND, ListAction, Notification, TreeList, ViewId};
///
/// let mut tree = TreeList::new();
/// let view = tree.add_view_with_listener(|tree: &TreeList<u32>, _: ViewId, n: &Notification| {
///     if n.action == ListAction::Inserted {
///         assert!(tree.is_alive(n.entry.unwrap()));
///     }
/// });
/// tree.insert(None, APPEND, 7).unwrap();
/// assert!(tree.remove_view(view));
/// ```
pub trait ListListener<T> {
    /// Called for `notification`, delivered to `view` of `tree`.
    fn notify(&mut self, tree: &TreeList<T>, view: ViewId, notification: &Notification);
}

impl<T, F> ListListener<T> for F
where
    F: FnMut(&TreeList<T>, ViewId, &Notification),
{
    fn notify(&mut self, tree: &TreeList<T>, view: ViewId, notification: &Notification) {
        self(tree, view, notification);
    }
}

/// Per-view state of one entry.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ViewData {
    flags: ViewFlags,
    /// Cached render extents for the entry's items, maintained by the view's owner.
    ///
    /// Cleared whenever the entry is invalidated.
    pub extents: SmallVec<[Size; 2]>,
}

impl ViewData {
    /// State flags of the entry in this view.
    pub const fn flags(&self) -> ViewFlags {
        self.flags
    }

    /// Returns true if the entry is expanded.
    pub const fn is_expanded(&self) -> bool {
        self.flags.contains(ViewFlags::EXPANDED)
    }

    /// Returns true if the entry is selected.
    pub const fn is_selected(&self) -> bool {
        self.flags.contains(ViewFlags::SELECTED)
    }

    /// Returns true if the entry has focus.
    pub const fn is_focused(&self) -> bool {
        self.flags.contains(ViewFlags::FOCUSED)
    }

    /// Returns true if the entry carries the cursor.
    pub const fn is_cursored(&self) -> bool {
        self.flags.contains(ViewFlags::CURSORED)
    }

    /// Returns true unless the entry was marked unselectable.
    pub const fn is_selectable(&self) -> bool {
        !self.flags.contains(ViewFlags::NOT_SELECTABLE)
    }
}

#[derive(Debug, Default)]
pub(crate) struct ViewState {
    data: HashMap<EntryId, ViewData>,
    selection_count: usize,
    visible_valid: bool,
    visible_order: Vec<EntryId>,
    visible_index: HashMap<EntryId, usize>,
}

impl ViewState {
    fn flags(&self, id: EntryId) -> ViewFlags {
        self.data.get(&id).map_or(ViewFlags::empty(), |d| d.flags)
    }

    fn is_expanded(&self, id: EntryId) -> bool {
        self.flags(id).contains(ViewFlags::EXPANDED)
    }

    fn collapse(&mut self, id: EntryId) {
        if let Some(d) = self.data.get_mut(&id) {
            d.flags.remove(ViewFlags::EXPANDED);
        }
    }

    /// Default reaction to a broadcast. Runs before the view's listener.
    pub(crate) fn apply<T>(&mut self, tree: &TreeList<T>, n: &Notification) {
        if n.action.is_structural() {
            self.visible_valid = false;
        }
        match n.action {
            ListAction::Removing => {
                let Some(entry) = n.entry else { return };
                self.purge_subtree(tree, entry);
                if let Some(parent) = n.target
                    && tree.child_count(Some(parent)) == 1
                {
                    self.collapse(parent);
                }
            }
            ListAction::Moving => {
                let Some(entry) = n.entry else { return };
                if let Some(parent) = tree.parent_of(entry)
                    && n.target != Some(parent)
                    && tree.child_count(Some(parent)) == 1
                {
                    self.collapse(parent);
                }
            }
            ListAction::Cleared => {
                self.data.clear();
                self.selection_count = 0;
                self.visible_order.clear();
                self.visible_index.clear();
            }
            ListAction::InvalidateEntry => {
                if let Some(entry) = n.entry
                    && let Some(d) = self.data.get_mut(&entry)
                {
                    d.extents.clear();
                }
            }
            _ => {}
        }
    }

    /// Drop state for `root` and everything below it.
    fn purge_subtree<T>(&mut self, tree: &TreeList<T>, root: EntryId) {
        if self.data.is_empty() {
            return;
        }
        let mut stack: SmallVec<[EntryId; 16]> = SmallVec::new();
        stack.push(root);
        while let Some(id) = stack.pop() {
            if let Some(d) = self.data.remove(&id)
                && d.is_selected()
            {
                self.selection_count -= 1;
            }
            stack.extend(tree.children_of(Some(id)).iter().copied());
        }
    }

    fn rebuild_visible<T>(&mut self, tree: &TreeList<T>) {
        tracing::trace!(entries = tree.entry_count(), "rebuilding visible positions");
        self.visible_order.clear();
        self.visible_index.clear();
        let mut current = tree.first();
        while let Some(id) = current {
            self.visible_index.insert(id, self.visible_order.len());
            self.visible_order.push(id);
            current = tree
                .step_forward(id, self.is_expanded(id))
                .map(|(next, _)| next);
        }
        self.visible_valid = true;
    }

    /// Drop state for dead entries and recount the selection.
    fn resynchronize<T>(&mut self, tree: &TreeList<T>) {
        self.data.retain(|&id, _| tree.is_alive(id));
        self.selection_count = self.data.values().filter(|d| d.is_selected()).count();
        self.visible_valid = false;
    }
}

pub(crate) struct ViewSlot<T> {
    pub(crate) state: ViewState,
    pub(crate) listener: Option<Box<dyn ListListener<T>>>,
}

impl<T> ViewSlot<T> {
    pub(crate) fn new(listener: Option<Box<dyn ListListener<T>>>) -> Self {
        Self {
            state: ViewState::default(),
            listener,
        }
    }
}

impl<T> TreeList<T> {
    // --- registration ---

    /// Register a view without a listener.
    ///
    /// New views see every entry collapsed and unselected.
    pub fn add_view(&mut self) -> ViewId {
        self.push_view(None)
    }

    /// Register a view whose listener runs for every notification.
    pub fn add_view_with_listener(&mut self, listener: impl ListListener<T> + 'static) -> ViewId {
        self.push_view(Some(Box::new(listener)))
    }

    fn push_view(&mut self, listener: Option<Box<dyn ListListener<T>>>) -> ViewId {
        self.views.push(Some(ViewSlot::new(listener)));
        #[allow(
            clippy::cast_possible_truncation,
            reason = "ViewId uses 32-bit indices by design."
        )]
        ViewId((self.views.len() - 1) as u32)
    }

    /// Unregister `view` and drop its state.
    ///
    /// Returns `false` for the owner view and for views that are already gone.
    /// View slots are never reused, which keeps delivery in registration order,
    /// so each add and remove cycle leaves one empty slot behind.
    pub fn remove_view(&mut self, view: ViewId) -> bool {
        if view == self.owner_view() {
            return false;
        }
        self.views
            .get_mut(view.idx())
            .and_then(Option::take)
            .is_some()
    }

    /// Replace the listener of `view`.
    pub fn set_listener(
        &mut self,
        view: ViewId,
        listener: impl ListListener<T> + 'static,
    ) -> Result<(), TreeError> {
        let slot = self
            .views
            .get_mut(view.idx())
            .and_then(Option::as_mut)
            .ok_or(TreeError::StaleView(view))?;
        slot.listener = Some(Box::new(listener));
        Ok(())
    }

    /// Returns true if `view` is registered with this tree.
    pub fn is_view_alive(&self, view: ViewId) -> bool {
        self.view_state(view).is_some()
    }

    /// Number of registered views, including the owner view.
    pub fn view_count(&self) -> usize {
        self.views.iter().filter(|v| v.is_some()).count()
    }

    /// Drop view state for entries that no longer exist and invalidate every
    /// visible-position cache.
    ///
    /// Needed after mutating with broadcasts disabled.
    pub fn resynchronize_views(&mut self) {
        for idx in 0..self.views.len() {
            let Some(slot) = self.views[idx].as_mut() else {
                continue;
            };
            let mut state = core::mem::take(&mut slot.state);
            state.resynchronize(self);
            if let Some(slot) = self.views[idx].as_mut() {
                slot.state = state;
            }
        }
    }

    // --- per-entry state ---

    /// Expand `id` in `view`. Returns true if the state changed.
    pub fn expand(&mut self, view: ViewId, id: EntryId) -> bool {
        self.set_view_flag(view, id, ViewFlags::EXPANDED, true)
    }

    /// Collapse `id` in `view`. Returns true if the state changed.
    pub fn collapse(&mut self, view: ViewId, id: EntryId) -> bool {
        self.set_view_flag(view, id, ViewFlags::EXPANDED, false)
    }

    /// Select or deselect `id` in `view`.
    ///
    /// Entries inside collapsed branches can be selected too. Returns false
    /// for stale handles, when nothing changed, and when selecting an entry
    /// marked unselectable.
    pub fn select(&mut self, view: ViewId, id: EntryId, selected: bool) -> bool {
        if !self.is_alive(id) {
            return false;
        }
        let Some(state) = self.view_state_mut(view) else {
            return false;
        };
        let flags = state.flags(id);
        if flags.contains(ViewFlags::SELECTED) == selected
            || (selected && flags.contains(ViewFlags::NOT_SELECTABLE))
        {
            return false;
        }
        state
            .data
            .entry(id)
            .or_default()
            .flags
            .set(ViewFlags::SELECTED, selected);
        if selected {
            state.selection_count += 1;
        } else {
            state.selection_count -= 1;
        }
        true
    }

    /// Set or clear the focus flag of `id` in `view`.
    pub fn set_entry_focus(&mut self, view: ViewId, id: EntryId, focused: bool) -> bool {
        self.set_view_flag(view, id, ViewFlags::FOCUSED, focused)
    }

    /// Set or clear the cursor flag of `id` in `view`.
    pub fn set_cursor(&mut self, view: ViewId, id: EntryId, cursored: bool) -> bool {
        self.set_view_flag(view, id, ViewFlags::CURSORED, cursored)
    }

    /// Allow or forbid selecting `id` in `view`.
    ///
    /// An existing selection is left alone.
    pub fn set_selectable(&mut self, view: ViewId, id: EntryId, selectable: bool) -> bool {
        self.set_view_flag(view, id, ViewFlags::NOT_SELECTABLE, !selectable)
    }

    fn set_view_flag(&mut self, view: ViewId, id: EntryId, flag: ViewFlags, on: bool) -> bool {
        if !self.is_alive(id) {
            return false;
        }
        let Some(state) = self.view_state_mut(view) else {
            return false;
        };
        if state.flags(id).contains(flag) == on {
            return false;
        }
        state.data.entry(id).or_default().flags.set(flag, on);
        if flag == ViewFlags::EXPANDED {
            state.visible_valid = false;
        }
        true
    }

    /// State flags of `id` in `view`; empty for untouched entries.
    pub fn view_flags(&self, view: ViewId, id: EntryId) -> ViewFlags {
        self.view_state(view).map_or(ViewFlags::empty(), |s| s.flags(id))
    }

    /// Returns true if `id` is expanded in `view`.
    pub fn is_expanded(&self, view: ViewId, id: EntryId) -> bool {
        self.view_flags(view, id).contains(ViewFlags::EXPANDED)
    }

    /// Returns true if `id` is selected in `view`.
    pub fn is_selected(&self, view: ViewId, id: EntryId) -> bool {
        self.view_flags(view, id).contains(ViewFlags::SELECTED)
    }

    /// Returns true if `id` has focus in `view`.
    pub fn is_focused(&self, view: ViewId, id: EntryId) -> bool {
        self.view_flags(view, id).contains(ViewFlags::FOCUSED)
    }

    /// Returns true if `id` carries the cursor in `view`.
    pub fn is_cursored(&self, view: ViewId, id: EntryId) -> bool {
        self.view_flags(view, id).contains(ViewFlags::CURSORED)
    }

    /// Returns true if `id` is live and may be selected in `view`.
    pub fn is_selectable(&self, view: ViewId, id: EntryId) -> bool {
        self.is_alive(id)
            && self.is_view_alive(view)
            && !self.view_flags(view, id).contains(ViewFlags::NOT_SELECTABLE)
    }

    /// Returns true if `id` and every one of its ancestors are expanded in `view`.
    pub fn is_all_expanded(&self, view: ViewId, id: EntryId) -> bool {
        let Some(state) = self.view_state(view) else {
            return false;
        };
        if !self.is_alive(id) {
            return false;
        }
        let mut current = Some(id);
        while let Some(e) = current {
            if !state.is_expanded(e) {
                return false;
            }
            current = self.parent_of(e);
        }
        true
    }

    /// Returns true if `id` is expanded in `view`, and so is every descendant
    /// that has children or [`EntryFlags::CHILDREN_ON_DEMAND`].
    pub fn is_subtree_expanded(&self, view: ViewId, id: EntryId) -> bool {
        let Some(state) = self.view_state(view) else {
            return false;
        };
        if !self.is_alive(id) || !state.is_expanded(id) {
            return false;
        }
        let mut stack: SmallVec<[EntryId; 16]> = SmallVec::new();
        stack.extend(self.children_of(Some(id)).iter().copied());
        while let Some(e) = stack.pop() {
            let children = self.children_of(Some(e));
            let expandable = !children.is_empty()
                || self
                    .entry_flags(e)
                    .is_some_and(|f| f.contains(EntryFlags::CHILDREN_ON_DEMAND));
            if expandable && !state.is_expanded(e) {
                return false;
            }
            stack.extend(children.iter().copied());
        }
        true
    }

    /// State of `id` in `view`, or `None` if the view never touched it.
    pub fn view_data(&self, view: ViewId, id: EntryId) -> Option<&ViewData> {
        self.view_state(view)?.data.get(&id)
    }

    /// Mutable state of `id` in `view`, created with defaults on first access.
    ///
    /// Returns `None` for stale handles.
    pub fn view_data_mut(&mut self, view: ViewId, id: EntryId) -> Option<&mut ViewData> {
        if !self.is_alive(id) {
            return None;
        }
        Some(self.view_state_mut(view)?.data.entry(id).or_default())
    }

    // --- selection ---

    /// Number of selected entries in `view`.
    pub fn selection_count(&self, view: ViewId) -> usize {
        self.view_state(view).map_or(0, |s| s.selection_count)
    }

    /// First selected entry of `view` in pre-order.
    pub fn first_selected(&self, view: ViewId) -> Option<EntryId> {
        let first = self.first()?;
        if self.is_selected(view, first) {
            Some(first)
        } else {
            self.next_selected(view, first)
        }
    }

    /// Next selected entry of `view` after `id` in pre-order.
    pub fn next_selected(&self, view: ViewId, id: EntryId) -> Option<EntryId> {
        if self.selection_count(view) == 0 {
            return None;
        }
        let mut current = self.next(id);
        while let Some(e) = current {
            if self.is_selected(view, e) {
                return Some(e);
            }
            current = self.next(e);
        }
        None
    }

    /// Previous selected entry of `view` before `id` in pre-order.
    pub fn prev_selected(&self, view: ViewId, id: EntryId) -> Option<EntryId> {
        if self.selection_count(view) == 0 {
            return None;
        }
        let mut current = self.prev(id);
        while let Some(e) = current {
            if self.is_selected(view, e) {
                return Some(e);
            }
            current = self.prev(e);
        }
        None
    }

    /// Last selected entry of `view` in pre-order.
    pub fn last_selected(&self, view: ViewId) -> Option<EntryId> {
        let last = self.last()?;
        if self.is_selected(view, last) {
            Some(last)
        } else {
            self.prev_selected(view, last)
        }
    }

    /// Number of selected entries below `parent`, at any depth.
    pub fn child_selection_count(&self, view: ViewId, parent: EntryId) -> usize {
        let Some(state) = self.view_state(view) else {
            return 0;
        };
        if state.selection_count == 0 {
            return 0;
        }
        let mut count = 0;
        let mut stack: SmallVec<[EntryId; 16]> = SmallVec::new();
        stack.extend(self.children_of(Some(parent)).iter().copied());
        while let Some(e) = stack.pop() {
            if state.flags(e).contains(ViewFlags::SELECTED) {
                count += 1;
            }
            stack.extend(self.children_of(Some(e)).iter().copied());
        }
        count
    }

    /// Select or deselect every entry in `view`. Returns the number of entries changed.
    ///
    /// Unselectable entries are skipped when selecting.
    pub fn select_all(&mut self, view: ViewId, selected: bool) -> usize {
        if !self.is_view_alive(view) {
            return 0;
        }
        let ids: Vec<EntryId> = self.iter().collect();
        ids.into_iter()
            .filter(|&id| self.select(view, id, selected))
            .count()
    }

    // --- visible traversal ---

    /// First visible entry of `view`; always the first top-level entry.
    pub fn first_visible(&self, view: ViewId) -> Option<EntryId> {
        self.view_state(view)?;
        self.first()
    }

    /// Next entry in pre-order that `view` shows, skipping collapsed branches.
    pub fn next_visible(&self, view: ViewId, id: EntryId) -> Option<EntryId> {
        self.next_visible_with_depth(view, id, 0).map(|(e, _)| e)
    }

    /// Like [`TreeList::next_visible`], also tracking depth from the depth of `id`.
    pub fn next_visible_with_depth(
        &self,
        view: ViewId,
        id: EntryId,
        depth: usize,
    ) -> Option<(EntryId, usize)> {
        let state = self.view_state(view)?;
        if !self.is_alive(id) {
            return None;
        }
        self.step_forward(id, state.is_expanded(id))
            .map(|(e, delta)| (e, depth.saturating_add_signed(delta)))
    }

    /// Previous entry in pre-order that `view` shows.
    pub fn prev_visible(&self, view: ViewId, id: EntryId) -> Option<EntryId> {
        let state = self.view_state(view)?;
        if !self.is_alive(id) {
            return None;
        }
        self.step_backward(id, |e| state.is_expanded(e)).map(|(e, _)| e)
    }

    /// Last entry that `view` shows.
    pub fn last_visible(&self, view: ViewId) -> Option<EntryId> {
        let state = self.view_state(view)?;
        let root = *self.children_of(None).last()?;
        Some(self.last_in_subtree(root, |e| state.is_expanded(e)).0)
    }

    /// Step up to `delta` visible entries forward from `id`.
    ///
    /// Stops early at the last visible entry. Returns where it stopped and how
    /// many steps were taken, or `None` if `id` is not visible in `view`.
    pub fn next_visible_by(
        &self,
        view: ViewId,
        id: EntryId,
        delta: usize,
    ) -> Option<(EntryId, usize)> {
        if !self.is_entry_visible(view, id) {
            return None;
        }
        let mut current = id;
        let mut steps = 0;
        while steps < delta {
            let Some(next) = self.next_visible(view, current) else {
                break;
            };
            current = next;
            steps += 1;
        }
        Some((current, steps))
    }

    /// Step up to `delta` visible entries backward from `id`.
    ///
    /// See [`TreeList::next_visible_by`].
    pub fn prev_visible_by(
        &self,
        view: ViewId,
        id: EntryId,
        delta: usize,
    ) -> Option<(EntryId, usize)> {
        if !self.is_entry_visible(view, id) {
            return None;
        }
        let mut current = id;
        let mut steps = 0;
        while steps < delta {
            let Some(prev) = self.prev_visible(view, current) else {
                break;
            };
            current = prev;
            steps += 1;
        }
        Some((current, steps))
    }

    /// Returns true if every ancestor of `id` is expanded in `view`.
    pub fn is_entry_visible(&self, view: ViewId, id: EntryId) -> bool {
        let Some(state) = self.view_state(view) else {
            return false;
        };
        if !self.is_alive(id) {
            return false;
        }
        let mut current = self.parent_of(id);
        while let Some(p) = current {
            if !state.is_expanded(p) {
                return false;
            }
            current = self.parent_of(p);
        }
        true
    }

    /// Number of entries `view` shows.
    pub fn visible_count(&mut self, view: ViewId) -> usize {
        self.ensure_visible(view).map_or(0, |s| s.visible_order.len())
    }

    /// Number of entries `view` shows below `parent` (the whole tree if `None`).
    ///
    /// Zero if `parent` is collapsed.
    pub fn visible_child_count(&self, view: ViewId, parent: Option<EntryId>) -> usize {
        let Some(state) = self.view_state(view) else {
            return 0;
        };
        if let Some(p) = parent
            && !state.is_expanded(p)
        {
            return 0;
        }
        let mut count = 0;
        let mut stack: SmallVec<[EntryId; 16]> = SmallVec::new();
        stack.extend(self.children_of(parent).iter().copied());
        while let Some(e) = stack.pop() {
            count += 1;
            if state.is_expanded(e) {
                stack.extend(self.children_of(Some(e)).iter().copied());
            }
        }
        count
    }

    /// Index of `id` among the entries `view` shows, or `None` if hidden.
    pub fn visible_pos(&mut self, view: ViewId, id: EntryId) -> Option<usize> {
        if !self.is_alive(id) {
            return None;
        }
        self.ensure_visible(view)?.visible_index.get(&id).copied()
    }

    /// Entry at visible index `pos` in `view`.
    pub fn entry_at_visible_pos(&mut self, view: ViewId, pos: usize) -> Option<EntryId> {
        self.ensure_visible(view)?.visible_order.get(pos).copied()
    }

    // --- internals ---

    pub(crate) fn view_state(&self, view: ViewId) -> Option<&ViewState> {
        self.views.get(view.idx())?.as_ref().map(|s| &s.state)
    }

    fn view_state_mut(&mut self, view: ViewId) -> Option<&mut ViewState> {
        self.views.get_mut(view.idx())?.as_mut().map(|s| &mut s.state)
    }

    fn ensure_visible(&mut self, view: ViewId) -> Option<&ViewState> {
        let slot = self.views.get_mut(view.idx())?.as_mut()?;
        if !slot.state.visible_valid {
            let mut state = core::mem::take(&mut slot.state);
            state.rebuild_visible(self);
            if let Some(slot) = self.views[view.idx()].as_mut() {
                slot.state = state;
            }
        }
        self.view_state(view)
    }
}
