// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public types for the tree list: handles, flags, sort modes, and notifications.

/// Sentinel list position meaning "after the last sibling".
///
/// Any position past the end of a child list behaves the same way.
pub const APPEND: usize = usize::MAX;

/// Identifier for an entry in a [`TreeList`](crate::TreeList) (generational).
///
/// A slot freed by [`TreeList::remove`](crate::TreeList::remove) may be reused
/// later, but with a bumped generation, so a stale `EntryId` never aliases a
/// newer entry.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct EntryId(pub(crate) u32, pub(crate) u32);

impl EntryId {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }
}

/// Identifier for a view registered with a [`TreeList`](crate::TreeList).
///
/// View slots are never reused, which keeps notification delivery in
/// registration order.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ViewId(pub(crate) u32);

impl ViewId {
    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }
}

bitflags::bitflags! {
    /// Per-entry flags stored in the tree and shared by every view.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct EntryFlags: u8 {
        /// The entry may have children that are populated lazily on expansion.
        const CHILDREN_ON_DEMAND = 0b0000_0001;
        /// The entry does not accept drops.
        const DISABLE_DROP       = 0b0000_0010;
        /// No expander glyph is drawn for the entry.
        const NO_NODE_BITMAP     = 0b0000_0100;
        /// The entry is drawn semi-transparent (for example while being dragged).
        const SEMI_TRANSPARENT   = 0b0000_1000;
    }
}

bitflags::bitflags! {
    /// Per-view, per-entry state flags.
    ///
    /// The empty set is the default for entries a view has never touched:
    /// collapsed, unselected, unfocused, and selectable.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ViewFlags: u8 {
        /// The entry's children are shown in this view.
        const EXPANDED       = 0b0000_0001;
        /// The entry is selected in this view.
        const SELECTED       = 0b0000_0010;
        /// The entry has keyboard focus in this view.
        const FOCUSED        = 0b0000_0100;
        /// The entry carries the cursor in this view.
        const CURSORED       = 0b0000_1000;
        /// The entry refuses selection in this view.
        const NOT_SELECTABLE = 0b0001_0000;
    }
}

/// Sibling ordering applied on insertion and by [`TreeList::resort`](crate::TreeList::resort).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum SortMode {
    /// Siblings are kept in increasing order of the compare handler.
    Ascending,
    /// Siblings are kept in decreasing order of the compare handler.
    Descending,
    /// Siblings keep the order they were inserted in.
    #[default]
    None,
}

/// Kind of structural change carried by a [`Notification`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ListAction {
    /// A single entry was inserted.
    Inserted,
    /// An entry and its subtree are about to be removed; the entry is still linked.
    Removing,
    /// An entry and its subtree were removed; the handle is already stale.
    Removed,
    /// An entry is about to be moved; it is still linked under its old parent.
    Moving,
    /// An entry was moved to its new parent.
    Moved,
    /// Every entry is about to be removed.
    Clearing,
    /// Every entry was removed.
    Cleared,
    /// A whole subtree was inserted (including copies).
    InsertedTree,
    /// An entry's presentation changed without a structural change.
    InvalidateEntry,
    /// Siblings are about to be re-sorted.
    Resorting,
    /// Siblings were re-sorted.
    Resorted,
}

impl ListAction {
    /// Returns `true` if this action can change the set or order of entries.
    #[must_use]
    pub const fn is_structural(self) -> bool {
        !matches!(self, Self::InvalidateEntry)
    }
}

/// A change broadcast by a [`TreeList`](crate::TreeList) to its views.
///
/// The meaning of `target` and `pos` depends on [`Notification::action`]:
///
/// | action                       | `entry`        | `target`          | `pos`                 |
/// |------------------------------|----------------|-------------------|-----------------------|
/// | `Inserted`, `InsertedTree`   | new entry      | parent            | position in parent    |
/// | `Moving`                     | moved entry    | target parent     | requested position    |
/// | `Moved`                      | moved entry    | target parent     | final position        |
/// | `Removing`, `Removed`        | removed entry  | old parent        | old position          |
/// | `InvalidateEntry`            | entry          | `None`            | `0`                   |
/// | `Clearing`, `Cleared`, `Resorting`, `Resorted` | `None` | `None` | `0`             |
///
/// A `target` of `None` refers to the top level.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    /// What happened.
    pub action: ListAction,
    /// The primary entry the action applies to.
    pub entry: Option<EntryId>,
    /// Secondary entry, usually the parent context.
    pub target: Option<EntryId>,
    /// List position associated with the action.
    pub pos: usize,
}

impl Notification {
    /// Create a notification without entries.
    #[must_use]
    pub const fn new(action: ListAction) -> Self {
        Self {
            action,
            entry: None,
            target: None,
            pos: 0,
        }
    }

    /// Create a notification about `entry`.
    #[must_use]
    pub const fn for_entry(action: ListAction, entry: EntryId) -> Self {
        Self {
            action,
            entry: Some(entry),
            target: None,
            pos: 0,
        }
    }

    /// Attach a parent context and list position.
    #[must_use]
    pub const fn with_target(mut self, target: Option<EntryId>, pos: usize) -> Self {
        self.target = target;
        self.pos = pos;
        self
    }
}
