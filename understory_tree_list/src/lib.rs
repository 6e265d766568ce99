// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_tree_list --heading-base-level=0

//! Understory Tree List: a hierarchical list model observed by multiple views.
//!
//! This crate is the data layer behind tree-list and outline widgets. A single
//! [`TreeList`] owns an ordered forest of entries; any number of views observe it,
//! each with its own expansion, selection, focus, and cursor state.
//!
//! - Entries are addressed by generational [`EntryId`]s. Removing an entry makes
//!   every handle into its subtree stale, and a reused slot never aliases an old handle.
//! - Absolute (pre-order) positions are cached tree-wide behind a single validity
//!   bit and rebuilt in one pass on the first query after a mutation.
//! - Each view caches its visible (pre-order, collapsed branches skipped)
//!   positions the same way.
//! - Siblings can be kept sorted by a caller-supplied comparison, in ascending
//!   or descending [`SortMode`].
//! - Every structural change is broadcast as a [`Notification`] to every view,
//!   in registration order, before the mutating call returns.
//!
//! The crate does not render anything and does not know about widgets. Host
//! frameworks map visible positions to rows, and may keep per-entry render
//! extents in [`ViewData::extents`].
//!
//! ## Minimal example
//!
//! ```rust
//! use understory_tree_list::{APPEND, ListAction, Notification, TreeList, ViewId};
//!
//! let mut tree = TreeList::new();
//! let docs = tree.insert(None, APPEND, "docs").unwrap();
//! let guide = tree.insert(Some(docs), APPEND, "guide.md").unwrap();
//! let src = tree.insert(None, APPEND, "src").unwrap();
//!
//! // A second view with a listener. The listener sees the tree read-only.
//! let outline = tree.add_view_with_listener(|_: &TreeList<&'static str>, _: ViewId, n: &Notification| {
//!     assert_ne!(n.action, ListAction::Cleared);
//! });
//!
//! // Expansion is per view.
//! tree.expand(tree.owner_view(), docs);
//! assert_eq!(tree.visible_pos(tree.owner_view(), src), Some(2));
//! assert_eq!(tree.visible_pos(outline, src), Some(1));
//! assert_eq!(tree.visible_pos(outline, guide), None);
//!
//! // Removal purges view state before the entry goes away.
//! tree.select(outline, guide, true);
//! tree.remove(docs);
//! assert_eq!(tree.selection_count(outline), 0);
//! assert!(!tree.is_alive(guide));
//! ```
//!
//! ## API overview
//!
//! - [`TreeList`]: the model. Structure ([`TreeList::insert`], [`TreeList::insert_tree`],
//!   [`TreeList::move_entry`], [`TreeList::copy`], [`TreeList::remove`], [`TreeList::clear`]),
//!   traversal, positions, sorting, and view state.
//! - [`Subtree`]: a detached subtree for bulk insertion.
//! - [`ListListener`]: per-view notification hook; closures implement it.
//! - [`ViewData`]: per-view state of one entry.
//! - [`TreeError`]: why a structural operation was rejected.
//!
//! Bulk loads can disable broadcasting with [`TreeList::suspend_broadcasts`] and
//! then call [`TreeList::resynchronize_views`].
//!
//! ## Features
//!
//! - `std` *(default)*: enables `std` support in dependencies.
//! - `libm`: enables `no_std` float math in `kurbo`.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod entry;
mod error;
mod sort;
mod tree;
mod types;
mod view;

pub use entry::Subtree;
pub use error::TreeError;
pub use tree::{Copied, SuspendedBroadcasts, TreeList};
pub use types::{
    APPEND, EntryFlags, EntryId, ListAction, Notification, SortMode, ViewFlags, ViewId,
};
pub use view::{ListListener, ViewData};
