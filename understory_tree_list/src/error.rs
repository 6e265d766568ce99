// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Errors reported by fallible tree operations.

use crate::types::{EntryId, ViewId};

/// Reasons a structural operation on a [`TreeList`](crate::TreeList) was rejected.
///
/// A rejected operation leaves the tree and every view unchanged and sends no
/// notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    /// The entry handle is stale or belongs to another tree.
    #[error("entry {0:?} is not part of this tree")]
    StaleEntry(EntryId),
    /// The view handle is stale or belongs to another tree.
    #[error("view {0:?} is not registered with this tree")]
    StaleView(ViewId),
    /// The move target lies inside the subtree being moved.
    #[error("cannot move {moved:?} under {target:?}: the target is inside the moved subtree")]
    WouldCycle {
        /// Entry that was asked to move.
        moved: EntryId,
        /// Requested new parent.
        target: EntryId,
    },
    /// [`TreeList::copy`](crate::TreeList::copy) needs a clone handler.
    #[error("no clone handler is set")]
    NoCloneHandler,
}
