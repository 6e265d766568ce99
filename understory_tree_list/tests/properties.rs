// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Property tests over random operation sequences.

use std::cell::Cell;
use std::rc::Rc;

use proptest::prelude::*;
use understory_tree_list::{EntryId, Notification, SortMode, TreeError, TreeList, ViewId};

#[derive(Clone, Debug)]
enum Op {
    Insert {
        parent: Option<usize>,
        pos: usize,
        key: u8,
    },
    Remove(usize),
    Move {
        source: usize,
        target: Option<usize>,
        pos: usize,
    },
    Expand(usize),
    Collapse(usize),
    Select(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (proptest::option::of(any::<usize>()), 0..6_usize, any::<u8>())
            .prop_map(|(parent, pos, key)| Op::Insert { parent, pos, key }),
        1 => any::<usize>().prop_map(Op::Remove),
        2 => (any::<usize>(), proptest::option::of(any::<usize>()), 0..6_usize)
            .prop_map(|(source, target, pos)| Op::Move { source, target, pos }),
        2 => any::<usize>().prop_map(Op::Expand),
        1 => any::<usize>().prop_map(Op::Collapse),
        2 => any::<usize>().prop_map(Op::Select),
    ]
}

fn pick(ids: &[EntryId], n: usize) -> Option<EntryId> {
    (!ids.is_empty()).then(|| ids[n % ids.len()])
}

fn apply(tree: &mut TreeList<u8>, view: ViewId, op: &Op) {
    let ids: Vec<EntryId> = tree.iter().collect();
    match *op {
        Op::Insert { parent, pos, key } => {
            let parent = parent.and_then(|p| pick(&ids, p));
            tree.insert(parent, pos, key).unwrap();
        }
        Op::Remove(n) => {
            if let Some(id) = pick(&ids, n) {
                assert!(tree.remove(id), "live entries can be removed");
            }
        }
        Op::Move {
            source,
            target,
            pos,
        } => {
            if let Some(source) = pick(&ids, source) {
                let target = target.and_then(|t| pick(&ids, t));
                match tree.move_entry(source, target, pos) {
                    Ok(_) | Err(TreeError::WouldCycle { .. }) => {}
                    Err(e) => panic!("unexpected move failure: {e}"),
                }
            }
        }
        Op::Expand(n) => {
            if let Some(id) = pick(&ids, n) {
                tree.expand(view, id);
            }
        }
        Op::Collapse(n) => {
            if let Some(id) = pick(&ids, n) {
                tree.collapse(view, id);
            }
        }
        Op::Select(n) => {
            if let Some(id) = pick(&ids, n) {
                tree.select(view, id, true);
            }
        }
    }
}

fn build(ops: &[Op]) -> TreeList<u8> {
    let mut tree = TreeList::new();
    let view = tree.owner_view();
    for op in ops {
        apply(&mut tree, view, op);
    }
    tree
}

/// Pre-order walk through the child lists, independent of the cached positions.
fn walk(tree: &TreeList<u8>, parent: Option<EntryId>, out: &mut Vec<EntryId>) {
    for &child in tree.children_of(parent) {
        out.push(child);
        walk(tree, Some(child), out);
    }
}

fn visible_walk(
    tree: &TreeList<u8>,
    view: ViewId,
    parent: Option<EntryId>,
    out: &mut Vec<EntryId>,
) {
    for &child in tree.children_of(parent) {
        out.push(child);
        if tree.is_expanded(view, child) {
            visible_walk(tree, view, Some(child), out);
        }
    }
}

fn pre_order(tree: &TreeList<u8>) -> Vec<EntryId> {
    let mut out = Vec::new();
    walk(tree, None, &mut out);
    out
}

fn keys(tree: &TreeList<u8>) -> Vec<(Option<usize>, u8)> {
    tree.iter()
        .map(|id| (tree.depth(id), *tree.payload(id).unwrap()))
        .collect()
}

proptest! {
    #[test]
    fn entry_count_matches_walk(ops in prop::collection::vec(op(), 0..64)) {
        let tree = build(&ops);
        let order = pre_order(&tree);
        prop_assert_eq!(tree.entry_count(), order.len());
        prop_assert_eq!(tree.iter().collect::<Vec<_>>(), order);
    }

    #[test]
    fn abs_positions_match_walk(ops in prop::collection::vec(op(), 0..64)) {
        let mut tree = build(&ops);
        let order = pre_order(&tree);
        for (i, &id) in order.iter().enumerate() {
            prop_assert_eq!(tree.abs_pos(id), Some(i));
            prop_assert_eq!(tree.entry_at_abs_pos(i), Some(id));
        }
        prop_assert_eq!(tree.entry_at_abs_pos(order.len()), None);
    }

    #[test]
    fn visible_positions_match_walk(ops in prop::collection::vec(op(), 0..64)) {
        let mut tree = build(&ops);
        let view = tree.owner_view();
        let mut visible = Vec::new();
        visible_walk(&tree, view, None, &mut visible);
        prop_assert_eq!(tree.visible_count(view), visible.len());
        for id in pre_order(&tree) {
            let expected = visible.iter().position(|&v| v == id);
            prop_assert_eq!(tree.visible_pos(view, id), expected);
            prop_assert_eq!(tree.is_entry_visible(view, id), expected.is_some());
        }
        for (i, &id) in visible.iter().enumerate() {
            prop_assert_eq!(tree.entry_at_visible_pos(view, i), Some(id));
        }
    }

    #[test]
    fn resort_is_idempotent(ops in prop::collection::vec(op(), 0..64), descending in any::<bool>()) {
        let mut tree = build(&ops);
        tree.set_sort_mode(if descending { SortMode::Descending } else { SortMode::Ascending });
        tree.set_compare_handler(|a: &u8, b: &u8| a.cmp(b));
        tree.resort();
        let once = keys(&tree);
        tree.resort();
        prop_assert_eq!(keys(&tree), once);

        for parent in core::iter::once(None).chain(tree.iter().map(Some)) {
            let children = tree.children_of(parent);
            for pair in children.windows(2) {
                let ordering = tree.compare(pair[0], pair[1]).unwrap();
                if descending {
                    prop_assert!(ordering.is_ge());
                } else {
                    prop_assert!(ordering.is_le());
                }
            }
        }
    }

    #[test]
    fn removal_keeps_selection_exact(ops in prop::collection::vec(op(), 0..64), victim in any::<usize>()) {
        let mut tree = build(&ops);
        let view = tree.owner_view();
        let ids = pre_order(&tree);
        if let Some(victim) = pick(&ids, victim) {
            let mut doomed = vec![victim];
            walk(&tree, Some(victim), &mut doomed);
            tree.remove(victim);
            for id in doomed {
                prop_assert!(!tree.is_alive(id));
                prop_assert!(!tree.is_selected(view, id));
                prop_assert!(tree.view_data(view, id).is_none());
            }
        }
        let selected = tree.iter().filter(|&id| tree.is_selected(view, id)).count();
        prop_assert_eq!(tree.selection_count(view), selected);
    }

    #[test]
    fn cyclic_move_changes_nothing(ops in prop::collection::vec(op(), 0..64)) {
        let mut tree = build(&ops);
        let heard = Rc::new(Cell::new(0_usize));
        let sink = heard.clone();
        tree.add_view_with_listener(move |_: &TreeList<u8>, _: ViewId, _: &Notification| {
            sink.set(sink.get() + 1);
        });
        let before = pre_order(&tree);
        let count = tree.entry_count();
        for &source in &before {
            let mut below = Vec::new();
            walk(&tree, Some(source), &mut below);
            for target in core::iter::once(source).chain(below) {
                let result = tree.move_entry(source, Some(target), 0);
                prop_assert_eq!(result, Err(TreeError::WouldCycle { moved: source, target }));
            }
        }
        prop_assert_eq!(pre_order(&tree), before);
        prop_assert_eq!(tree.entry_count(), count);
        prop_assert_eq!(heard.get(), 0);
    }
}
