//! Incremental tree reconciliation
//!
//! Folds a freshly built logical [`Forest`] into the long-lived [`DisplayedForest`] with as
//! few structural edits as possible. Nodes that match by identity are reused in place, so
//! they keep their expanded flag and only their row may change.
//!
//! ## Algorithm
//!
//! Each pair of sibling lists (displayed, logical) is walked with two cursors:
//!
//! 1. Displayed list exhausted: the logical node is added (with its whole subtree)
//! 2. Logical list exhausted: the displayed node is removed (descendants first)
//! 3. Same identity: the node is reused, then its child lists are diffed the same way
//! 4. Mismatch: both lists are scanned ahead for the other side's node. A nearer match in
//!    the logical list means the run before it is new; a nearer match in the displayed list
//!    means the run before it is gone. With no match at all one node is added.
//!
//! Sibling lists are diffed with an explicit stack of frames, so deep reply chains do not
//! recurse.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::models::{MessageSummary, NodeKey};

use super::container::ContainerId;
use super::displayed::{DisplayRowMap, DisplayedForest};
use super::forest::{Forest, free_forest};

/// One edit of the displayed forest, in the order it was applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum RowChange {
    Inserted {
        key: NodeKey,
        parent: Option<NodeKey>,
        position: usize,
        row: usize,
    },
    Removed {
        key: NodeKey,
        row: usize,
    },
    /// A reused node whose row changed
    Moved {
        key: NodeKey,
        from: usize,
        to: usize,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    changes: Vec<RowChange>,
}

impl ReconcileReport {
    pub fn changes(&self) -> &[RowChange] {
        &self.changes
    }

    pub fn added(&self) -> usize {
        self.count(|change| matches!(change, RowChange::Inserted { .. }))
    }

    pub fn removed(&self) -> usize {
        self.count(|change| matches!(change, RowChange::Removed { .. }))
    }

    pub fn moved(&self) -> usize {
        self.count(|change| matches!(change, RowChange::Moved { .. }))
    }

    /// True when no node was added or removed and no row changed
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// True when only rows changed
    pub fn is_structurally_unchanged(&self) -> bool {
        self.added() == 0 && self.removed() == 0
    }

    pub(super) fn push(&mut self, change: RowChange) {
        self.changes.push(change);
    }

    fn count(&self, predicate: impl Fn(&RowChange) -> bool) -> usize {
        self.changes.iter().filter(|change| predicate(change)).count()
    }
}

impl IntoIterator for ReconcileReport {
    type Item = RowChange;
    type IntoIter = std::vec::IntoIter<RowChange>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}

/// Update `displayed` to match `logical`, keeping `row_map` in sync
///
/// The logical forest is consumed; summaries still referenced by displayed nodes survive it.
pub fn reconcile(
    displayed: &mut DisplayedForest,
    logical: Forest,
    row_map: &mut DisplayRowMap,
) -> ReconcileReport {
    let mut diff = SubtreeDiff {
        keys: logical.iter().map(|(_, id)| (id, logical.node_key(id))).collect(),
        logical: &logical,
        displayed: &mut *displayed,
        row_map: &mut *row_map,
        report: ReconcileReport::default(),
        row: 0,
    };
    diff.run();
    let report = diff.report;
    displayed.finish_update();

    log::debug!(
        "reconciled forest: {} added, {} removed, {} moved",
        report.added(),
        report.removed(),
        report.moved()
    );
    free_forest(logical);
    report
}

/// Cursor pair over one displayed sibling list and its logical counterpart
#[derive(Debug, Clone, Copy)]
struct Frame {
    /// Displayed parent (None for the root list)
    parent: Option<usize>,
    /// Logical parent (None for the root list)
    logical_parent: Option<ContainerId>,
    /// Cursor into the displayed list
    pos: usize,
    /// Cursor into the logical list
    next: usize,
}

struct SubtreeDiff<'a> {
    logical: &'a Forest,
    keys: HashMap<ContainerId, NodeKey>,
    displayed: &'a mut DisplayedForest,
    row_map: &'a mut DisplayRowMap,
    report: ReconcileReport,
    /// Pre-order row of the next node placed
    row: usize,
}

impl SubtreeDiff<'_> {
    fn run(&mut self) {
        let mut stack = vec![Frame {
            parent: None,
            logical_parent: None,
            pos: 0,
            next: 0,
        }];

        while let Some(top) = stack.len().checked_sub(1) {
            let mut frame = stack[top];
            let logical_len = self.logical_list(frame.logical_parent).len();
            let displayed_len = self.displayed.child_list(frame.parent).len();

            if frame.pos >= displayed_len && frame.next >= logical_len {
                stack.pop();
                continue;
            }

            if frame.pos >= displayed_len {
                log::trace!("out of displayed nodes, adding");
                self.add_run(&mut frame, 1);
                stack[top] = frame;
                continue;
            }

            if frame.next >= logical_len {
                log::trace!("out of logical nodes, removing");
                self.remove_run(&frame, 1);
                continue;
            }

            let old = self.displayed.child_list(frame.parent)[frame.pos];
            let new = self.logical_list(frame.logical_parent)[frame.next];

            if self.displayed.node(old).key == self.keys[&new] {
                self.reuse(old, new);
                frame.pos += 1;
                frame.next += 1;
                stack[top] = frame;

                if !self.displayed.node(old).children.is_empty()
                    || !self.logical.children(new).is_empty()
                {
                    stack.push(Frame {
                        parent: Some(old),
                        logical_parent: Some(new),
                        pos: 0,
                        next: 0,
                    });
                }
                continue;
            }

            let (i, new_match) = self.scan_logical(&frame, &self.displayed.node(old).key);
            let (j, old_match) = self.scan_displayed(&frame, &self.keys[&new]);

            if i < j {
                // Shorter run of logical nodes: those are additions
                log::trace!("adding run of {} nodes", i);
                let count = if new_match { i } else { 1 };
                self.add_run(&mut frame, count);
            } else if old_match {
                // Shorter run of displayed nodes: those are removals
                log::trace!("removing run of {} nodes", j);
                self.remove_run(&frame, j);
            } else {
                log::trace!("no match on either side, adding one node");
                self.add_run(&mut frame, 1);
            }
            stack[top] = frame;
        }
    }

    fn logical_list(&self, logical_parent: Option<ContainerId>) -> &'_ [ContainerId] {
        match logical_parent {
            Some(id) => self.logical.children(id),
            None => self.logical.roots(),
        }
    }

    /// Distance from the logical cursor to the node matching `key`, or to the list end
    fn scan_logical(&self, frame: &Frame, key: &NodeKey) -> (usize, bool) {
        let list = self.logical_list(frame.logical_parent);
        let mut i = 1;
        while frame.next + i < list.len() {
            if self.keys[&list[frame.next + i]] == *key {
                return (i, true);
            }
            i += 1;
        }
        (i, false)
    }

    /// Distance from the displayed cursor to the node matching `key`, or to the list end
    fn scan_displayed(&self, frame: &Frame, key: &NodeKey) -> (usize, bool) {
        let list = self.displayed.child_list(frame.parent);
        let mut j = 1;
        while frame.pos + j < list.len() {
            if self.displayed.node(list[frame.pos + j]).key == *key {
                return (j, true);
            }
            j += 1;
        }
        (j, false)
    }

    fn reuse(&mut self, old: usize, new: ContainerId) {
        let summary: Option<Arc<MessageSummary>> = self.logical.summary(new).cloned();
        self.displayed.node_mut(old).summary = summary;
        self.displayed
            .relabel(old, self.row, self.row_map, &mut self.report);
        self.row += 1;
    }

    /// Remove `count` displayed nodes at the cursor
    fn remove_run(&mut self, frame: &Frame, count: usize) {
        for _ in 0..count {
            self.displayed.remove_subtree_at(
                frame.parent,
                frame.pos,
                self.row,
                self.row_map,
                &mut self.report,
            );
        }
    }

    /// Add `count` logical nodes (with their subtrees) at the cursor
    fn add_run(&mut self, frame: &mut Frame, count: usize) {
        for _ in 0..count {
            let new = self.logical_list(frame.logical_parent)[frame.next];
            self.add_subtree(frame.parent, frame.pos, new);
            frame.pos += 1;
            frame.next += 1;
        }
    }

    /// Insert a logical subtree in pre-order, rows included
    fn add_subtree(&mut self, parent: Option<usize>, position: usize, root: ContainerId) {
        let mut stack = vec![(parent, position, root)];

        while let Some((parent, position, id)) = stack.pop() {
            let key = self.keys[&id].clone();
            let expanded = self.displayed.initial_expanded(&key);
            let node = self.displayed.insert_node(
                parent,
                position,
                key.clone(),
                self.logical.summary(id).cloned(),
                self.row,
                expanded,
            );
            self.row_map.set(key.clone(), self.row);
            self.report.push(RowChange::Inserted {
                key,
                parent: parent.map(|p| self.displayed.node(p).key.clone()),
                position,
                row: self.row,
            });
            self.row += 1;

            let children = self.logical.children(id);
            for (index, child) in children.iter().enumerate().rev() {
                stack.push((Some(node), index, *child));
            }
        }
    }
}
