//! The displayed forest
//!
//! A [`DisplayedForest`] is the long-lived, primary-thread copy of a thread forest that the
//! rendering layer reads. It survives rebuilds: each new logical [`Forest`] is folded into it
//! by [`reconcile`], so unchanged nodes keep their identity and their expanded flag.
//!
//! Nodes live in a slot arena; removed slots are recycled. Every live node is indexed by its
//! [`NodeKey`].

use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::Arc;

use crate::config::ThreadingConfig;
use crate::error::{ThreadingError, ThreadingResult};
use crate::models::{FolderChanges, MessageSummary, NodeKey};

use super::expansion::{ExpansionState, ForceExpansion};
use super::forest::Forest;
use super::reconcile::{ReconcileReport, RowChange, reconcile};

/// Current row of every displayed node, keyed by identity.
///
/// Rows are positions in a pre-order walk over the whole displayed forest, collapsed
/// subtrees included.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayRowMap {
    rows: HashMap<NodeKey, usize>,
}

impl DisplayRowMap {
    pub fn new() -> Self {
        DisplayRowMap::default()
    }

    pub fn get(&self, key: &NodeKey) -> Option<usize> {
        self.rows.get(key).copied()
    }

    /// Row of `key`, or `RowNotFound` when it is not displayed
    pub fn row_of(&self, key: &NodeKey) -> ThreadingResult<usize> {
        self.get(key)
            .ok_or_else(|| ThreadingError::row_not_found(key.to_string()))
    }

    pub fn row_of_uid(&self, uid: &str) -> ThreadingResult<usize> {
        self.row_of(&NodeKey::Message(uid.to_string()))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeKey, usize)> {
        self.rows.iter().map(|(key, row)| (key, *row))
    }

    pub(super) fn set(&mut self, key: NodeKey, row: usize) {
        self.rows.insert(key, row);
    }

    pub(super) fn remove(&mut self, key: &NodeKey) {
        self.rows.remove(key);
    }

    pub(super) fn clear(&mut self) {
        self.rows.clear();
    }
}

#[derive(Debug, Clone)]
pub(super) struct DisplayNode {
    pub(super) key: NodeKey,
    pub(super) summary: Option<Arc<MessageSummary>>,
    pub(super) parent: Option<usize>,
    pub(super) children: Vec<usize>,
    pub(super) expanded: bool,
    pub(super) row: usize,
    live: bool,
}

#[derive(Debug, Clone)]
pub struct DisplayedForest {
    nodes: Vec<DisplayNode>,
    free: Vec<usize>,
    roots: Vec<usize>,
    by_key: HashMap<NodeKey, usize>,
    /// Expanded flags of nodes removed during the current update
    detached: HashMap<NodeKey, bool>,
    expansion: ExpansionState,
    force: ForceExpansion,
    expand_default: bool,
}

impl Default for DisplayedForest {
    fn default() -> Self {
        DisplayedForest::new()
    }
}

impl DisplayedForest {
    /// An empty displayed forest that expands new nodes by default
    pub fn new() -> Self {
        DisplayedForest {
            nodes: Vec::new(),
            free: Vec::new(),
            roots: Vec::new(),
            by_key: HashMap::new(),
            detached: HashMap::new(),
            expansion: ExpansionState::new(),
            force: ForceExpansion::None,
            expand_default: true,
        }
    }

    /// First build: show `logical` from scratch
    ///
    /// Any previous content is discarded without emitting removals, and new nodes take their
    /// expanded flag from `expansion` and the configured default.
    pub fn populate(
        &mut self,
        logical: Forest,
        expansion: ExpansionState,
        config: &ThreadingConfig,
        row_map: &mut DisplayRowMap,
    ) -> ReconcileReport {
        let force = self.force;
        *self = DisplayedForest::new();
        self.expansion = expansion;
        self.expand_default = config.expand_default;
        self.force = force;
        row_map.clear();

        reconcile(self, logical, row_map)
    }

    pub fn set_expansion_state(&mut self, expansion: ExpansionState) {
        self.expansion = expansion;
    }

    pub fn set_expand_default(&mut self, expand_default: bool) {
        self.expand_default = expand_default;
    }

    pub fn set_force_expansion(&mut self, force: ForceExpansion) {
        self.force = force;
    }

    pub fn force_expansion(&self) -> ForceExpansion {
        self.force
    }

    /// Number of displayed nodes
    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn contains(&self, key: &NodeKey) -> bool {
        self.by_key.contains_key(key)
    }

    pub fn root_keys(&self) -> Vec<NodeKey> {
        self.roots.iter().map(|id| self.nodes[*id].key.clone()).collect()
    }

    pub fn children_of(&self, key: &NodeKey) -> ThreadingResult<Vec<NodeKey>> {
        let id = self.lookup(key)?;
        Ok(self.nodes[id]
            .children
            .iter()
            .map(|child| self.nodes[*child].key.clone())
            .collect())
    }

    pub fn parent_of(&self, key: &NodeKey) -> ThreadingResult<Option<NodeKey>> {
        let id = self.lookup(key)?;
        Ok(self.nodes[id].parent.map(|parent| self.nodes[parent].key.clone()))
    }

    pub fn summary_of(&self, key: &NodeKey) -> Option<&Arc<MessageSummary>> {
        self.by_key
            .get(key)
            .and_then(|id| self.nodes[*id].summary.as_ref())
    }

    pub fn is_expanded(&self, key: &NodeKey) -> ThreadingResult<bool> {
        let id = self.lookup(key)?;
        Ok(self.nodes[id].expanded)
    }

    pub fn set_expanded(&mut self, key: &NodeKey, expanded: bool) -> ThreadingResult<()> {
        let id = self.lookup(key)?;
        self.nodes[id].expanded = expanded;
        Ok(())
    }

    /// Expand every node, including nodes added by later reconciles
    pub fn expand_all(&mut self) {
        self.set_all_expanded(true);
        self.force = ForceExpansion::ExpandAll;
    }

    /// Collapse every node, including nodes added by later reconciles
    pub fn collapse_all(&mut self) {
        self.set_all_expanded(false);
        self.force = ForceExpansion::CollapseAll;
    }

    fn set_all_expanded(&mut self, expanded: bool) {
        for node in self.nodes.iter_mut().filter(|node| node.live) {
            node.expanded = expanded;
        }
    }

    /// Keys in display order, skipping the descendants of collapsed nodes
    pub fn visible_rows(&self) -> Vec<NodeKey> {
        let mut visible = Vec::new();
        let mut stack: Vec<usize> = self.roots.iter().rev().copied().collect();

        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            visible.push(node.key.clone());
            if node.expanded {
                stack.extend(node.children.iter().rev());
            }
        }

        visible
    }

    /// Identities of nodes with children whose expanded flag differs from the default
    ///
    /// With the default of expanded threads these are the collapsed ones; with collapsed
    /// threads by default, the ones the user opened.
    pub fn collapsed_markers(&self) -> ExpansionState {
        ExpansionState::from_markers(
            self.nodes
                .iter()
                .filter(|node| {
                    node.live && node.expanded != self.expand_default && !node.children.is_empty()
                })
                .map(|node| node.key.save_id().to_string()),
        )
    }

    /// Pick where the cursor should go when its message may stop being selectable
    ///
    /// Starting at the cursor's visible row, returns the first selectable message at or below
    /// it, else the nearest one above it. Returns None when the cursor is not displayed or no
    /// visible message qualifies.
    pub fn next_selectable<F>(&self, cursor_uid: &str, is_selectable: F) -> Option<String>
    where
        F: Fn(&MessageSummary) -> bool,
    {
        let visible = self.visible_summaries();
        let cursor = NodeKey::Message(cursor_uid.to_string());
        let start = visible.iter().position(|(key, _)| **key == cursor)?;

        let selectable = |index: &usize| {
            visible[*index]
                .1
                .filter(|summary| is_selectable(*summary))
                .map(|summary| summary.uid.clone())
        };

        (start..visible.len())
            .find_map(|index| selectable(&index))
            .or_else(|| (0..start).rev().find_map(|index| selectable(&index)))
    }

    /// Row of the cursor message after a rebuild
    ///
    /// `RowNotFound` means the cursor message is gone and the caller should clear its
    /// selection.
    pub fn restore_cursor(
        &self,
        cursor_uid: &str,
        row_map: &DisplayRowMap,
    ) -> ThreadingResult<usize> {
        row_map.row_of_uid(cursor_uid)
    }

    fn visible_summaries(&self) -> Vec<(&NodeKey, Option<&MessageSummary>)> {
        let mut visible = Vec::new();
        let mut stack: Vec<usize> = self.roots.iter().rev().copied().collect();

        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            visible.push((&node.key, node.summary.as_deref()));
            if node.expanded {
                stack.extend(node.children.iter().rev());
            }
        }

        visible
    }

    /// Incremental update for unthreaded display
    ///
    /// Removed uids are dropped, added summaries are appended as roots at the end, and the
    /// remaining rows are relabelled.
    pub fn flat_update(
        &mut self,
        changes: &FolderChanges,
        row_map: &mut DisplayRowMap,
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        for uid in &changes.removed {
            let key = NodeKey::Message(uid.clone());
            let Some(id) = self.by_key.get(&key).copied() else {
                log::debug!("flat update: uid {} is not displayed", uid);
                continue;
            };
            let parent = self.nodes[id].parent;
            if let Some(position) = self.child_list(parent).iter().position(|c| *c == id) {
                let row = self.preorder_position(id);
                self.remove_subtree_at(parent, position, row, row_map, &mut report);
            }
        }

        let mut row = self.relabel_rows(row_map, &mut report);

        for summary in &changes.added {
            let key = NodeKey::Message(summary.uid.clone());
            if self.by_key.contains_key(&key) {
                log::debug!("flat update: uid {} already displayed", summary.uid);
                continue;
            }
            let position = self.roots.len();
            let expanded = self.initial_expanded(&key);
            self.insert_node(
                None,
                position,
                key.clone(),
                Some(Arc::new(summary.clone())),
                row,
                expanded,
            );
            row_map.set(key.clone(), row);
            report.push(RowChange::Inserted {
                key,
                parent: None,
                position,
                row,
            });
            row += 1;
        }

        self.finish_update();
        report
    }

    /// Recompute every row in pre-order, reporting changed rows; returns the row count
    fn relabel_rows(&mut self, row_map: &mut DisplayRowMap, report: &mut ReconcileReport) -> usize {
        let mut row = 0;
        let mut stack: Vec<usize> = self.roots.iter().rev().copied().collect();

        while let Some(id) = stack.pop() {
            self.relabel(id, row, row_map, report);
            row += 1;
            stack.extend(self.nodes[id].children.iter().rev());
        }

        row
    }

    /// Indented outline of the displayed forest, collapsed nodes marked with `+`
    pub fn render(&self) -> String {
        let mut out = String::new();
        let mut stack: Vec<(usize, usize)> = self.roots.iter().rev().map(|id| (*id, 0)).collect();

        while let Some((id, depth)) = stack.pop() {
            let node = &self.nodes[id];
            let marker = match (node.children.is_empty(), node.expanded) {
                (true, _) => ' ',
                (false, true) => '-',
                (false, false) => '+',
            };
            let indent = "  ".repeat(depth);
            let _ = match &node.summary {
                Some(summary) => {
                    writeln!(out, "{indent}{marker} [{}] {}", summary.uid, summary.subject)
                }
                None => writeln!(out, "{indent}{marker} <{}>", node.key),
            };
            stack.extend(node.children.iter().rev().map(|child| (*child, depth + 1)));
        }

        out
    }

    fn lookup(&self, key: &NodeKey) -> ThreadingResult<usize> {
        self.by_key
            .get(key)
            .copied()
            .ok_or_else(|| ThreadingError::row_not_found(key.to_string()))
    }

    // ===== Node surgery shared with the reconciler =====

    pub(super) fn node(&self, id: usize) -> &DisplayNode {
        &self.nodes[id]
    }

    pub(super) fn node_mut(&mut self, id: usize) -> &mut DisplayNode {
        &mut self.nodes[id]
    }

    pub(super) fn child_list(&self, parent: Option<usize>) -> &[usize] {
        match parent {
            Some(parent) => &self.nodes[parent].children,
            None => &self.roots,
        }
    }

    fn child_list_mut(&mut self, parent: Option<usize>) -> &mut Vec<usize> {
        match parent {
            Some(parent) => &mut self.nodes[parent].children,
            None => &mut self.roots,
        }
    }

    /// Expanded flag for a node about to be added
    ///
    /// A forced state wins, then a live node with the same identity, then a node with the
    /// same identity removed earlier in this update. Otherwise the configured default applies,
    /// flipped when the identity carries a marker.
    pub(super) fn initial_expanded(&self, key: &NodeKey) -> bool {
        match self.force {
            ForceExpansion::ExpandAll => return true,
            ForceExpansion::CollapseAll => return false,
            ForceExpansion::None => {}
        }
        if let Some(live) = self.by_key.get(key) {
            return self.nodes[*live].expanded;
        }
        if let Some(expanded) = self.detached.get(key) {
            return *expanded;
        }
        if self.expansion.is_marked(key) {
            return !self.expand_default;
        }
        self.expand_default
    }

    /// Create a node and insert it at `position` in `parent`'s child list
    pub(super) fn insert_node(
        &mut self,
        parent: Option<usize>,
        position: usize,
        key: NodeKey,
        summary: Option<Arc<MessageSummary>>,
        row: usize,
        expanded: bool,
    ) -> usize {
        let node = DisplayNode {
            key: key.clone(),
            summary,
            parent,
            children: Vec::new(),
            expanded,
            row,
            live: true,
        };
        let id = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = node;
                slot
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        };

        let siblings = self.child_list_mut(parent);
        let position = position.min(siblings.len());
        siblings.insert(position, id);
        self.by_key.insert(key, id);
        id
    }

    /// Remove the node at `position` of `parent`'s child list with all its descendants
    ///
    /// `row` is the node's current pre-order position. Nodes are removed last-first in
    /// pre-order, so every reported row is the node's position at the moment it goes and
    /// descendants go before their parent. Index and row entries are dropped only while they
    /// still point at the removed node, so a subtree that was re-added elsewhere keeps its new
    /// entries.
    pub(super) fn remove_subtree_at(
        &mut self,
        parent: Option<usize>,
        position: usize,
        row: usize,
        row_map: &mut DisplayRowMap,
        report: &mut ReconcileReport,
    ) {
        let id = self.child_list_mut(parent).remove(position);

        let mut subtree = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            subtree.push(current);
            stack.extend(self.nodes[current].children.iter().rev());
        }

        for (offset, current) in subtree.into_iter().enumerate().rev() {
            let node = &mut self.nodes[current];
            node.live = false;
            node.children.clear();
            node.parent = None;
            node.summary = None;
            let key = node.key.clone();
            self.detached.insert(key.clone(), node.expanded);

            if self.by_key.get(&key) == Some(&current) {
                self.by_key.remove(&key);
                row_map.remove(&key);
            }
            self.free.push(current);
            report.push(RowChange::Removed {
                key,
                row: row + offset,
            });
        }
    }

    /// Current pre-order position of a live node
    fn preorder_position(&self, id: usize) -> usize {
        let mut stack: Vec<usize> = self.roots.iter().rev().copied().collect();
        let mut position = 0;

        while let Some(current) = stack.pop() {
            if current == id {
                break;
            }
            position += 1;
            stack.extend(self.nodes[current].children.iter().rev());
        }

        position
    }

    /// Forget flags remembered from removed nodes once an update is complete
    pub(super) fn finish_update(&mut self) {
        self.detached.clear();
    }

    /// Give a reused node its new row
    pub(super) fn relabel(
        &mut self,
        id: usize,
        row: usize,
        row_map: &mut DisplayRowMap,
        report: &mut ReconcileReport,
    ) {
        let node = &mut self.nodes[id];
        if node.row != row {
            report.push(RowChange::Moved {
                key: node.key.clone(),
                from: node.row,
                to: row,
            });
            node.row = row;
        }
        if self.by_key.get(&node.key) == Some(&id) {
            row_map.set(node.key.clone(), row);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::threading::forest::build_forest;

    fn create_test_summary(uid: &str, order: u64, refs: &[&str]) -> MessageSummary {
        MessageSummary::new(uid, order)
            .with_message_id(uid)
            .with_references(refs.iter().copied())
            .with_subject(format!("subject {uid}"))
    }

    fn message(uid: &str) -> NodeKey {
        NodeKey::Message(uid.to_string())
    }

    fn create_test_display(summaries: &[MessageSummary]) -> (DisplayedForest, DisplayRowMap) {
        let mut displayed = DisplayedForest::new();
        let mut row_map = DisplayRowMap::new();
        displayed.populate(
            build_forest(summaries),
            ExpansionState::new(),
            &ThreadingConfig::builtin(),
            &mut row_map,
        );
        (displayed, row_map)
    }

    #[test]
    fn test_populate_assigns_preorder_rows() {
        let (displayed, row_map) = create_test_display(&[
            create_test_summary("a", 0, &[]),
            create_test_summary("b", 1, &["a"]),
            create_test_summary("c", 2, &[]),
        ]);

        assert_eq!(displayed.len(), 3);
        assert_eq!(row_map.row_of_uid("c").ok(), Some(0));
        assert_eq!(row_map.row_of_uid("a").ok(), Some(1));
        assert_eq!(row_map.row_of_uid("b").ok(), Some(2));
    }

    #[test]
    fn test_collapsed_nodes_hide_children() {
        let (mut displayed, _) = create_test_display(&[
            create_test_summary("a", 0, &[]),
            create_test_summary("b", 1, &["a"]),
        ]);

        displayed.set_expanded(&message("a"), false).expect("a displayed");

        assert_eq!(displayed.visible_rows(), vec![message("a")]);
        assert_eq!(
            displayed.collapsed_markers().markers().collect::<Vec<_>>(),
            vec!["a"]
        );
    }

    #[test]
    fn test_markers_decide_initial_state() {
        let mut displayed = DisplayedForest::new();
        let mut row_map = DisplayRowMap::new();
        displayed.populate(
            build_forest(&[
                create_test_summary("a", 0, &[]),
                create_test_summary("b", 1, &["a"]),
            ]),
            ExpansionState::from_markers(["a"]),
            &ThreadingConfig::builtin(),
            &mut row_map,
        );

        assert_eq!(displayed.is_expanded(&message("a")).ok(), Some(false));
        assert_eq!(displayed.is_expanded(&message("b")).ok(), Some(true));
    }

    #[test]
    fn test_unknown_key_is_row_not_found() {
        let (mut displayed, row_map) = create_test_display(&[create_test_summary("a", 0, &[])]);

        let err = displayed
            .set_expanded(&message("zzz"), true)
            .expect_err("not displayed");
        assert!(err.is_row_not_found());
        assert!(displayed.restore_cursor("zzz", &row_map).is_err());
        assert_eq!(displayed.restore_cursor("a", &row_map).ok(), Some(0));
    }

    #[test]
    fn test_next_selectable_prefers_rows_below() {
        let (displayed, _) = create_test_display(&[
            create_test_summary("a", 0, &[]),
            create_test_summary("b", 1, &[]),
            create_test_summary("c", 2, &[]),
        ]);
        // Display order is c, b, a

        let pick = displayed.next_selectable("b", |summary| summary.uid != "b");
        assert_eq!(pick.as_deref(), Some("a"));

        let pick = displayed.next_selectable("a", |summary| summary.uid == "c");
        assert_eq!(pick.as_deref(), Some("c"));

        let pick = displayed.next_selectable("b", |_| true);
        assert_eq!(pick.as_deref(), Some("b"));

        assert!(displayed.next_selectable("b", |_| false).is_none());
        assert!(displayed.next_selectable("missing", |_| true).is_none());
    }

    #[test]
    fn test_flat_update_removes_and_appends() {
        let mut config = ThreadingConfig::builtin();
        config.subject_grouping = false;
        let mut displayed = DisplayedForest::new();
        let mut row_map = DisplayRowMap::new();
        displayed.populate(
            build_forest(&[create_test_summary("a", 0, &[]), create_test_summary("b", 1, &[])]),
            ExpansionState::new(),
            &config,
            &mut row_map,
        );
        // Rows: b = 0, a = 1

        let changes = FolderChanges {
            added: vec![create_test_summary("c", 2, &[])],
            removed: vec!["b".to_string()],
        };
        let report = displayed.flat_update(&changes, &mut row_map);

        assert_eq!(report.added(), 1);
        assert_eq!(report.removed(), 1);
        assert_eq!(report.moved(), 1);
        assert_eq!(displayed.root_keys(), vec![message("a"), message("c")]);
        assert_eq!(row_map.row_of_uid("a").ok(), Some(0));
        assert_eq!(row_map.row_of_uid("c").ok(), Some(1));
        assert!(row_map.row_of_uid("b").is_err());
    }

    #[test]
    fn test_expand_all_applies_to_new_nodes() {
        let (mut displayed, mut row_map) = create_test_display(&[create_test_summary("a", 0, &[])]);
        displayed.collapse_all();

        reconcile(
            &mut displayed,
            build_forest(&[create_test_summary("a", 0, &[]), create_test_summary("b", 1, &["a"])]),
            &mut row_map,
        );

        assert_eq!(displayed.is_expanded(&message("a")).ok(), Some(false));
        assert_eq!(displayed.is_expanded(&message("b")).ok(), Some(false));
    }

    #[test]
    fn test_render_marks_collapsed() {
        let (mut displayed, _) = create_test_display(&[
            create_test_summary("a", 0, &[]),
            create_test_summary("b", 1, &["a"]),
        ]);
        assert_eq!(displayed.render(), "- [a] subject a\n    [b] subject b\n");

        displayed.set_expanded(&message("a"), false).expect("a displayed");
        assert!(displayed.render().starts_with("+ [a]"));
    }
}
