//! The logical thread forest
//!
//! A [`Forest`] is the output of the build pipeline: an arena of containers plus the ordered
//! list of roots. It is freshly allocated per build and never shared, so the whole pipeline
//! can run off the primary thread.
//!
//! ## Pipeline
//!
//! ```text
//! summaries → link_containers → prune_placeholders → group_by_subject → sort_forest
//! ```

use std::collections::HashSet;
use std::convert::Infallible;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::config::ThreadingConfig;
use crate::error::{ThreadingError, ThreadingResult};
use crate::models::{MessageSummary, NodeKey};

use super::algorithm::{link_containers, prune_placeholders, sort_forest};
use super::container::{Container, ContainerArena, ContainerId};
use super::subject_matching::group_by_subject;

/// Build a forest with the built-in configuration
///
/// Never fails: malformed per-message input is tolerated and logged.
pub fn build_forest(summaries: &[MessageSummary]) -> Forest {
    Forest::build(summaries, &ThreadingConfig::builtin())
}

/// Release a forest
///
/// Summaries that a displayed forest still holds stay alive through their shared handles.
pub fn free_forest(forest: Forest) {
    log::trace!("freeing forest with {} containers", forest.arena.len());
    drop(forest);
}

#[derive(Debug, Clone, Default)]
pub struct Forest {
    arena: ContainerArena,
    roots: Vec<ContainerId>,
}

impl Forest {
    pub fn build(summaries: &[MessageSummary], config: &ThreadingConfig) -> Forest {
        let Ok(forest) = Forest::run_pipeline(summaries, config, |_| Ok::<(), Infallible>(()));
        forest
    }

    /// Build a forest, giving up as soon as `token` is cancelled
    ///
    /// The token is checked at pipeline entry and between stages.
    pub fn build_cancellable(
        summaries: &[MessageSummary],
        config: &ThreadingConfig,
        token: &CancellationToken,
    ) -> ThreadingResult<Forest> {
        Forest::run_pipeline(summaries, config, |stage| {
            if token.is_cancelled() {
                log::debug!("thread build cancelled before {}", stage);
                Err(ThreadingError::cancelled(""))
            } else {
                Ok(())
            }
        })
    }

    fn run_pipeline<E>(
        summaries: &[MessageSummary],
        config: &ThreadingConfig,
        mut checkpoint: impl FnMut(&'static str) -> Result<(), E>,
    ) -> Result<Forest, E> {
        let started = Instant::now();

        checkpoint("linking")?;
        let (mut arena, mut roots) = link_containers(summaries);

        checkpoint("pruning")?;
        prune_placeholders(&mut arena, &mut roots);

        if config.subject_grouping {
            checkpoint("subject grouping")?;
            group_by_subject(&mut arena, &mut roots, config.parallel_threshold);
        }

        checkpoint("sorting")?;
        sort_forest(&mut arena, &mut roots, config.sort_order);

        log::debug!(
            "built forest: {} messages, {} roots in {:?}",
            summaries.len(),
            roots.len(),
            started.elapsed()
        );
        Ok(Forest { arena, roots })
    }

    pub fn roots(&self) -> &[ContainerId] {
        &self.roots
    }

    pub fn container(&self, id: ContainerId) -> &Container {
        &self.arena[id]
    }

    pub fn children(&self, id: ContainerId) -> &[ContainerId] {
        self.arena[id].children()
    }

    pub fn parent(&self, id: ContainerId) -> Option<ContainerId> {
        self.arena[id].parent()
    }

    pub fn summary(&self, id: ContainerId) -> Option<&Arc<MessageSummary>> {
        self.arena[id].summary()
    }

    pub fn node_key(&self, id: ContainerId) -> NodeKey {
        self.arena[id].node_key()
    }

    /// A message's own order, or for a placeholder the effective order of its first child
    pub fn effective_order(&self, id: ContainerId) -> Option<u64> {
        let mut current = id;
        loop {
            let container = &self.arena[current];
            if let Some(order) = container.order() {
                return Some(order);
            }
            current = *container.children().first()?;
        }
    }

    /// Number of reachable containers that wrap a message
    pub fn message_count(&self) -> usize {
        self.iter()
            .filter(|(_, id)| !self.arena[*id].is_placeholder())
            .count()
    }

    /// Number of reachable containers
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Pre-order walk yielding `(depth, id)`, roots at depth 0
    pub fn iter(&self) -> ForestIter<'_> {
        ForestIter {
            arena: &self.arena,
            stack: self.roots.iter().rev().map(|id| (*id, 0)).collect(),
        }
    }

    pub fn find(&self, key: &NodeKey) -> Option<ContainerId> {
        self.iter()
            .map(|(_, id)| id)
            .find(|id| self.arena[*id].node_key() == *key)
    }

    /// Check structural invariants with a walk bounded by the arena size
    ///
    /// Reports a revisited container, a parent/child disagreement, or an empty placeholder as
    /// an invariant violation.
    pub fn verify(&self) -> ThreadingResult<()> {
        let mut visited = HashSet::with_capacity(self.arena.len());
        let mut stack: Vec<(ContainerId, Option<ContainerId>)> =
            self.roots.iter().map(|id| (*id, None)).collect();

        while let Some((id, expected_parent)) = stack.pop() {
            if visited.len() > self.arena.len() || !visited.insert(id) {
                log::error!("forest walk revisited container {:?}", id);
                return Err(ThreadingError::invariant(format!(
                    "container {} reached twice",
                    id.index()
                )));
            }

            let container = &self.arena[id];
            if container.parent() != expected_parent {
                return Err(ThreadingError::invariant(format!(
                    "container {} has parent {:?}, expected {:?}",
                    id.index(),
                    container.parent(),
                    expected_parent
                )));
            }
            if container.is_placeholder() && container.children().is_empty() {
                return Err(ThreadingError::invariant(format!(
                    "placeholder {} has no children",
                    id.index()
                )));
            }

            stack.extend(container.children().iter().map(|child| (*child, Some(id))));
        }

        Ok(())
    }

    /// Indented text outline, one container per line
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (depth, id) in self.iter() {
            let container = &self.arena[id];
            let indent = "  ".repeat(depth);
            let _ = match container.summary() {
                Some(summary) => writeln!(
                    out,
                    "{indent}[{}] {} (#{})",
                    summary.uid, summary.subject, summary.order
                ),
                None => writeln!(out, "{indent}<{}>", container.node_key()),
            };
        }
        out
    }
}

pub struct ForestIter<'a> {
    arena: &'a ContainerArena,
    stack: Vec<(ContainerId, usize)>,
}

impl Iterator for ForestIter<'_> {
    type Item = (usize, ContainerId);

    fn next(&mut self) -> Option<Self::Item> {
        let (id, depth) = self.stack.pop()?;
        for child in self.arena[id].children().iter().rev() {
            self.stack.push((*child, depth + 1));
        }
        Some((depth, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SortOrder;

    fn create_test_summary(uid: &str, order: u64, refs: &[&str], subject: &str) -> MessageSummary {
        MessageSummary::new(uid, order)
            .with_message_id(uid)
            .with_references(refs.iter().copied())
            .with_subject(subject)
    }

    fn uid_of(forest: &Forest, id: ContainerId) -> &str {
        forest.summary(id).map(|s| s.uid.as_str()).unwrap_or("")
    }

    #[test]
    fn test_build_empty_collection() {
        let forest = build_forest(&[]);
        assert!(forest.is_empty());
        assert_eq!(forest.len(), 0);
        assert!(forest.verify().is_ok());
    }

    #[test]
    fn test_pipeline_produces_sorted_verified_forest() {
        let summaries = vec![
            create_test_summary("a", 0, &[], "Plan"),
            create_test_summary("b", 1, &["a"], "Re: Plan"),
            create_test_summary("c", 2, &[], "Other"),
            create_test_summary("d", 3, &["a"], "Re: Plan"),
        ];

        let forest = build_forest(&summaries);

        forest.verify().expect("valid forest");
        let roots: Vec<&str> = forest.roots().iter().map(|id| uid_of(&forest, *id)).collect();
        assert_eq!(roots, vec!["c", "a"]);

        let a = forest.roots()[1];
        let children: Vec<&str> = forest
            .children(a)
            .iter()
            .map(|id| uid_of(&forest, *id))
            .collect();
        assert_eq!(children, vec!["d", "b"]);
        assert_eq!(forest.message_count(), 4);
    }

    #[test]
    fn test_effective_order_of_placeholder() {
        let summaries = vec![
            create_test_summary("x", 4, &["missing"], "Re: Q"),
            create_test_summary("y", 9, &["missing"], "Re: Q"),
        ];
        let mut config = ThreadingConfig::builtin();
        config.subject_grouping = false;

        let forest = Forest::build(&summaries, &config);

        assert_eq!(forest.roots().len(), 1);
        let root = forest.roots()[0];
        assert_eq!(
            forest.node_key(root),
            NodeKey::Placeholder("missing".into())
        );
        assert_eq!(forest.effective_order(root), Some(9));
    }

    #[test]
    fn test_ascending_configuration() {
        let summaries = vec![
            create_test_summary("a", 0, &[], "One"),
            create_test_summary("b", 1, &[], "Two"),
        ];
        let mut config = ThreadingConfig::builtin();
        config.sort_order = SortOrder::Ascending;

        let forest = Forest::build(&summaries, &config);

        let roots: Vec<&str> = forest.roots().iter().map(|id| uid_of(&forest, *id)).collect();
        assert_eq!(roots, vec!["a", "b"]);
    }

    #[test]
    fn test_cancelled_build() {
        let token = CancellationToken::new();
        token.cancel();

        let result = Forest::build_cancellable(
            &[create_test_summary("a", 0, &[], "")],
            &ThreadingConfig::builtin(),
            &token,
        );

        assert!(matches!(result, Err(ThreadingError::Cancelled { .. })));
    }

    #[test]
    fn test_render_and_find() {
        let summaries = vec![
            create_test_summary("a", 0, &[], "Plan"),
            create_test_summary("b", 1, &["a"], "Re: Plan"),
        ];

        let forest = build_forest(&summaries);

        assert_eq!(forest.render(), "[a] Plan (#0)\n  [b] Re: Plan (#1)\n");
        let b = forest.find(&NodeKey::Message("b".into())).expect("b present");
        assert_eq!(forest.parent(b), Some(forest.roots()[0]));
        assert!(forest.find(&NodeKey::Message("zzz".into())).is_none());
    }
}
