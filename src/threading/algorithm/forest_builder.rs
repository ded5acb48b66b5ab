//! Reference-chain linking
//!
//! Turns an ordered collection of summaries into linked containers.
//!
//! ## Algorithm Overview
//!
//! 1. **Resolve**: find (or create) the container for each summary through the message index
//!    and attach the summary to it
//! 2. **Link References**: walk the reference list oldest to newest, making each reference the
//!    parent of the next one
//! 3. **Link Message**: the newest reference becomes the direct parent of the message
//! 4. **Find Roots**: every container left without a parent, in creation order
//!
//! Reparenting always detaches before attaching, and a link that would make a container its
//! own ancestor is skipped, so the result is a forest even for corrupt reference data.

use std::sync::Arc;

use crate::models::MessageSummary;

use super::super::container::{ContainerArena, ContainerId};
use super::super::message_index::MessageIndex;

/// Link `summaries` into containers and return the arena together with its root set
///
/// ## Arguments
///
/// - `summaries`: messages of one folder in collection order
///
/// ## Returns
///
/// The container arena and the ids of every unparented container, in creation order.
pub fn link_containers(summaries: &[MessageSummary]) -> (ContainerArena, Vec<ContainerId>) {
    let mut arena = ContainerArena::with_capacity(summaries.len() * 2);
    let mut index = MessageIndex::with_capacity(summaries.len() * 2);

    for summary in summaries {
        let container = resolve_container(&mut arena, &mut index, summary);
        arena[container].summary = Some(Arc::new(summary.clone()));

        link_reference_chain(&mut arena, &mut index, container, summary);
    }

    let roots = identify_roots(&arena);
    log::debug!(
        "linked {} summaries into {} containers ({} roots)",
        summaries.len(),
        arena.len(),
        roots.len()
    );

    (arena, roots)
}

/// Find the container a summary belongs in
///
/// A second message with an already-used key gets its own keyless slot so that neither
/// message disappears from the forest.
fn resolve_container(
    arena: &mut ContainerArena,
    index: &mut MessageIndex,
    summary: &MessageSummary,
) -> ContainerId {
    let Some(key) = summary.key() else {
        return index.get_or_create_keyless(arena, &summary.uid);
    };

    let container = index.get_or_create(arena, key);
    if arena[container].is_placeholder() {
        return container;
    }

    log::warn!(
        "duplicate message key '{}' (uid {}), threading it separately",
        key,
        summary.uid
    );
    index.get_or_create_keyless(arena, &summary.uid)
}

/// Build parent-child relationships from a summary's reference list
///
/// ## Example
///
/// ```text
/// Message d has references: a b c
///
/// Creates links:
///   a (parent) → b (child)
///   b (parent) → c (child)
///   c (parent) → d (child)
/// ```
fn link_reference_chain(
    arena: &mut ContainerArena,
    index: &mut MessageIndex,
    container: ContainerId,
    summary: &MessageSummary,
) {
    let mut previous: Option<ContainerId> = None;

    for reference in &summary.references {
        let reference = reference.trim();
        if reference.is_empty() {
            log::debug!("skipping empty reference in message {}", summary.uid);
            continue;
        }

        let current = index.get_or_create(arena, reference);
        if let Some(prev) = previous {
            if prev != current {
                arena.link(prev, current);
            }
        }
        previous = Some(current);
    }

    if let Some(parent) = previous {
        if parent != container {
            arena.link(parent, container);
        }
    }
}

fn identify_roots(arena: &ContainerArena) -> Vec<ContainerId> {
    arena
        .ids()
        .filter(|id| arena[*id].parent().is_none())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_summary(uid: &str, order: u64, key: &str, refs: &[&str]) -> MessageSummary {
        MessageSummary::new(uid, order)
            .with_message_id(key)
            .with_references(refs.iter().copied())
    }

    fn container_of(arena: &ContainerArena, key: &str) -> ContainerId {
        arena
            .ids()
            .find(|id| arena[*id].message_id() == Some(key))
            .expect("container registered")
    }

    #[test]
    fn test_simple_thread() {
        let summaries = vec![
            create_test_summary("1", 0, "msg1", &[]),
            create_test_summary("2", 1, "msg2", &["msg1"]),
        ];

        let (arena, roots) = link_containers(&summaries);

        assert_eq!(roots.len(), 1);
        let root = roots[0];
        assert_eq!(arena[root].summary().map(|s| s.uid.as_str()), Some("1"));
        assert_eq!(arena[root].children().len(), 1);
    }

    #[test]
    fn test_placeholder_root() {
        let summaries = vec![create_test_summary("2", 0, "msg2", &["msg1"])];

        let (arena, roots) = link_containers(&summaries);

        assert_eq!(roots.len(), 1);
        assert!(arena[roots[0]].is_placeholder());
        assert_eq!(arena[roots[0]].message_id(), Some("msg1"));
    }

    #[test]
    fn test_most_recent_reference_is_parent() {
        let summaries = vec![
            create_test_summary("d", 0, "d", &["a", "b", "c"]),
            create_test_summary("f", 1, "f", &["c", "d"]),
            create_test_summary("e", 2, "e", &["c"]),
        ];

        let (arena, roots) = link_containers(&summaries);

        assert_eq!(roots, vec![container_of(&arena, "a")]);
        let c = container_of(&arena, "c");
        let d = container_of(&arena, "d");
        let e = container_of(&arena, "e");
        let f = container_of(&arena, "f");
        assert_eq!(arena[c].children(), &[d, e]);
        assert_eq!(arena[f].parent(), Some(d));
    }

    #[test]
    fn test_empty_references_are_skipped() {
        let summaries = vec![
            create_test_summary("1", 0, "msg1", &[]),
            create_test_summary("2", 1, "msg2", &["", "msg1", "  "]),
        ];

        let (arena, roots) = link_containers(&summaries);

        assert_eq!(roots.len(), 1);
        assert_eq!(arena.len(), 2);
    }

    #[test]
    fn test_self_reference_does_not_cycle() {
        let summaries = vec![create_test_summary("1", 0, "msg1", &["msg1"])];

        let (arena, roots) = link_containers(&summaries);

        assert_eq!(roots.len(), 1);
        assert!(arena[roots[0]].children().is_empty());
    }

    #[test]
    fn test_contradicting_chains_stay_acyclic() {
        // b claims a is its parent, a claims b is its parent
        let summaries = vec![
            create_test_summary("a", 0, "a", &["b"]),
            create_test_summary("b", 1, "b", &["a"]),
        ];

        let (arena, roots) = link_containers(&summaries);

        assert_eq!(roots.len(), 1);
        assert_eq!(arena[roots[0]].children().len(), 1);
    }

    #[test]
    fn test_keyless_and_duplicate_messages_get_own_slots() {
        let summaries = vec![
            MessageSummary::new("1", 0),
            create_test_summary("2", 1, "dup", &[]),
            create_test_summary("3", 2, "dup", &[]),
        ];

        let (arena, roots) = link_containers(&summaries);

        assert_eq!(roots.len(), 3);
        assert!(roots.iter().all(|id| !arena[*id].is_placeholder()));
    }
}
