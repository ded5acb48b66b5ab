//! Deterministic sibling ordering
//!
//! Every sibling list is sorted by effective order: a message's own order value, or for a
//! placeholder the effective order of its first child once that child list is sorted. The
//! sort is stable, so equal orders keep their relative position.

use crate::config::SortOrder;

use super::super::container::{ContainerArena, ContainerId};
use super::tree_traversal::collect_postorder;

/// Sort every sibling list of the forest, roots included
pub fn sort_forest(arena: &mut ContainerArena, roots: &mut [ContainerId], sort_order: SortOrder) {
    let mut effective: Vec<u64> = vec![0; arena.len()];

    for id in collect_postorder(arena, roots) {
        let mut children = std::mem::take(&mut arena[id].children);
        sort_siblings(&mut children, &effective, sort_order);

        effective[id.index()] = arena[id]
            .order()
            .or_else(|| children.first().map(|first| effective[first.index()]))
            .unwrap_or(0);
        arena[id].children = children;
    }

    sort_siblings(roots, &effective, sort_order);
}

fn sort_siblings(siblings: &mut [ContainerId], effective: &[u64], sort_order: SortOrder) {
    match sort_order {
        SortOrder::Ascending => siblings.sort_by_key(|id| effective[id.index()]),
        SortOrder::Descending => {
            siblings.sort_by(|a, b| effective[b.index()].cmp(&effective[a.index()]))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageSummary;
    use crate::threading::container::Container;
    use std::sync::Arc;

    fn create_test_message(arena: &mut ContainerArena, uid: &str, order: u64) -> ContainerId {
        let mut container = Container::new_keyless();
        container.summary = Some(Arc::new(MessageSummary::new(uid, order)));
        arena.push(container)
    }

    #[test]
    fn test_descending_roots_and_children() {
        let mut arena = ContainerArena::new();
        let a = create_test_message(&mut arena, "a", 0);
        let b = create_test_message(&mut arena, "b", 5);
        let c = create_test_message(&mut arena, "c", 3);
        let d = create_test_message(&mut arena, "d", 1);
        arena.add_child(a, c);
        arena.add_child(a, d);
        let mut roots = vec![a, b];

        sort_forest(&mut arena, &mut roots, SortOrder::Descending);

        assert_eq!(roots, vec![b, a]);
        assert_eq!(arena[a].children(), &[c, d]);
    }

    #[test]
    fn test_ascending_order() {
        let mut arena = ContainerArena::new();
        let a = create_test_message(&mut arena, "a", 9);
        let b = create_test_message(&mut arena, "b", 2);
        let mut roots = vec![a, b];

        sort_forest(&mut arena, &mut roots, SortOrder::Ascending);

        assert_eq!(roots, vec![b, a]);
    }

    #[test]
    fn test_placeholder_sorts_by_first_sorted_child() {
        let mut arena = ContainerArena::new();
        let group = arena.push(Container::new_placeholder("p".into()));
        let low = create_test_message(&mut arena, "low", 1);
        let high = create_test_message(&mut arena, "high", 8);
        arena.add_child(group, low);
        arena.add_child(group, high);
        let middle = create_test_message(&mut arena, "middle", 4);
        let mut roots = vec![middle, group];

        sort_forest(&mut arena, &mut roots, SortOrder::Descending);

        // After sorting, the group's first child is "high" (8), so it beats "middle" (4)
        assert_eq!(roots, vec![group, middle]);
        assert_eq!(arena[group].children(), &[high, low]);
    }

    #[test]
    fn test_ties_keep_relative_order() {
        let mut arena = ContainerArena::new();
        let first = create_test_message(&mut arena, "first", 2);
        let second = create_test_message(&mut arena, "second", 2);
        let mut roots = vec![first, second];

        sort_forest(&mut arena, &mut roots, SortOrder::Descending);

        assert_eq!(roots, vec![first, second]);
    }
}
