//! Tree traversal utilities for thread forests
//!
//! All functions use an explicit stack instead of recursion so that pathological reply
//! chains (thousands of messages deep) cannot exhaust the call stack.

use super::super::container::{ContainerArena, ContainerId};

/// Find the first container with a real message in a subtree, in pre-order
///
/// Returns the root itself when it wraps a message.
pub fn find_first_real_message(arena: &ContainerArena, root: ContainerId) -> Option<ContainerId> {
    let mut search_stack = vec![root];

    while let Some(current) = search_stack.pop() {
        let container = &arena[current];
        if !container.is_placeholder() {
            return Some(current);
        }

        // Add children in reverse order to maintain DFS left-to-right order
        for child in container.children().iter().rev() {
            search_stack.push(*child);
        }
    }

    None
}

/// Containers of a forest in post-order (children before their parent)
pub fn collect_postorder(arena: &ContainerArena, roots: &[ContainerId]) -> Vec<ContainerId> {
    let mut collected = Vec::new();
    // (container, children already pushed)
    let mut traversal_stack: Vec<(ContainerId, bool)> =
        roots.iter().rev().map(|id| (*id, false)).collect();

    while let Some((current, expanded)) = traversal_stack.pop() {
        if expanded {
            collected.push(current);
            continue;
        }
        traversal_stack.push((current, true));
        for child in arena[current].children().iter().rev() {
            traversal_stack.push((*child, false));
        }
    }

    collected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageSummary;
    use crate::threading::container::Container;
    use std::sync::Arc;

    fn create_test_container(arena: &mut ContainerArena, uid: Option<&str>) -> ContainerId {
        let mut container = Container::new_keyless();
        container.summary = uid.map(|uid| Arc::new(MessageSummary::new(uid, 0)));
        arena.push(container)
    }

    #[test]
    fn test_find_real_message_immediate() {
        let mut arena = ContainerArena::new();
        let a = create_test_container(&mut arena, Some("A"));

        assert_eq!(find_first_real_message(&arena, a), Some(a));
    }

    #[test]
    fn test_find_real_message_in_grandchild() {
        let mut arena = ContainerArena::new();
        let a = create_test_container(&mut arena, None);
        let b = create_test_container(&mut arena, None);
        let c = create_test_container(&mut arena, Some("C"));
        let d = create_test_container(&mut arena, Some("D"));
        arena.add_child(a, b);
        arena.add_child(b, c);
        arena.add_child(a, d);

        // Pre-order reaches C (under B) before D
        assert_eq!(find_first_real_message(&arena, a), Some(c));
    }

    #[test]
    fn test_find_real_message_none() {
        let mut arena = ContainerArena::new();
        let a = create_test_container(&mut arena, None);

        assert_eq!(find_first_real_message(&arena, a), None);
    }

    #[test]
    fn test_collect_postorder_children_first() {
        let mut arena = ContainerArena::new();
        let a = create_test_container(&mut arena, Some("A"));
        let b = create_test_container(&mut arena, Some("B"));
        let c = create_test_container(&mut arena, Some("C"));
        arena.add_child(a, b);
        arena.add_child(a, c);

        assert_eq!(collect_postorder(&arena, &[a]), vec![b, c, a]);
    }

    #[test]
    fn test_deep_chain_does_not_recurse() {
        let mut arena = ContainerArena::new();
        let root = create_test_container(&mut arena, None);
        let mut previous = root;
        for _ in 0..49_999 {
            let next = create_test_container(&mut arena, None);
            arena.add_child(previous, next);
            previous = next;
        }
        let leaf = create_test_container(&mut arena, Some("leaf"));
        arena.add_child(previous, leaf);

        assert_eq!(find_first_real_message(&arena, root), Some(leaf));
        assert_eq!(collect_postorder(&arena, &[root]).len(), 50_001);
    }
}
