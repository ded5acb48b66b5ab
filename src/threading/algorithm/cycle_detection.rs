//! Cycle detection for thread linking
//!
//! Ensures that parent-child relationships don't create cycles in the container arena.
//! A cycle would occur if we tried to make a container a descendant of its own descendant.

use std::collections::HashSet;

use super::super::container::{ContainerArena, ContainerId};

/// Check if linking `child` under `parent` would create a cycle
///
/// Walks up the ancestry chain from the proposed parent. If the child shows up anywhere
/// in that chain (including the parent itself), the link would make the child its own
/// ancestor.
///
/// ## Example
///
/// ```text
/// Current tree:  A → B → C
///
/// Trying to link: A under C (would create cycle A → B → C → A)
/// Result: true (cycle detected)
///
/// Trying to link: D under C (D is not in chain)
/// Result: false (safe to link)
/// ```
pub fn would_create_cycle(arena: &ContainerArena, child: ContainerId, parent: ContainerId) -> bool {
    // Track visited nodes so a corrupt parent chain cannot loop forever
    let mut visited = HashSet::new();
    let mut current = Some(parent);

    while let Some(id) = current {
        if id == child || !visited.insert(id) {
            return true;
        }
        current = arena[id].parent();
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::threading::container::Container;

    fn create_test_chain(arena: &mut ContainerArena, keys: &[&str]) -> Vec<ContainerId> {
        let ids: Vec<ContainerId> = keys
            .iter()
            .map(|key| arena.push(Container::new_placeholder(key.to_string())))
            .collect();
        for pair in ids.windows(2) {
            arena.add_child(pair[0], pair[1]);
        }
        ids
    }

    #[test]
    fn test_no_cycle_simple_chain() {
        let mut arena = ContainerArena::new();
        let chain = create_test_chain(&mut arena, &["A", "B", "C"]);
        let d = arena.push(Container::new_placeholder("D".into()));

        // Linking D under C is safe
        assert!(!would_create_cycle(&arena, d, chain[2]));
    }

    #[test]
    fn test_cycle_detected() {
        let mut arena = ContainerArena::new();
        let chain = create_test_chain(&mut arena, &["A", "B", "C"]);

        // Linking A under C would create a cycle
        assert!(would_create_cycle(&arena, chain[0], chain[2]));
    }

    #[test]
    fn test_self_loop() {
        let mut arena = ContainerArena::new();
        let a = arena.push(Container::new_placeholder("A".into()));

        assert!(would_create_cycle(&arena, a, a));
    }
}
