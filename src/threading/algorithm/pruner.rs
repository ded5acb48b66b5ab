//! Placeholder pruning
//!
//! Removes structurally useless placeholders in place:
//!
//! - a placeholder with no children is deleted
//! - a placeholder with exactly one child, or with a parent, is replaced by its children
//! - a root placeholder with two or more children is kept as a grouping node
//!
//! Containers are visited children-first, so every nested placeholder disappears and a
//! root's decision is made on its already-pruned child list.

use super::super::container::{ContainerArena, ContainerId};
use super::tree_traversal::collect_postorder;

/// Prune the placeholders of a forest, rewriting `roots` in place
pub fn prune_placeholders(arena: &mut ContainerArena, roots: &mut Vec<ContainerId>) {
    let mut pruned_roots = Vec::with_capacity(roots.len());
    let mut removed = 0usize;

    for root in roots.drain(..) {
        let order = collect_postorder(arena, &[root]);

        // The last entry of a post-order walk is the root itself
        for id in &order[..order.len() - 1] {
            if arena[*id].is_placeholder() {
                splice_nested(arena, *id);
                removed += 1;
            }
        }

        if !arena[root].is_placeholder() {
            pruned_roots.push(root);
            continue;
        }

        let children = arena[root].children.clone();
        match children.len() {
            0 => removed += 1,
            1 => {
                arena.detach(children[0]);
                pruned_roots.push(children[0]);
                removed += 1;
            }
            _ => pruned_roots.push(root),
        }
    }

    log::debug!(
        "pruned {} placeholders, {} roots remain",
        removed,
        pruned_roots.len()
    );
    *roots = pruned_roots;
}

/// Replace a parented placeholder by its children in its parent's child list
fn splice_nested(arena: &mut ContainerArena, placeholder: ContainerId) {
    let Some(parent) = arena[placeholder].parent else {
        return;
    };

    let children = std::mem::take(&mut arena[placeholder].children);
    for child in &children {
        arena[*child].parent = Some(parent);
    }

    let siblings = &mut arena[parent].children;
    if let Some(position) = siblings.iter().position(|id| *id == placeholder) {
        siblings.splice(position..=position, children);
    }
    arena[placeholder].parent = None;
}
