//! Subject normalization and root grouping
//!
//! When reference headers are missing, replies end up as separate roots. This pass repairs
//! such threads by merging roots that share a normalized subject.
//!
//! Only the root set is considered; containers that are already nested are left alone.

use std::collections::HashMap;

use rayon::prelude::*;

use super::algorithm::tree_traversal::find_first_real_message;
use super::container::{Container, ContainerArena, ContainerId};

/// Strip leading whitespace and reply markers from a subject
///
/// A reply marker is `re` (any case), then any run of digits or punctuation other than `:`,
/// then a `:`. Markers are stripped repeatedly. Returns the remaining subject and whether any
/// marker was removed, or None when nothing is left.
///
/// ## Examples
///
/// ```text
/// "Budget"             → ("Budget", false)
/// "Re: Budget"         → ("Budget", true)
/// "RE[2]: re: Budget"  → ("Budget", true)
/// "Reply hazy"         → ("Reply hazy", false)
/// ```
pub fn normalize_root_subject(subject: &str) -> Option<(String, bool)> {
    let mut rest = subject;
    let mut is_reply = false;

    loop {
        rest = rest.trim_start();
        match strip_reply_marker(rest) {
            Some(stripped) => {
                rest = stripped;
                is_reply = true;
            }
            None => break,
        }
    }

    let rest = rest.trim_end();
    if rest.is_empty() {
        None
    } else {
        Some((rest.to_string(), is_reply))
    }
}

fn strip_reply_marker(subject: &str) -> Option<&str> {
    let bytes = subject.as_bytes();
    if bytes.len() < 2 || !bytes[..2].eq_ignore_ascii_case(b"re") {
        return None;
    }

    let mut end = 2;
    while end < bytes.len()
        && (bytes[end].is_ascii_digit()
            || (bytes[end].is_ascii_punctuation() && bytes[end] != b':'))
    {
        end += 1;
    }

    if bytes.get(end) == Some(&b':') {
        // ASCII bytes only were consumed, so end + 1 is a char boundary
        Some(&subject[end + 1..])
    } else {
        None
    }
}

/// Merge roots that share a normalized subject
///
/// ## Algorithm
///
/// 1. Normalize each root's effective subject (its own, or that of its first descendant with
///    a message), in parallel with rayon once the root set reaches `parallel_threshold`
/// 2. Pick a representative per subject, preferring roots with a message, then non-replies
/// 3. Re-scan the roots and fold every other root into its subject's representative
///
/// Consumed roots are blanked in place and the root list is compacted at the end, so the scan
/// always makes progress.
pub fn group_by_subject(
    arena: &mut ContainerArena,
    roots: &mut Vec<ContainerId>,
    parallel_threshold: usize,
) {
    cache_root_subjects(arena, roots, parallel_threshold);

    let mut representatives: HashMap<String, ContainerId> = HashMap::new();
    for root in roots.iter() {
        let Some(subject) = arena[*root].root_subject.clone() else {
            continue;
        };
        match representatives.get(&subject) {
            Some(current) if !prefer_as_representative(&arena[*root], &arena[*current]) => {}
            _ => {
                representatives.insert(subject, *root);
            }
        }
    }

    let mut slots: Vec<Option<ContainerId>> = roots.iter().copied().map(Some).collect();
    let mut positions: HashMap<ContainerId, usize> =
        roots.iter().enumerate().map(|(i, id)| (*id, i)).collect();
    let mut merged = 0usize;

    for i in 0..slots.len() {
        let Some(root) = slots[i] else {
            continue;
        };
        let Some(subject) = arena[root].root_subject.clone() else {
            continue;
        };
        let Some(representative) = representatives.get(&subject).copied() else {
            continue;
        };
        if representative == root {
            continue;
        }

        merged += 1;
        let root_has_message = !arena[root].is_placeholder();
        let rep_has_message = !arena[representative].is_placeholder();
        let root_is_reply = arena[root].is_reply;
        let rep_is_reply = arena[representative].is_reply;

        if !root_has_message && !rep_has_message {
            // Both scaffolding: hand the root's children to the representative
            slots[i] = None;
            for child in arena[root].children.clone() {
                arena.detach(child);
                arena.add_child(representative, child);
            }
        } else if !root_has_message && rep_has_message {
            slots[i] = None;
            arena.add_child(representative, root);
        } else if root_has_message && !rep_has_message {
            take_slot(&mut slots, &positions, representative);
            arena.add_child(root, representative);
            representatives.insert(subject, root);
        } else if root_is_reply && !rep_is_reply {
            slots[i] = None;
            arena.add_child(representative, root);
        } else if !root_is_reply && rep_is_reply {
            take_slot(&mut slots, &positions, representative);
            arena.add_child(root, representative);
            representatives.insert(subject, root);
        } else {
            // Same standing on both sides: a new subject group holds them both
            let group = arena.push(Container::new_subject_group(
                subject.clone(),
                root_is_reply && rep_is_reply,
            ));
            take_slot(&mut slots, &positions, representative);
            slots[i] = Some(group);
            positions.insert(group, i);
            arena.add_child(group, representative);
            arena.add_child(group, root);
            representatives.insert(subject, group);
        }
    }

    *roots = slots.into_iter().flatten().collect();
    log::debug!(
        "subject grouping merged {} roots, {} roots remain",
        merged,
        roots.len()
    );
}

fn take_slot(
    slots: &mut [Option<ContainerId>],
    positions: &HashMap<ContainerId, usize>,
    id: ContainerId,
) {
    if let Some(position) = positions.get(&id) {
        slots[*position] = None;
    }
}

/// Whether `candidate` should replace `current` as a subject's representative
fn prefer_as_representative(candidate: &Container, current: &Container) -> bool {
    match (candidate.is_placeholder(), current.is_placeholder()) {
        (false, true) => true,
        (true, false) => false,
        _ => current.is_reply && !candidate.is_reply,
    }
}

/// Fill `root_subject` and `is_reply` for every root
fn cache_root_subjects(
    arena: &mut ContainerArena,
    roots: &[ContainerId],
    parallel_threshold: usize,
) {
    let shared: &ContainerArena = arena;
    let sources: Vec<(ContainerId, Option<String>)> = roots
        .iter()
        .map(|root| {
            let subject = find_first_real_message(shared, *root)
                .and_then(|id| shared[id].summary())
                .map(|summary| summary.subject.clone());
            (*root, subject)
        })
        .collect();

    let normalized: Vec<Option<(String, bool)>> = if sources.len() >= parallel_threshold {
        log::debug!("normalizing {} root subjects in parallel", sources.len());
        sources
            .par_iter()
            .map(|(_, subject)| subject.as_deref().and_then(normalize_root_subject))
            .collect()
    } else {
        sources
            .iter()
            .map(|(_, subject)| subject.as_deref().and_then(normalize_root_subject))
            .collect()
    };

    for ((root, _), normalized) in sources.into_iter().zip(normalized) {
        let container = &mut arena[root];
        match normalized {
            Some((subject, is_reply)) => {
                container.root_subject = Some(subject);
                container.is_reply = is_reply;
            }
            None => {
                container.root_subject = None;
                container.is_reply = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MessageSummary;
    use std::sync::Arc;

    fn create_test_message(arena: &mut ContainerArena, uid: &str, subject: &str) -> ContainerId {
        let mut container = Container::new_keyless();
        container.summary = Some(Arc::new(MessageSummary::new(uid, 0).with_subject(subject)));
        arena.push(container)
    }

    #[test]
    fn test_normalize_plain_subject() {
        assert_eq!(
            normalize_root_subject("Budget"),
            Some(("Budget".to_string(), false))
        );
    }

    #[test]
    fn test_normalize_reply_markers() {
        assert_eq!(
            normalize_root_subject("  Re: Budget"),
            Some(("Budget".to_string(), true))
        );
        assert_eq!(
            normalize_root_subject("RE[2]: re: Budget "),
            Some(("Budget".to_string(), true))
        );
        assert_eq!(
            normalize_root_subject("Re-3: Budget"),
            Some(("Budget".to_string(), true))
        );
    }

    #[test]
    fn test_normalize_keeps_words_starting_with_re() {
        assert_eq!(
            normalize_root_subject("Report: Q3"),
            Some(("Report: Q3".to_string(), false))
        );
        assert_eq!(
            normalize_root_subject("Re budget"),
            Some(("Re budget".to_string(), false))
        );
    }

    #[test]
    fn test_normalize_empty_subjects() {
        assert_eq!(normalize_root_subject(""), None);
        assert_eq!(normalize_root_subject("Re: "), None);
        assert_eq!(normalize_root_subject("   "), None);
    }

    #[test]
    fn test_normalize_is_case_sensitive_for_text() {
        let (lower, _) = normalize_root_subject("budget").expect("subject");
        let (upper, _) = normalize_root_subject("Budget").expect("subject");
        assert_ne!(lower, upper);
    }

    #[test]
    fn test_reply_goes_under_original() {
        let mut arena = ContainerArena::new();
        let reply = create_test_message(&mut arena, "2", "Re: Budget");
        let original = create_test_message(&mut arena, "1", "Budget");
        let mut roots = vec![reply, original];

        group_by_subject(&mut arena, &mut roots, usize::MAX);

        assert_eq!(roots, vec![original]);
        assert_eq!(arena[original].children(), &[reply]);
    }

    #[test]
    fn test_two_replies_get_subject_group() {
        let mut arena = ContainerArena::new();
        let first = create_test_message(&mut arena, "1", "Re: Lunch");
        let second = create_test_message(&mut arena, "2", "RE: Lunch");
        let mut roots = vec![first, second];

        group_by_subject(&mut arena, &mut roots, usize::MAX);

        assert_eq!(roots.len(), 1);
        let group = roots[0];
        assert!(arena[group].is_placeholder());
        assert_eq!(
            arena[group].node_key(),
            crate::models::NodeKey::Subject("Lunch".into())
        );
        assert_eq!(arena[group].children(), &[first, second]);
    }

    #[test]
    fn test_placeholder_root_folds_under_message() {
        let mut arena = ContainerArena::new();
        let original = create_test_message(&mut arena, "1", "Plans");
        let placeholder = arena.push(Container::new_placeholder("lost".into()));
        let a = create_test_message(&mut arena, "2", "Re: Plans");
        let b = create_test_message(&mut arena, "3", "Re: Plans");
        arena.add_child(placeholder, a);
        arena.add_child(placeholder, b);
        let mut roots = vec![placeholder, original];

        group_by_subject(&mut arena, &mut roots, usize::MAX);

        assert_eq!(roots, vec![original]);
        assert_eq!(arena[original].children(), &[placeholder]);
    }

    #[test]
    fn test_roots_without_subject_are_left_alone() {
        let mut arena = ContainerArena::new();
        let a = create_test_message(&mut arena, "1", "");
        let b = create_test_message(&mut arena, "2", "Re:");
        let mut roots = vec![a, b];

        group_by_subject(&mut arena, &mut roots, usize::MAX);

        assert_eq!(roots, vec![a, b]);
    }

    #[test]
    fn test_parallel_normalization_matches_sequential() {
        let build = |threshold: usize| {
            let mut arena = ContainerArena::new();
            let mut roots = Vec::new();
            for i in 0..64 {
                let subject = if i % 2 == 0 {
                    format!("Topic {}", i / 4)
                } else {
                    format!("Re: Topic {}", i / 4)
                };
                roots.push(create_test_message(&mut arena, &i.to_string(), &subject));
            }
            group_by_subject(&mut arena, &mut roots, threshold);
            roots
                .iter()
                .map(|id| arena[*id].children().len())
                .collect::<Vec<_>>()
        };

        assert_eq!(build(0), build(usize::MAX));
    }
}
