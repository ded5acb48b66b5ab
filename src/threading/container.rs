//! Container data structures for the threading pipeline
//!
//! Containers live in an arena and refer to each other by [`ContainerId`]. A container either
//! wraps a real message or is a placeholder for a message that was referenced but never seen
//! (or a synthetic subject group created by the subject grouper).

use std::ops::{Index, IndexMut};
use std::sync::Arc;

use crate::models::{MessageSummary, NodeKey};

use super::algorithm::cycle_detection::would_create_cycle;

/// Stable index of a container inside its arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContainerId(pub(crate) usize);

impl ContainerId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// A node in the thread forest.
///
/// ## Placeholders
///
/// A container without a summary is a placeholder. Placeholders are created for keys that
/// appear in a reference chain before (or without) the message itself, and by the subject
/// grouper when two replies share a subject but no common parent.
#[derive(Debug, Clone, Default)]
pub struct Container {
    /// Message key this container was registered under (None for keyless messages and
    /// subject groups)
    pub(crate) message_id: Option<String>,

    /// The wrapped message (None for placeholders)
    pub(crate) summary: Option<Arc<MessageSummary>>,

    /// Normalized subject of a synthetic subject group
    pub(crate) group_subject: Option<String>,

    /// Cached normalized root subject and reply flag, filled once by the subject grouper
    pub(crate) root_subject: Option<String>,
    pub(crate) is_reply: bool,

    pub(crate) parent: Option<ContainerId>,
    pub(crate) children: Vec<ContainerId>,
}

impl Container {
    /// Create a placeholder registered under a message key
    pub fn new_placeholder(message_id: String) -> Self {
        Container {
            message_id: Some(message_id),
            ..Container::default()
        }
    }

    /// Create an empty container for a message that has no key
    pub fn new_keyless() -> Self {
        Container::default()
    }

    /// Create a synthetic placeholder grouping roots that share a subject
    pub fn new_subject_group(subject: String, is_reply: bool) -> Self {
        Container {
            group_subject: Some(subject.clone()),
            root_subject: Some(subject),
            is_reply,
            ..Container::default()
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.summary.is_none()
    }

    pub fn summary(&self) -> Option<&Arc<MessageSummary>> {
        self.summary.as_ref()
    }

    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }

    pub fn parent(&self) -> Option<ContainerId> {
        self.parent
    }

    pub fn children(&self) -> &[ContainerId] {
        &self.children
    }

    /// Order value of the wrapped message
    pub fn order(&self) -> Option<u64> {
        self.summary.as_ref().map(|summary| summary.order)
    }

    pub fn root_subject(&self) -> Option<&str> {
        self.root_subject.as_deref()
    }

    pub fn is_reply(&self) -> bool {
        self.is_reply
    }

    /// Identity used to match this container against a displayed node
    pub fn node_key(&self) -> NodeKey {
        if let Some(summary) = &self.summary {
            NodeKey::Message(summary.uid.clone())
        } else if let Some(subject) = &self.group_subject {
            NodeKey::Subject(subject.clone())
        } else {
            NodeKey::Placeholder(self.message_id.clone().unwrap_or_default())
        }
    }
}

/// Arena owning every container of one build.
#[derive(Debug, Clone, Default)]
pub struct ContainerArena {
    containers: Vec<Container>,
}

impl ContainerArena {
    pub fn new() -> Self {
        ContainerArena::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        ContainerArena {
            containers: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, container: Container) -> ContainerId {
        self.containers.push(container);
        ContainerId(self.containers.len() - 1)
    }

    pub fn get(&self, id: ContainerId) -> Option<&Container> {
        self.containers.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.containers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }

    /// All container ids in creation order
    pub fn ids(&self) -> impl Iterator<Item = ContainerId> + '_ {
        (0..self.containers.len()).map(ContainerId)
    }

    /// Remove `child` from its parent's child list, leaving it unparented
    pub fn detach(&mut self, child: ContainerId) {
        if let Some(parent) = self[child].parent.take() {
            self[parent].children.retain(|c| *c != child);
        }
    }

    /// Append an unparented `child` to `parent`'s children
    pub fn add_child(&mut self, parent: ContainerId, child: ContainerId) {
        debug_assert!(self[child].parent.is_none());
        self[child].parent = Some(parent);
        self[parent].children.push(child);
    }

    /// Make `parent` the parent of `child`, detaching it from any previous parent first.
    ///
    /// Returns false when nothing changed: the link already exists, or it would make a
    /// container its own ancestor.
    pub fn link(&mut self, parent: ContainerId, child: ContainerId) -> bool {
        if self[child].parent == Some(parent) {
            return false;
        }

        if would_create_cycle(self, child, parent) {
            log::debug!(
                "not linking {:?} under {:?}: would create a cycle",
                child,
                parent
            );
            return false;
        }

        self.detach(child);
        self.add_child(parent, child);
        true
    }
}

impl Index<ContainerId> for ContainerArena {
    type Output = Container;

    fn index(&self, id: ContainerId) -> &Container {
        &self.containers[id.0]
    }
}

impl IndexMut<ContainerId> for ContainerArena {
    fn index_mut(&mut self, id: ContainerId) -> &mut Container {
        &mut self.containers[id.0]
    }
}
