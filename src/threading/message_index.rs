//! Message key → container lookup
//!
//! Two independent tables are kept: one for messages that have a key (and can therefore be
//! referenced by other messages), and one for keyless messages, indexed by summary uid.

use std::collections::HashMap;

use super::container::{Container, ContainerArena, ContainerId};

#[derive(Debug, Default)]
pub struct MessageIndex {
    by_key: HashMap<String, ContainerId>,
    by_uid: HashMap<String, ContainerId>,
}

impl MessageIndex {
    pub fn new() -> Self {
        MessageIndex::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        MessageIndex {
            by_key: HashMap::with_capacity(capacity),
            by_uid: HashMap::new(),
        }
    }

    /// Return the container registered for `key`, creating a placeholder on first use
    pub fn get_or_create(&mut self, arena: &mut ContainerArena, key: &str) -> ContainerId {
        if let Some(id) = self.by_key.get(key) {
            return *id;
        }
        let id = arena.push(Container::new_placeholder(key.to_string()));
        self.by_key.insert(key.to_string(), id);
        id
    }

    /// Return the slot for a message without a key, creating it on first use
    pub fn get_or_create_keyless(&mut self, arena: &mut ContainerArena, uid: &str) -> ContainerId {
        if let Some(id) = self.by_uid.get(uid) {
            return *id;
        }
        let id = arena.push(Container::new_keyless());
        self.by_uid.insert(uid.to_string(), id);
        id
    }

    pub fn lookup(&self, key: &str) -> Option<ContainerId> {
        self.by_key.get(key).copied()
    }

    pub fn lookup_keyless(&self, uid: &str) -> Option<ContainerId> {
        self.by_uid.get(uid).copied()
    }

    pub fn len(&self) -> usize {
        self.by_key.len() + self.by_uid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty() && self.by_uid.is_empty()
    }
}
