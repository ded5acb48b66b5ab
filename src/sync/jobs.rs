use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::dispatcher::BuildTicket;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BuildStatus {
    Queued,
    Building,
    Completed,
    Cancelled,
    Failed,
}

impl BuildStatus {
    pub fn is_finished(self) -> bool {
        matches!(
            self,
            BuildStatus::Completed | BuildStatus::Cancelled | BuildStatus::Failed
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildState {
    pub id: String,
    pub generation: u64,
    pub status: BuildStatus,
    pub message_count: usize,
    pub queued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl BuildState {
    fn queued(ticket: &BuildTicket, message_count: usize) -> Self {
        Self {
            id: ticket.id.to_string(),
            generation: ticket.generation,
            status: BuildStatus::Queued,
            message_count,
            queued_at: Utc::now(),
            started_at: None,
            completed_at: None,
            error_message: None,
        }
    }
}

/// Latest build state per folder
///
/// Updates for a ticket that is no longer the folder's latest are ignored.
#[derive(Debug, Default)]
pub struct BuildStateStore {
    states: RwLock<HashMap<String, BuildState>>,
}

impl BuildStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, folder: &str) -> Option<BuildState> {
        self.states.read().get(folder).cloned()
    }

    pub fn queue(&self, ticket: &BuildTicket, message_count: usize) {
        self.states
            .write()
            .insert(ticket.folder.clone(), BuildState::queued(ticket, message_count));
    }

    pub fn start(&self, ticket: &BuildTicket) {
        self.update(ticket, |state| {
            state.status = BuildStatus::Building;
            state.started_at = Some(Utc::now());
        });
    }

    pub fn complete(&self, ticket: &BuildTicket) {
        self.update(ticket, |state| {
            state.status = BuildStatus::Completed;
            state.completed_at = Some(Utc::now());
        });
    }

    pub fn cancel(&self, ticket: &BuildTicket) {
        self.update(ticket, |state| {
            state.status = BuildStatus::Cancelled;
            state.completed_at = Some(Utc::now());
        });
    }

    pub fn fail(&self, ticket: &BuildTicket, error: String) {
        self.update(ticket, |state| {
            state.status = BuildStatus::Failed;
            state.error_message = Some(error);
            state.completed_at = Some(Utc::now());
        });
    }

    fn update<F>(&self, ticket: &BuildTicket, updater: F)
    where
        F: FnOnce(&mut BuildState),
    {
        let mut states = self.states.write();
        match states.get_mut(&ticket.folder) {
            Some(state) if state.generation == ticket.generation => updater(state),
            _ => log::trace!(
                "ignoring state update for superseded build {} of '{}'",
                ticket.generation,
                ticket.folder
            ),
        }
    }
}
