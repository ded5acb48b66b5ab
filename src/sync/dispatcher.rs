//! Single-flight thread builds
//!
//! The dispatcher runs the build pipeline for a folder on the blocking pool and delivers the
//! result to the primary thread over a channel. At most one build per folder is in flight: a
//! new request cancels the running build, waits for it to wind down, and only then starts.
//!
//! Every request carries a [`BuildTicket`]; the primary thread applies a result only while
//! its ticket is still the folder's current one.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::ThreadingConfig;
use crate::error::{ThreadingError, ThreadingResult};
use crate::models::MessageSummary;
use crate::threading::Forest;

use super::jobs::{BuildState, BuildStateStore};

/// Identity of one build request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BuildTicket {
    pub folder: String,
    /// Increases with every request made through one dispatcher
    pub generation: u64,
    pub id: Uuid,
}

/// Result of a build, as delivered to the primary thread.
#[derive(Debug)]
pub struct BuildCompleted {
    pub ticket: BuildTicket,
    pub result: ThreadingResult<Forest>,
}

struct InFlightBuild {
    ticket: BuildTicket,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

pub struct BuildDispatcher {
    config: Arc<ThreadingConfig>,
    in_flight: Arc<DashMap<String, InFlightBuild>>,
    current: DashMap<String, BuildTicket>,
    states: Arc<BuildStateStore>,
    results: mpsc::UnboundedSender<BuildCompleted>,
    next_generation: AtomicU64,
}

impl BuildDispatcher {
    /// Create a dispatcher and the receiving end of its result channel
    pub fn new(config: ThreadingConfig) -> (Self, mpsc::UnboundedReceiver<BuildCompleted>) {
        let (results, receiver) = mpsc::unbounded_channel();
        let dispatcher = Self {
            config: Arc::new(config),
            in_flight: Arc::new(DashMap::new()),
            current: DashMap::new(),
            states: Arc::new(BuildStateStore::new()),
            results,
            next_generation: AtomicU64::new(0),
        };
        (dispatcher, receiver)
    }

    /// Request a build of `folder` from `summaries`
    ///
    /// Supersedes any build of the same folder that is still running. Must be called from
    /// within a tokio runtime.
    pub fn request_build(&self, folder: &str, summaries: Vec<MessageSummary>) -> BuildTicket {
        let ticket = BuildTicket {
            folder: folder.to_string(),
            generation: self.next_generation.fetch_add(1, Ordering::SeqCst) + 1,
            id: Uuid::new_v4(),
        };

        let previous = self.in_flight.remove(folder).map(|(_, build)| {
            log::debug!(
                "folder '{}': superseding build {} with {}",
                folder,
                build.ticket.generation,
                ticket.generation
            );
            build.token.cancel();
            build.handle
        });

        self.current.insert(folder.to_string(), ticket.clone());
        self.states.queue(&ticket, summaries.len());

        // The entry holds its shard lock until the build is recorded, so a build that
        // finishes straight away cannot clear the folder before it is inserted.
        let slot = self.in_flight.entry(folder.to_string());
        let token = CancellationToken::new();
        let handle = tokio::spawn(run_build(
            ticket.clone(),
            summaries,
            Arc::clone(&self.config),
            token.clone(),
            previous,
            Arc::clone(&self.states),
            Arc::clone(&self.in_flight),
            self.results.clone(),
        ));

        slot.insert(InFlightBuild {
            ticket: ticket.clone(),
            token,
            handle,
        });

        ticket
    }

    /// Whether `ticket` is still the latest request for its folder
    pub fn is_current(&self, ticket: &BuildTicket) -> bool {
        self.current
            .get(&ticket.folder)
            .is_some_and(|current| current.id == ticket.id)
    }

    /// Cancel the running build of `folder`, if any
    pub fn cancel(&self, folder: &str) -> bool {
        match self.in_flight.remove(folder) {
            Some((_, build)) => {
                log::info!("folder '{}': cancelling build {}", folder, build.ticket.generation);
                build.token.cancel();
                self.current.remove(folder);
                true
            }
            None => false,
        }
    }

    pub fn status(&self, folder: &str) -> Option<BuildState> {
        self.states.get(folder)
    }

    /// Number of folders with a build still running
    pub fn in_flight(&self) -> usize {
        self.in_flight
            .iter()
            .filter(|build| !build.handle.is_finished())
            .count()
    }

    pub fn config(&self) -> &ThreadingConfig {
        &self.config
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_build(
    ticket: BuildTicket,
    summaries: Vec<MessageSummary>,
    config: Arc<ThreadingConfig>,
    token: CancellationToken,
    previous: Option<JoinHandle<()>>,
    states: Arc<BuildStateStore>,
    in_flight: Arc<DashMap<String, InFlightBuild>>,
    results: mpsc::UnboundedSender<BuildCompleted>,
) {
    if let Some(previous) = previous {
        if let Err(e) = previous.await {
            log::warn!("folder '{}': previous build task ended abnormally: {}", ticket.folder, e);
        }
    }

    let result = if token.is_cancelled() {
        Err(ThreadingError::cancelled(ticket.folder.clone()))
    } else {
        states.start(&ticket);
        log::info!(
            "folder '{}': building threads for {} messages (build {})",
            ticket.folder,
            summaries.len(),
            ticket.generation
        );

        let build_token = token.clone();
        let joined = tokio::task::spawn_blocking(move || {
            Forest::build_cancellable(&summaries, &config, &build_token)
        })
        .await;

        match joined {
            Ok(Ok(forest)) => Ok(forest),
            Ok(Err(ThreadingError::Cancelled { .. })) => {
                Err(ThreadingError::cancelled(ticket.folder.clone()))
            }
            Ok(Err(e)) => Err(e),
            Err(e) => Err(ThreadingError::BuildTaskFailed(e.to_string())),
        }
    };

    match &result {
        Ok(forest) => {
            log::info!(
                "folder '{}': build {} complete - {} roots",
                ticket.folder,
                ticket.generation,
                forest.roots().len()
            );
            states.complete(&ticket);
        }
        Err(ThreadingError::Cancelled { .. }) => {
            log::debug!("folder '{}': build {} cancelled", ticket.folder, ticket.generation);
            states.cancel(&ticket);
        }
        Err(e) => {
            log::error!("folder '{}': build {} failed: {}", ticket.folder, ticket.generation, e);
            states.fail(&ticket, e.to_string());
        }
    }

    in_flight.remove_if(&ticket.folder, |_, build| build.ticket.id == ticket.id);

    if results.send(BuildCompleted { ticket, result }).is_err() {
        log::debug!("build result dropped: receiver closed");
    }
}
