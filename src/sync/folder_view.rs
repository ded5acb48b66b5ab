//! Primary-thread owner of a folder's display state
//!
//! A [`FolderView`] holds the displayed forest, its row map and the collapse markers of one
//! folder. Completed builds are applied here and nowhere else.

use crate::config::ThreadingConfig;
use crate::error::{ThreadingError, ThreadingResult};
use crate::threading::{
    DisplayRowMap, DisplayedForest, ExpansionState, ReconcileReport, free_forest, reconcile,
};

use super::dispatcher::{BuildCompleted, BuildDispatcher};

pub struct FolderView {
    folder: String,
    config: ThreadingConfig,
    displayed: DisplayedForest,
    row_map: DisplayRowMap,
    expansion: ExpansionState,
    populated: bool,
}

impl FolderView {
    pub fn new(
        folder: impl Into<String>,
        config: ThreadingConfig,
        expansion: ExpansionState,
    ) -> Self {
        Self {
            folder: folder.into(),
            config,
            displayed: DisplayedForest::new(),
            row_map: DisplayRowMap::new(),
            expansion,
            populated: false,
        }
    }

    /// Create a view with the collapse markers saved for `folder`
    pub fn open(folder: impl Into<String>, config: ThreadingConfig) -> ThreadingResult<Self> {
        let folder = folder.into();
        let expansion = ExpansionState::load_from_disk(&config.expansion_path(&folder))?;
        Ok(Self::new(folder, config, expansion))
    }

    /// Apply a finished build
    ///
    /// Results for another folder, superseded results, cancelled builds and failed builds are
    /// dropped and yield None. The first accepted result populates the view; later ones are
    /// reconciled into it.
    pub fn apply(
        &mut self,
        dispatcher: &BuildDispatcher,
        completed: BuildCompleted,
    ) -> Option<ReconcileReport> {
        let BuildCompleted { ticket, result } = completed;

        if ticket.folder != self.folder {
            log::debug!(
                "view '{}': ignoring build for folder '{}'",
                self.folder,
                ticket.folder
            );
            return None;
        }

        let forest = match result {
            Ok(forest) => forest,
            Err(ThreadingError::Cancelled { .. }) => return None,
            Err(e) => {
                log::warn!("view '{}': build {} failed: {}", self.folder, ticket.generation, e);
                return None;
            }
        };

        if !dispatcher.is_current(&ticket) {
            log::debug!(
                "view '{}': discarding stale build {}",
                self.folder,
                ticket.generation
            );
            free_forest(forest);
            return None;
        }

        let report = if self.populated {
            reconcile(&mut self.displayed, forest, &mut self.row_map)
        } else {
            self.populated = true;
            self.displayed.populate(
                forest,
                self.expansion.clone(),
                &self.config,
                &mut self.row_map,
            )
        };
        Some(report)
    }

    /// Persist the current collapse markers
    pub fn save_expansion(&mut self) -> ThreadingResult<()> {
        self.expansion = self.displayed.collapsed_markers();
        self.expansion
            .save_to_disk(&self.config.expansion_path(&self.folder))
    }

    pub fn folder(&self) -> &str {
        &self.folder
    }

    pub fn displayed(&self) -> &DisplayedForest {
        &self.displayed
    }

    pub fn displayed_mut(&mut self) -> &mut DisplayedForest {
        &mut self.displayed
    }

    pub fn row_map(&self) -> &DisplayRowMap {
        &self.row_map
    }

    pub fn is_populated(&self) -> bool {
        self.populated
    }
}
