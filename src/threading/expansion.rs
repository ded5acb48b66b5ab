//! Expansion markers
//!
//! An [`ExpansionState`] is an opaque set of identity strings naming subtrees whose expanded
//! flag differs from the configured default: collapsed threads when threads open expanded,
//! expanded threads when they open collapsed. Real messages are identified by their uid,
//! subject groups by their normalized subject and placeholders by the referenced key.
//!
//! The file format is one identity per line, UTF-8. Blank lines are ignored and a missing file
//! is an empty state.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::Path;

use crate::error::{ThreadingError, ThreadingResult};
use crate::models::NodeKey;

/// Override applied to every node regardless of its marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ForceExpansion {
    #[default]
    None,
    ExpandAll,
    CollapseAll,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpansionState {
    toggled: BTreeSet<String>,
}

impl ExpansionState {
    pub fn new() -> Self {
        ExpansionState::default()
    }

    pub fn from_markers<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ExpansionState {
            toggled: markers.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether `key` starts with the opposite of the default expanded flag
    pub fn is_marked(&self, key: &NodeKey) -> bool {
        self.toggled.contains(key.save_id())
    }

    pub fn insert(&mut self, identity: impl Into<String>) -> bool {
        self.toggled.insert(identity.into())
    }

    pub fn remove(&mut self, identity: &str) -> bool {
        self.toggled.remove(identity)
    }

    pub fn len(&self) -> usize {
        self.toggled.len()
    }

    pub fn is_empty(&self) -> bool {
        self.toggled.is_empty()
    }

    pub fn markers(&self) -> impl Iterator<Item = &str> {
        self.toggled.iter().map(String::as_str)
    }

    pub fn load_from_disk(path: &Path) -> ThreadingResult<Self> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                log::debug!("no expansion state at {}", path.display());
                return Ok(ExpansionState::new());
            }
            Err(source) => {
                return Err(ThreadingError::ExpansionState {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let state = ExpansionState::from_markers(
            contents
                .lines()
                .map(str::trim_end)
                .filter(|line| !line.is_empty()),
        );
        log::debug!(
            "loaded {} collapse markers from {}",
            state.len(),
            path.display()
        );
        Ok(state)
    }

    pub fn save_to_disk(&self, path: &Path) -> ThreadingResult<()> {
        let to_error = |source| ThreadingError::ExpansionState {
            path: path.to_path_buf(),
            source,
        };

        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(to_error)?;
        }

        let mut contents = String::new();
        for marker in &self.toggled {
            contents.push_str(marker);
            contents.push('\n');
        }
        fs::write(path, contents).map_err(to_error)?;

        log::debug!(
            "saved {} collapse markers to {}",
            self.toggled.len(),
            path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markers_match_by_identity() {
        let state = ExpansionState::from_markers(["17", "Budget"]);

        assert!(state.is_marked(&NodeKey::Message("17".into())));
        assert!(state.is_marked(&NodeKey::Subject("Budget".into())));
        assert!(!state.is_marked(&NodeKey::Message("18".into())));
    }

    #[test]
    fn test_missing_file_is_empty_state() {
        let dir = tempfile::tempdir().expect("temp dir");
        let state = ExpansionState::load_from_disk(&dir.path().join("absent.txt"))
            .expect("missing file tolerated");
        assert!(state.is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("nested").join("expanded-INBOX.txt");
        let mut state = ExpansionState::new();
        state.insert("uid-1");
        state.insert("Weekly sync");

        state.save_to_disk(&path).expect("saved");
        let loaded = ExpansionState::load_from_disk(&path).expect("loaded");

        assert_eq!(loaded, state);
    }

    #[test]
    fn test_blank_lines_ignored() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("markers.txt");
        fs::write(&path, "a\n\n  \nb\n").expect("written");

        let state = ExpansionState::load_from_disk(&path).expect("loaded");

        assert_eq!(state.markers().collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
