//! Message threading module
//!
//! This module turns a flat collection of message summaries into a forest of reply threads,
//! and keeps a displayed copy of that forest in sync as the collection changes.
//!
//! ## Threading Strategy
//!
//! 1. **Reference chains**: each message's references (oldest first) are linked into a
//!    parent chain, with the newest reference as the message's parent
//! 2. **Pruning**: placeholders for unseen messages are removed or spliced away unless they
//!    group several replies at the top level
//! 3. **Subject grouping**: roots with the same subject (reply markers stripped) are merged
//! 4. **Sorting**: siblings are ordered by collection order, newest first by default
//! 5. **Reconciliation**: the displayed forest is updated with a minimal edit script
//!
//! ## Module Structure
//!
//! - `container`: arena of containers addressed by index
//! - `message_index`: key → container lookup
//! - `algorithm`: linking, pruning, sorting
//! - `subject_matching`: subject normalization and root grouping
//! - `forest`: the logical forest and the build pipeline
//! - `displayed`: the long-lived displayed forest and its row map
//! - `reconcile`: the two-cursor diff between displayed and logical forests
//! - `expansion`: collapse markers and their file format

pub mod algorithm;
pub mod container;
pub mod displayed;
pub mod expansion;
pub mod forest;
pub mod message_index;
pub mod reconcile;
pub mod subject_matching;

// Re-export main types and functions
pub use container::{Container, ContainerId};
pub use displayed::{DisplayRowMap, DisplayedForest};
pub use expansion::{ExpansionState, ForceExpansion};
pub use forest::{Forest, ForestIter, build_forest, free_forest};
pub use reconcile::{ReconcileReport, RowChange, reconcile};
pub use subject_matching::normalize_root_subject;
