//! Background thread building.
//!
//! The pure build pipeline (linking, pruning, subject grouping, sorting) may run on any
//! thread because it only touches a freshly allocated forest. Everything that mutates what
//! the rendering layer reads stays on the primary thread.
//!
//! # Components
//!
//! - **`dispatcher`**: runs builds on tokio's blocking pool, one in flight per folder, and
//!   delivers results over an mpsc channel tagged with a [`BuildTicket`].
//!
//! - **`jobs`**: per-folder [`BuildState`] (queued, building, completed, cancelled, failed)
//!   with timestamps, readable while builds run.
//!
//! - **`folder_view`**: the primary-thread [`FolderView`] that applies completed builds to the
//!   displayed forest and persists collapse markers.
//!
//! # Data Flow
//!
//! 1. **Request**: the caller hands a folder's summaries to [`BuildDispatcher::request_build`]
//! 2. **Supersede**: a running build of that folder is cancelled and awaited
//! 3. **Build**: the pipeline runs in `spawn_blocking`, checking its cancellation token
//!    between stages
//! 4. **Deliver**: a [`BuildCompleted`] is sent to the primary thread
//! 5. **Apply**: [`FolderView::apply`] drops stale results and reconciles current ones

pub mod dispatcher;
pub mod folder_view;
pub mod jobs;

pub use dispatcher::{BuildCompleted, BuildDispatcher, BuildTicket};
pub use folder_view::FolderView;
pub use jobs::{BuildState, BuildStateStore, BuildStatus};
