pub mod config;
pub mod error;
pub mod ingest;
pub mod models;
pub mod sync;
pub mod threading;

use std::sync::Once;

use env_logger::Env;

pub use config::{SortOrder, ThreadingConfig};
pub use error::{ThreadingError, ThreadingResult};
pub use models::{FolderChanges, MessageFlags, MessageSummary, NodeKey};
pub use threading::{
    DisplayRowMap, DisplayedForest, ExpansionState, Forest, ReconcileReport, RowChange,
    build_forest, free_forest, reconcile,
};

static LOGGER: Once = Once::new();

/// Install the `env_logger` backend once; `RUST_LOG` overrides the `info` default
pub fn init_logger() {
    LOGGER.call_once(|| {
        env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    });
}
