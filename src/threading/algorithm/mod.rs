//! Thread forest construction stages
//!
//! Each stage works on a [`ContainerArena`](super::container::ContainerArena) and its root list:
//!
//! 1. `forest_builder`: link containers through reference chains
//! 2. `pruner`: drop or splice useless placeholders
//! 3. subject grouping lives in [`subject_matching`](super::subject_matching)
//! 4. `thread_sorter`: fix a deterministic sibling order

pub(crate) mod cycle_detection;
pub mod forest_builder;
pub mod pruner;
pub mod thread_sorter;
pub(crate) mod tree_traversal;

pub use forest_builder::link_containers;
pub use pruner::prune_placeholders;
pub use thread_sorter::sort_forest;
