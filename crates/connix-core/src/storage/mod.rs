//! Data storage: the synchronization point between the relational
//! source of truth and the runtime's read cache.
//!
//! [`SnapshotStorage::write`] serializes the full hierarchy to one
//! JSON file and immediately reloads it; [`SnapshotStorage::read`]
//! degrades gracefully on anything short of a valid root document.

pub mod snapshot;
pub mod source;

pub use snapshot::SnapshotStorage;
pub use source::{HierarchySource, InMemoryHierarchy};
