//! Content-addressed class-definition registry with copy-on-reference
//! per-job snapshots (spec component C1).

pub mod snapshot;
pub mod store;

pub use snapshot::{Registry, SnapshotHandle};
pub use store::{ArtifactStore, FileStore, InMemoryStore};
