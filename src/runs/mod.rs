//! Saved traversal runs.

mod index;
mod store;

pub use index::{RunIndex, SavedPayload, SavedRun, StoredRun};
pub use store::{MemoryRunStore, RunStore, SqliteRunStore};
