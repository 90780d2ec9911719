//! Catalog synchronizer for Waypost: bounded BFS tree walk, upsert with
//! a last-seen watermark, and soft-deletion of nodes no longer observed.

pub mod error;
pub mod sync;

pub use error::{CatalogSyncError, Result};
pub use sync::{sync_catalog, SyncOutcome, DEFAULT_NODE_BUDGET};
