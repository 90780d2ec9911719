//! Error types for the catalog synchronizer.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CatalogSyncError>;

#[derive(Error, Debug)]
pub enum CatalogSyncError {
    #[error("store error: {0}")]
    Store(#[from] waypost_store::StoreError),

    #[error("storage error: {0}")]
    Storage(#[from] waypost_storage::StorageError),
}
