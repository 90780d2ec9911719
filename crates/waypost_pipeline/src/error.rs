//! Error types for the delivery pipeline.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DeliveryError>;

#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("store error: {0}")]
    Store(#[from] waypost_store::StoreError),

    #[error("storage error: {0}")]
    Storage(#[from] waypost_storage::StorageError),

    #[error("messenger error: {0}")]
    Messenger(#[from] waypost_messenger::MessengerError),

    #[error("spool io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("catalog item {0} is not a file")]
    NotAFile(i64),
}
