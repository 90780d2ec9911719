//! Error types for storage backends.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors a storage backend can raise. Mirrors the classification the
/// engine's retry wrapper expects — see `waypost_engine`'s `ErrorClass`.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("transient upstream error: {0}")]
    Transient(String),

    #[error("storage denied access: {0}")]
    Denied(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
