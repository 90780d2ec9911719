//! Error types for messenger backends.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MessengerError>;

/// Errors a messenger backend can raise. Mirrors the classification the
/// engine's retry wrapper expects — see `waypost_engine`'s `ErrorClass`.
#[derive(Error, Debug)]
pub enum MessengerError {
    #[error("transient messenger error: {0}")]
    Transient(String),

    #[error("flood control, retry after {retry_after_secs}s: {message}")]
    FloodControl { retry_after_secs: u64, message: String },

    #[error("content handle invalid: {0}")]
    HandleInvalid(String),

    #[error("messenger denied request: {0}")]
    Denied(String),

    #[error("chat or target not found: {0}")]
    NotFound(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
