//! Engine-level errors, and the `Classify` trait that lets the retry
//! wrapper inspect a leaf error's class without matching on every
//! concrete error type itself.
//!
//! Grounded on spec §7: "components return/raise classified errors; the
//! job engine is the sole arbiter of retry vs terminal." Each crate's
//! leaf error classifies itself; a wrapping error (e.g. `DeliveryError`)
//! just delegates to the variant it wraps.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] waypost_store::StoreError),

    #[error("queue error: {0}")]
    Queue(#[from] waypost_queue::QueueError),

    #[error("delivery error: {0}")]
    Delivery(#[from] waypost_pipeline::DeliveryError),

    #[error("catalog sync error: {0}")]
    Sync(#[from] waypost_catalog::CatalogSyncError),
}

/// The error classes the retry policy matrix (spec §4.8/§7) dispatches
/// on. `FloodControl` carries the platform's retry-after hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Transient,
    FloodControl { retry_after_secs: u64 },
    HandleInvalid,
    NotFound,
    Denied,
    Invariant,
}

pub trait Classify {
    fn classify(&self) -> ErrorClass;
}

impl Classify for waypost_storage::StorageError {
    fn classify(&self) -> ErrorClass {
        use waypost_storage::StorageError::*;
        match self {
            NotFound(_) => ErrorClass::NotFound,
            InvalidPath(_) => ErrorClass::Invariant,
            Denied(_) => ErrorClass::Denied,
            Transient(_) | Http(_) | Io(_) => ErrorClass::Transient,
        }
    }
}

impl Classify for waypost_messenger::MessengerError {
    fn classify(&self) -> ErrorClass {
        use waypost_messenger::MessengerError::*;
        match self {
            FloodControl { retry_after_secs, .. } => ErrorClass::FloodControl {
                retry_after_secs: *retry_after_secs,
            },
            HandleInvalid(_) => ErrorClass::HandleInvalid,
            Denied(_) => ErrorClass::Denied,
            NotFound(_) => ErrorClass::NotFound,
            Serialization(_) => ErrorClass::Invariant,
            Transient(_) | Http(_) | Io(_) => ErrorClass::Transient,
        }
    }
}

impl Classify for waypost_store::StoreError {
    fn classify(&self) -> ErrorClass {
        use waypost_store::StoreError::*;
        match self {
            NotFound(_) => ErrorClass::NotFound,
            InvalidState(_) | Serialization(_) | Migration { .. } => ErrorClass::Invariant,
            Sqlx(_) => ErrorClass::Transient,
        }
    }
}

impl Classify for waypost_pipeline::DeliveryError {
    fn classify(&self) -> ErrorClass {
        use waypost_pipeline::DeliveryError::*;
        match self {
            Store(e) => e.classify(),
            Storage(e) => e.classify(),
            Messenger(e) => e.classify(),
            Io(_) => ErrorClass::Transient,
            NotAFile(_) => ErrorClass::Invariant,
        }
    }
}

impl Classify for waypost_catalog::CatalogSyncError {
    fn classify(&self) -> ErrorClass {
        use waypost_catalog::CatalogSyncError::*;
        match self {
            Store(e) => e.classify(),
            Storage(e) => e.classify(),
        }
    }
}
