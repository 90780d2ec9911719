//! Error types for access control.

use thiserror::Error;
use waypost_store::types::UserStatus;

pub type Result<T> = std::result::Result<T, AccessError>;

#[derive(Error, Debug)]
pub enum AccessError {
    #[error("store error: {0}")]
    Store(#[from] waypost_store::StoreError),

    /// Returned by `ensure_active` when a non-admin user is not active.
    /// Carries the status so the caller can render a status-specific
    /// recovery message (spec §7).
    #[error("access denied: user status is {0:?}")]
    Denied(UserStatus),
}
