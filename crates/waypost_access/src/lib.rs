//! Access-control lifecycle for Waypost: the user status state machine,
//! TTL activation/extension, and the pre-expiry warning sweep.

pub mod error;
pub mod lifecycle;
pub mod warn_sweep;

pub use error::{AccessError, Result};
pub use lifecycle::{denial_message, expire_users, AccessControl};
