//! Delivery pipeline for Waypost: the cached-handle hot path and the
//! spool-and-upload cold path for download jobs.

pub mod deliver;
pub mod error;

pub use deliver::{deliver, DeliveryOutcome};
pub use error::{DeliveryError, Result};
