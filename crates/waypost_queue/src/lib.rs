//! Durable FIFO job queue for Waypost, backed by Redis.

pub mod error;
pub mod queue;

pub use error::{QueueError, Result};
pub use queue::JobQueue;
