//! Capability contract every messenger backend implements.

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;

/// A platform-issued identifier for previously-uploaded content. Storing
/// this pair lets a later delivery replay the same bytes without a fresh
/// upload — see spec §4.7's cached-handle hot path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentHandle {
    pub id: String,
    pub unique_id: String,
}

/// Pluggable backend for sending text and files to a chat target.
#[async_trait]
pub trait MessengerDriver: Send + Sync {
    /// Send a plain text message.
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()>;

    /// Upload a local file and return the handle the platform issued for
    /// it, for later cache-hit delivery.
    async fn send_file(&self, chat_id: i64, local_path: &Path, caption: &str) -> Result<ContentHandle>;

    /// Re-send previously uploaded content by its cached handle. On
    /// success the platform may return a refreshed handle that should
    /// overwrite the cached one. Returns `Err` with an error whose class
    /// is `HandleInvalid` if the platform has evicted the content —
    /// callers must fall through to `send_file` in that case, not treat
    /// it as a job failure.
    async fn send_by_handle(&self, chat_id: i64, handle: &ContentHandle, caption: &str) -> Result<ContentHandle>;
}
