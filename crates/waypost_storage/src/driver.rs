//! Capability contract every storage backend implements.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Folder,
    File,
}

/// One entry returned by `list`. `size_bytes` and `content_fingerprint`
/// are `None` for folders. `content_fingerprint` is an opaque per-backend
/// content identity (an md5/etag) used to detect that a file's bytes
/// changed between syncs, distinct from its mtime or size.
#[derive(Debug, Clone)]
pub struct StorageEntry {
    pub name: String,
    pub path: String,
    pub kind: EntryKind,
    pub size_bytes: Option<i64>,
    pub content_fingerprint: Option<String>,
}

/// A chunked byte stream of a file's contents.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Pluggable backend for listing and reading a remote or local file tree.
/// Implementors are expected to be cheap to clone (an `Arc`-wrapped client
/// or a plain root path) since the engine holds one instance per worker.
#[async_trait]
pub trait StorageDriver: Send + Sync {
    /// List the direct children of `path`, capped to a sane page size by
    /// the implementation.
    async fn list(&self, path: &str) -> Result<Vec<StorageEntry>>;

    /// Open a streaming read of the file at `path`.
    async fn stream(&self, path: &str) -> Result<ByteStream>;

    /// Release any held resources (connection pools, temp clients).
    async fn close(&self) -> Result<()>;
}
