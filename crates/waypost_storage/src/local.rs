//! Local filesystem backend, primarily for end-to-end tests and
//! deployments without a Yandex.Disk account.

use std::path::PathBuf;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio::io::AsyncReadExt;

use crate::driver::{ByteStream, EntryKind, StorageDriver, StorageEntry};
use crate::error::{Result, StorageError};

const CHUNK_SIZE: usize = 1024 * 1024;
const MAX_LISTING: usize = 500;

pub struct LocalFsStorage {
    root: PathBuf,
}

impl LocalFsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve `path` against the root, rejecting anything that escapes it
    /// (`..`, symlink tricks, absolute overrides).
    fn resolve(&self, path: &str) -> Result<PathBuf> {
        let root = self.root.canonicalize()?;
        let rel = path.trim_start_matches('/');
        let candidate = root.join(rel);

        let resolved = if candidate.exists() {
            candidate.canonicalize()?
        } else {
            // Canonicalize the parent so a not-yet-existing file still gets
            // the traversal check; callers treat a missing file as NotFound.
            let parent = candidate
                .parent()
                .ok_or_else(|| StorageError::InvalidPath(path.to_string()))?;
            let parent = parent.canonicalize().unwrap_or_else(|_| root.clone());
            parent.join(candidate.file_name().unwrap_or_default())
        };

        if resolved != root && !resolved.starts_with(&root) {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        Ok(resolved)
    }
}

/// A cheap stand-in for a content hash: size and mtime, which change
/// whenever the file's bytes do without reading the whole file up front.
/// The Yandex.Disk backend has a real md5 from the API; local has no such
/// field, so this is the idiomatic least-cost substitute.
fn fast_fingerprint(meta: &std::fs::Metadata) -> Option<String> {
    let modified = meta.modified().ok()?;
    let since_epoch = modified.duration_since(std::time::UNIX_EPOCH).ok()?;
    Some(format!("{}-{}", meta.len(), since_epoch.as_nanos()))
}

#[async_trait]
impl StorageDriver for LocalFsStorage {
    async fn list(&self, path: &str) -> Result<Vec<StorageEntry>> {
        let dir = self.resolve(path)?;
        if !dir.is_dir() {
            return Err(StorageError::NotFound(path.to_string()));
        }

        let mut entries = tokio::fs::read_dir(&dir).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name());
        }
        names.sort();

        let base = if path == "/" { String::new() } else { path.trim_end_matches('/').to_string() };
        let mut out = Vec::with_capacity(names.len().min(MAX_LISTING));
        for name in names.into_iter().take(MAX_LISTING) {
            let name = name.to_string_lossy().to_string();
            let full = dir.join(&name);
            let child_path = format!("{base}/{name}");
            let meta = tokio::fs::metadata(&full).await?;
            let is_dir = meta.is_dir();
            out.push(StorageEntry {
                name,
                path: child_path,
                kind: if is_dir { EntryKind::Folder } else { EntryKind::File },
                size_bytes: if is_dir { None } else { Some(meta.len() as i64) },
                content_fingerprint: if is_dir { None } else { fast_fingerprint(&meta) },
            });
        }
        Ok(out)
    }

    async fn stream(&self, path: &str) -> Result<ByteStream> {
        let full = self.resolve(path)?;
        if !full.is_file() {
            return Err(StorageError::NotFound(path.to_string()));
        }
        let mut file = tokio::fs::File::open(&full).await?;

        let chunks = stream::unfold(Vec::new(), move |mut buf| {
            let result = async move {
                buf.resize(CHUNK_SIZE, 0);
                match file.read(&mut buf).await {
                    Ok(0) => None,
                    Ok(n) => {
                        buf.truncate(n);
                        Some((Ok(bytes::Bytes::from(buf)), file))
                    }
                    Err(e) => Some((Err(StorageError::Io(e)), file)),
                }
            };
            result
        });

        Ok(chunks.boxed())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::io::Write;

    #[tokio::test]
    async fn lists_and_streams_a_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        let mut f = std::fs::File::create(dir.path().join("hello.txt")).unwrap();
        f.write_all(b"hello world").unwrap();

        let storage = LocalFsStorage::new(dir.path());
        let entries = storage.list("/").await.unwrap();
        assert_eq!(entries.len(), 2);

        let mut stream = storage.stream("/hello.txt").await.unwrap();
        let mut collected = Vec::new();
        while let Some(chunk) = stream.next().await {
            collected.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(collected, b"hello world");
    }

    #[tokio::test]
    async fn rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("secret.txt"), b"nope").unwrap();

        let storage = LocalFsStorage::new(dir.path());
        let err = storage.list("/../").await;
        assert!(err.is_err());
        let err = storage.stream("/../../etc/passwd").await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalFsStorage::new(dir.path());
        let err = storage.stream("/does-not-exist.txt").await;
        assert!(matches!(err, Err(StorageError::NotFound(_))));
    }
}
