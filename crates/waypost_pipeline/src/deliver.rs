//! Hot path (cached content handle) and cold path (spool + upload)
//! delivery of a catalog file to a chat.
//!
//! Grounded on the original's `worker/main.py::process_one` (tempfile
//! spool, `bot.send_document`, state-transition order); the cached-handle
//! hot path is new relative to the original, grounded on spec §4.7 and on
//! the `tg_file_id`/`tg_file_unique_id` columns the original already
//! carried in its schema but never read back.
//!
//! This module returns a classified outcome or error; it does not decide
//! retry-vs-terminal or write the audit row — that arbitration belongs to
//! the job engine (spec §7: "the job engine is the sole arbiter").

use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use waypost_messenger::{ContentHandle, MessengerDriver, MessengerError};
use waypost_storage::StorageDriver;
use waypost_store::catalog;
use waypost_store::types::{AuditMode, CatalogKind};

use crate::error::{DeliveryError, Result};

/// What a successful delivery did, so the caller can write the right
/// audit row.
#[derive(Debug, Clone, Copy)]
pub struct DeliveryOutcome {
    pub mode: AuditMode,
    pub bytes: Option<i64>,
}

/// Deliver the file behind `job`'s catalog item to `job`'s chat.
/// Precondition: `job` is a `download` job (checked by the caller /
/// dispatch layer) referencing a `file` item.
pub async fn deliver(
    pool: &sqlx::SqlitePool,
    storage: &dyn StorageDriver,
    messenger: &dyn MessengerDriver,
    job: &waypost_store::types::Job,
) -> Result<DeliveryOutcome> {
    let item = catalog::find_by_id(pool, job.item_id).await?;
    if item.kind() != CatalogKind::File {
        return Err(DeliveryError::NotAFile(item.id));
    }

    if let Some((handle_id, handle_unique_id)) = item.cached_handle() {
        let handle = ContentHandle {
            id: handle_id,
            unique_id: handle_unique_id,
        };
        match messenger.send_by_handle(job.chat_id, &handle, &item.title).await {
            Ok(refreshed) => {
                if refreshed != handle {
                    catalog::set_cached_handle(pool, item.id, &refreshed.id, &refreshed.unique_id).await?;
                }
                info!(job_id = job.id, item_id = item.id, "delivered via cached handle");
                return Ok(DeliveryOutcome {
                    mode: AuditMode::CachedHandle,
                    bytes: None,
                });
            }
            Err(MessengerError::HandleInvalid(reason)) => {
                warn!(job_id = job.id, item_id = item.id, reason, "cached handle invalid, falling to cold path");
                catalog::clear_cached_handle(pool, item.id).await?;
            }
            Err(other) => return Err(DeliveryError::Messenger(other)),
        }
    }

    spool_and_upload(pool, storage, messenger, job, &item).await
}

async fn spool_and_upload(
    pool: &sqlx::SqlitePool,
    storage: &dyn StorageDriver,
    messenger: &dyn MessengerDriver,
    job: &waypost_store::types::Job,
    item: &waypost_store::types::CatalogItem,
) -> Result<DeliveryOutcome> {
    let storage_id = item.storage_id.clone().unwrap_or_else(|| item.path.clone());

    // `NamedTempFile` unlinks on drop on every exit path, including the
    // early returns from `?` below.
    let tmp = tempfile::Builder::new().prefix("waypost-").suffix(".bin").tempfile()?;
    let tmp_path = tmp.path().to_path_buf();

    let mut stream = storage.stream(&storage_id).await?;
    let mut out = tokio::fs::File::create(&tmp_path).await?;
    let mut total_bytes: i64 = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        out.write_all(&chunk).await?;
        total_bytes += chunk.len() as i64;
    }
    out.flush().await?;
    drop(out);

    let handle = messenger.send_file(job.chat_id, &tmp_path, &item.title).await?;
    catalog::set_cached_handle(pool, item.id, &handle.id, &handle.unique_id).await?;

    info!(job_id = job.id, item_id = item.id, bytes = total_bytes, "delivered via fresh upload");
    Ok(DeliveryOutcome {
        mode: AuditMode::Upload,
        bytes: Some(total_bytes),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;
    use waypost_storage::{ByteStream, StorageError};
    use waypost_store::pool::{connect, DbConfig};
    use waypost_store::types::JobKind;
    use waypost_store::{jobs, users};

    struct FakeStorage {
        bytes: Vec<u8>,
    }

    #[async_trait]
    impl StorageDriver for FakeStorage {
        async fn list(&self, _path: &str) -> waypost_storage::Result<Vec<waypost_storage::StorageEntry>> {
            unimplemented!()
        }

        async fn stream(&self, _path: &str) -> waypost_storage::Result<ByteStream> {
            let chunk = bytes::Bytes::from(self.bytes.clone());
            Ok(futures::stream::once(async move { Ok(chunk) }).boxed())
        }

        async fn close(&self) -> waypost_storage::Result<()> {
            Ok(())
        }
    }

    struct FailingStorage;

    #[async_trait]
    impl StorageDriver for FailingStorage {
        async fn list(&self, _path: &str) -> waypost_storage::Result<Vec<waypost_storage::StorageEntry>> {
            unimplemented!()
        }

        async fn stream(&self, _path: &str) -> waypost_storage::Result<ByteStream> {
            Err(StorageError::NotFound("gone".into()))
        }

        async fn close(&self) -> waypost_storage::Result<()> {
            Ok(())
        }
    }

    struct FakeMessenger {
        handle_out: (String, String),
        cached_handle_result: Mutex<Option<Result_>>,
        uploads: Mutex<Vec<i64>>,
    }

    type Result_ = std::result::Result<(String, String), &'static str>;

    #[async_trait]
    impl MessengerDriver for FakeMessenger {
        async fn send_text(&self, _chat_id: i64, _text: &str) -> waypost_messenger::Result<()> {
            Ok(())
        }

        async fn send_file(&self, _chat_id: i64, _local_path: &Path, _caption: &str) -> waypost_messenger::Result<ContentHandle> {
            self.uploads.lock().unwrap().push(1);
            Ok(ContentHandle {
                id: self.handle_out.0.clone(),
                unique_id: self.handle_out.1.clone(),
            })
        }

        async fn send_by_handle(&self, _chat_id: i64, _handle: &ContentHandle, _caption: &str) -> waypost_messenger::Result<ContentHandle> {
            match &*self.cached_handle_result.lock().unwrap() {
                Some(Ok((id, uid))) => Ok(ContentHandle { id: id.clone(), unique_id: uid.clone() }),
                Some(Err(_)) => Err(MessengerError::HandleInvalid("evicted".into())),
                None => unreachable!(),
            }
        }
    }

    async fn seeded_job(pool: &sqlx::SqlitePool) -> waypost_store::types::Job {
        let user = users::get_or_create(pool, 200).await.unwrap();
        let item = catalog::upsert_seen(pool, "/A/f.bin", CatalogKind::File, "f.bin", Some("/A/f.bin"), Some(3), Some("/A"), chrono::Utc::now())
            .await
            .unwrap();
        jobs::enqueue(pool, 100, user.id, item, JobKind::Download, "r1").await.unwrap()
    }

    #[tokio::test]
    async fn s1_cold_download_uploads_and_caches_handle() {
        let pool = connect(&DbConfig::new(":memory:")).await.unwrap();
        let job = seeded_job(&pool).await;

        let storage = FakeStorage { bytes: b"hello".to_vec() };
        let messenger = FakeMessenger {
            handle_out: ("id1".into(), "u1".into()),
            cached_handle_result: Mutex::new(None),
            uploads: Mutex::new(Vec::new()),
        };

        let outcome = deliver(&pool, &storage, &messenger, &job).await.unwrap();
        assert!(matches!(outcome.mode, AuditMode::Upload));
        assert_eq!(outcome.bytes, Some(5));

        let item = catalog::find_by_id(&pool, job.item_id).await.unwrap();
        assert_eq!(item.cached_handle(), Some(("id1".to_string(), "u1".to_string())));
    }

    #[tokio::test]
    async fn s2_hot_path_skips_storage_stream() {
        let pool = connect(&DbConfig::new(":memory:")).await.unwrap();
        let job = seeded_job(&pool).await;
        catalog::set_cached_handle(&pool, job.item_id, "id1", "u1").await.unwrap();

        let storage = FailingStorage;
        let messenger = FakeMessenger {
            handle_out: ("unused".into(), "unused".into()),
            cached_handle_result: Mutex::new(Some(Ok(("id1".into(), "u2".into())))),
            uploads: Mutex::new(Vec::new()),
        };

        let outcome = deliver(&pool, &storage, &messenger, &job).await.unwrap();
        assert!(matches!(outcome.mode, AuditMode::CachedHandle));
        let item = catalog::find_by_id(&pool, job.item_id).await.unwrap();
        assert_eq!(item.cached_handle(), Some(("id1".to_string(), "u2".to_string())));
    }

    #[tokio::test]
    async fn s3_handle_invalid_falls_through_to_cold_path() {
        let pool = connect(&DbConfig::new(":memory:")).await.unwrap();
        let job = seeded_job(&pool).await;
        catalog::set_cached_handle(&pool, job.item_id, "stale-id", "stale-u").await.unwrap();

        let storage = FakeStorage { bytes: b"fresh bytes".to_vec() };
        let messenger = FakeMessenger {
            handle_out: ("id9".into(), "u9".into()),
            cached_handle_result: Mutex::new(Some(Err("invalid"))),
            uploads: Mutex::new(Vec::new()),
        };

        let outcome = deliver(&pool, &storage, &messenger, &job).await.unwrap();
        assert!(matches!(outcome.mode, AuditMode::Upload));
        let item = catalog::find_by_id(&pool, job.item_id).await.unwrap();
        assert_eq!(item.cached_handle(), Some(("id9".to_string(), "u9".to_string())));
    }

    #[tokio::test]
    async fn non_file_item_is_an_invariant_violation() {
        let pool = connect(&DbConfig::new(":memory:")).await.unwrap();
        let user = users::get_or_create(&pool, 1).await.unwrap();
        let item = catalog::upsert_seen(&pool, "/A", CatalogKind::Folder, "A", None, None, None, chrono::Utc::now())
            .await
            .unwrap();
        let job = jobs::enqueue(&pool, 1, user.id, item, JobKind::Download, "r").await.unwrap();

        let storage = FailingStorage;
        let messenger = FakeMessenger {
            handle_out: ("x".into(), "y".into()),
            cached_handle_result: Mutex::new(None),
            uploads: Mutex::new(Vec::new()),
        };

        let err = deliver(&pool, &storage, &messenger, &job).await.unwrap_err();
        assert!(matches!(err, DeliveryError::NotAFile(_)));
    }
}
