//! End-to-end engine-level coverage of spec.md §8's S4 scenario (retry
//! budget arbitration) and the asymmetric terminal-notification rule
//! (§7: download failures notify the requester and admins, sync
//! failures notify admins only). S1/S2/S3/S5/S6 are covered at the layer
//! that owns them (`waypost_pipeline`, `waypost_catalog`,
//! `waypost_access`) plus a worker-level smoke test in `worker.rs`; this
//! file adds the cases that only the engine's attempt-bumping + retry
//! matrix can exercise.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use waypost_engine::{Dispatcher, DispatcherConfig, JobSource, MemoryQueue};
use waypost_messenger::{ContentHandle, MessengerDriver, MessengerError};
use waypost_storage::{ByteStream, StorageDriver, StorageEntry, StorageError};
use waypost_store::pool::{connect, DbConfig};
use waypost_store::types::{AuditMode, CatalogKind, JobKind, JobState};
use waypost_store::{audit, catalog, jobs, users};

struct FixedStorage {
    bytes: Vec<u8>,
}

#[async_trait]
impl StorageDriver for FixedStorage {
    async fn list(&self, _path: &str) -> waypost_storage::Result<Vec<StorageEntry>> {
        Ok(Vec::new())
    }

    async fn stream(&self, _path: &str) -> waypost_storage::Result<ByteStream> {
        let chunk = Bytes::from(self.bytes.clone());
        Ok(futures::stream::once(async move { Ok(chunk) }).boxed())
    }

    async fn close(&self) -> waypost_storage::Result<()> {
        Ok(())
    }
}

struct AlwaysFailStorage;

#[async_trait]
impl StorageDriver for AlwaysFailStorage {
    async fn list(&self, _path: &str) -> waypost_storage::Result<Vec<StorageEntry>> {
        Err(StorageError::NotFound("remote tree unavailable".into()))
    }

    async fn stream(&self, _path: &str) -> waypost_storage::Result<ByteStream> {
        unimplemented!("not exercised by the sync-failure scenario")
    }

    async fn close(&self) -> waypost_storage::Result<()> {
        Ok(())
    }
}

/// Fails `send_file` transiently the first `fail_times` calls, then
/// succeeds. Records every `send_text` call for notification assertions.
struct FlakyMessenger {
    fail_times: Mutex<u32>,
    sent: Mutex<Vec<(i64, String)>>,
}

#[async_trait]
impl MessengerDriver for FlakyMessenger {
    async fn send_text(&self, chat_id: i64, text: &str) -> waypost_messenger::Result<()> {
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        Ok(())
    }

    async fn send_file(&self, _chat_id: i64, _local_path: &Path, _caption: &str) -> waypost_messenger::Result<ContentHandle> {
        let mut remaining = self.fail_times.lock().unwrap();
        if *remaining > 0 {
            *remaining -= 1;
            return Err(MessengerError::Transient("upstream hiccup".into()));
        }
        Ok(ContentHandle {
            id: "idH".into(),
            unique_id: "uH".into(),
        })
    }

    async fn send_by_handle(&self, _chat_id: i64, handle: &ContentHandle, _caption: &str) -> waypost_messenger::Result<ContentHandle> {
        Ok(handle.clone())
    }
}

async fn seeded_download_job(pool: &sqlx::SqlitePool) -> waypost_store::types::Job {
    let user = users::get_or_create(pool, 200).await.unwrap();
    let item = catalog::upsert_seen(pool, "/A/f.bin", CatalogKind::File, "f.bin", Some("/A/f.bin"), Some(7), Some("/A"), chrono::Utc::now())
        .await
        .unwrap();
    jobs::enqueue(pool, 100, user.id, item, JobKind::Download, "s4").await.unwrap()
}

#[tokio::test]
async fn s4_succeeds_on_third_attempt_with_single_audit_row() {
    let pool = connect(&DbConfig::new(":memory:")).await.unwrap();
    let job = seeded_download_job(&pool).await;
    let queue: Arc<dyn JobSource> = Arc::new(MemoryQueue::new());
    let storage: Arc<dyn StorageDriver> = Arc::new(FixedStorage { bytes: b"payload".to_vec() });
    let messenger = Arc::new(FlakyMessenger {
        fail_times: Mutex::new(2),
        sent: Mutex::new(Vec::new()),
    });
    let dispatcher = Dispatcher::new(
        pool.clone(),
        queue,
        storage,
        messenger.clone() as Arc<dyn MessengerDriver>,
        DispatcherConfig {
            max_attempts: 3,
            sync_root: "/".into(),
            sync_budget: 1000,
            admin_chat_ids: vec![900],
        },
    );

    for expected_attempt in 1..=3 {
        let claimed = jobs::claim(&pool, job.id).await.unwrap();
        dispatcher.dispatch(claimed).await.unwrap();
        let reloaded = jobs::find_by_id(&pool, job.id).await.unwrap();
        assert_eq!(reloaded.attempt, expected_attempt);
        if expected_attempt < 3 {
            assert_eq!(reloaded.state(), JobState::Queued);
        } else {
            assert_eq!(reloaded.state(), JobState::Succeeded);
        }
    }

    let audit_row = audit::find_by_job_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(audit_row.result, "succeeded");
    assert_eq!(audit_row.mode.as_deref(), Some(AuditMode::Upload.as_str()));
    assert!(messenger.sent.lock().unwrap().is_empty(), "no notification on the success path");
}

#[tokio::test]
async fn s4_variant_fails_terminally_with_exactly_one_notification_per_target() {
    let pool = connect(&DbConfig::new(":memory:")).await.unwrap();
    let job = seeded_download_job(&pool).await;
    let queue: Arc<dyn JobSource> = Arc::new(MemoryQueue::new());
    let storage: Arc<dyn StorageDriver> = Arc::new(FixedStorage { bytes: b"payload".to_vec() });
    let messenger = Arc::new(FlakyMessenger {
        fail_times: Mutex::new(10),
        sent: Mutex::new(Vec::new()),
    });
    let dispatcher = Dispatcher::new(
        pool.clone(),
        queue,
        storage,
        messenger.clone() as Arc<dyn MessengerDriver>,
        DispatcherConfig {
            max_attempts: 3,
            sync_root: "/".into(),
            sync_budget: 1000,
            admin_chat_ids: vec![900],
        },
    );

    for _ in 0..3 {
        let claimed = jobs::claim(&pool, job.id).await.unwrap();
        dispatcher.dispatch(claimed).await.unwrap();
    }

    let reloaded = jobs::find_by_id(&pool, job.id).await.unwrap();
    assert_eq!(reloaded.state(), JobState::Failed);
    assert_eq!(reloaded.attempt, 3);
    assert!(reloaded.last_error.is_some());

    let audit_row = audit::find_by_job_id(&pool, job.id).await.unwrap().unwrap();
    assert_eq!(audit_row.result, "failed");

    let sent = messenger.sent.lock().unwrap();
    assert_eq!(sent.iter().filter(|(chat, _)| *chat == 100).count(), 1, "exactly one message to the requester");
    assert_eq!(sent.iter().filter(|(chat, _)| *chat == 900).count(), 1, "exactly one admin fan-out message");
}

#[tokio::test]
async fn sync_terminal_failure_notifies_admins_only() {
    let pool = connect(&DbConfig::new(":memory:")).await.unwrap();
    let root_item = catalog::upsert_seen(&pool, "/", CatalogKind::Folder, "/", None, None, None, chrono::Utc::now())
        .await
        .unwrap();
    let job = jobs::enqueue(&pool, 0, 0, root_item, JobKind::SyncCatalog, "sync-1").await.unwrap();

    let queue: Arc<dyn JobSource> = Arc::new(MemoryQueue::new());
    let storage: Arc<dyn StorageDriver> = Arc::new(AlwaysFailStorage);
    let messenger = Arc::new(FlakyMessenger {
        fail_times: Mutex::new(0),
        sent: Mutex::new(Vec::new()),
    });
    let dispatcher = Dispatcher::new(
        pool.clone(),
        queue,
        storage,
        messenger.clone() as Arc<dyn MessengerDriver>,
        DispatcherConfig {
            max_attempts: 3,
            sync_root: "/".into(),
            sync_budget: 1000,
            admin_chat_ids: vec![900, 901],
        },
    );

    let claimed = jobs::claim(&pool, job.id).await.unwrap();
    dispatcher.dispatch(claimed).await.unwrap();

    let reloaded = jobs::find_by_id(&pool, job.id).await.unwrap();
    // storage "not found" is terminal on the first attempt, not a retry.
    assert_eq!(reloaded.state(), JobState::Failed);
    assert_eq!(reloaded.attempt, 1);

    let sent = messenger.sent.lock().unwrap();
    assert_eq!(sent.len(), 2);
    assert!(sent.iter().all(|(chat, _)| *chat == 900 || *chat == 901));
}
