//! Periodic sync-job scheduler: every `interval`, ensure no sync job is
//! already in flight, then enqueue a synthetic one. Single-in-flight
//! semantics come from `has_active_sync_job`, not an external lock.
//!
//! Grounded on `db.py::has_active_sync_job` plus the teacher's
//! periodic-task style (an interval tick wrapping a fallible step, errors
//! logged and the loop continues — `casparian_sentinel`'s stale-worker
//! cleanup follows the same shape, just inline in its own loop rather
//! than a separate task).

use std::sync::Arc;
use std::time::Duration as StdDuration;

use tracing::{error, info};
use uuid::Uuid;
use waypost_store::types::{CatalogKind, JobKind};
use waypost_store::{catalog, jobs};

use crate::error::Result;
use crate::job_source::JobSource;

/// Job rows produced by the scheduler use `chat=0, user=0` as the
/// synthetic-origin sentinel (spec §4.8) — no real user or chat owns a
/// sync job, and neither column carries a foreign key, so 0 is a safe
/// placeholder id rather than a real row reference.
const SYNTHETIC_CHAT_ID: i64 = 0;
const SYNTHETIC_USER_ID: i64 = 0;

/// One scheduling pass. Returns the enqueued job id, or `None` if a sync
/// job was already in flight.
pub async fn tick_once(pool: &sqlx::SqlitePool, queue: &Arc<dyn JobSource>, sync_root: &str) -> Result<Option<i64>> {
    if jobs::has_active_sync_job(pool).await? {
        return Ok(None);
    }

    // Ensure the root folder item exists so the synthetic job has an
    // item id to reference — the very first sync of a fresh install has
    // no catalog rows yet.
    let root_item_id = catalog::upsert_seen(pool, sync_root, CatalogKind::Folder, sync_root, None, None, None, chrono::Utc::now()).await?;

    let correlation = format!("sync-{}", Uuid::new_v4());
    let job = jobs::enqueue(pool, SYNTHETIC_CHAT_ID, SYNTHETIC_USER_ID, root_item_id, JobKind::SyncCatalog, &correlation).await?;
    queue.push(job.id).await?;
    info!(job_id = job.id, "periodic sync job enqueued");
    Ok(Some(job.id))
}

/// Run `tick_once` forever, waking every `interval`. A caller that
/// configured `interval == 0` should not spawn this task at all (spec
/// §4.8: "if the configured interval > 0").
pub async fn run(pool: sqlx::SqlitePool, queue: Arc<dyn JobSource>, interval: StdDuration, sync_root: String) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        if let Err(e) = tick_once(&pool, &queue, &sync_root).await {
            error!(error = %e, "periodic sync scheduling pass failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job_source::MemoryQueue;
    use waypost_store::pool::{connect, DbConfig};
    use waypost_store::types::JobState;

    #[tokio::test]
    async fn enqueues_when_no_sync_job_in_flight() {
        let pool = connect(&DbConfig::new(":memory:")).await.unwrap();
        let queue: Arc<dyn JobSource> = Arc::new(MemoryQueue::new());

        let job_id = tick_once(&pool, &queue, "/").await.unwrap();
        assert!(job_id.is_some());
        assert_eq!(queue.pop_blocking(0.0).await.unwrap(), job_id);
    }

    #[tokio::test]
    async fn skips_when_sync_job_already_in_flight() {
        let pool = connect(&DbConfig::new(":memory:")).await.unwrap();
        let queue: Arc<dyn JobSource> = Arc::new(MemoryQueue::new());

        let first = tick_once(&pool, &queue, "/").await.unwrap().unwrap();
        let second = tick_once(&pool, &queue, "/").await.unwrap();
        assert!(second.is_none());

        let job = jobs::find_by_id(&pool, first).await.unwrap();
        assert_eq!(job.state(), JobState::Queued);
    }
}
