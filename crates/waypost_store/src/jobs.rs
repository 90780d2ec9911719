//! Job lifecycle: enqueue, claim, terminal transitions, requeue.

use sqlx::SqlitePool;

use crate::error::{Result, StoreError};
use crate::types::{Job, JobKind, JobState};

/// Insert a queued job row. The `(chat_id, item_id, correlation)` unique
/// constraint makes re-enqueuing the same logical request (e.g. a retried
/// button press) a no-op that returns the existing job instead of a
/// duplicate.
pub async fn enqueue(
    pool: &SqlitePool,
    chat_id: i64,
    user_id: i64,
    item_id: i64,
    kind: JobKind,
    correlation: &str,
) -> Result<Job> {
    sqlx::query(
        "INSERT INTO jobs (chat_id, user_id, item_id, kind, state, correlation)
         VALUES (?1, ?2, ?3, ?4, 'queued', ?5)
         ON CONFLICT(chat_id, item_id, correlation) DO NOTHING",
    )
    .bind(chat_id)
    .bind(user_id)
    .bind(item_id)
    .bind(kind.as_str())
    .bind(correlation)
    .execute(pool)
    .await?;

    find_by_natural_key(pool, chat_id, item_id, correlation).await
}

async fn find_by_natural_key(pool: &SqlitePool, chat_id: i64, item_id: i64, correlation: &str) -> Result<Job> {
    sqlx::query_as::<_, Job>(
        "SELECT id, created_at, updated_at, chat_id, user_id, item_id, kind, state, attempt, last_error, correlation
         FROM jobs WHERE chat_id = ?1 AND item_id = ?2 AND correlation = ?3",
    )
    .bind(chat_id)
    .bind(item_id)
    .bind(correlation)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| StoreError::invalid_state("job vanished immediately after enqueue"))
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Job> {
    sqlx::query_as::<_, Job>(
        "SELECT id, created_at, updated_at, chat_id, user_id, item_id, kind, state, attempt, last_error, correlation
         FROM jobs WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| StoreError::not_found(format!("job {id}")))
}

/// Transition `queued -> running` and bump the attempt counter. Returns
/// `Err(InvalidState)` if the job is not currently queued — a worker
/// should treat that as "someone else already claimed it" and move on.
pub async fn claim(pool: &SqlitePool, id: i64) -> Result<Job> {
    let result = sqlx::query(
        "UPDATE jobs SET state = 'running', attempt = attempt + 1, updated_at = datetime('now')
         WHERE id = ?1 AND state = 'queued'",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::invalid_state(format!(
            "job {id} is not queued, cannot claim"
        )));
    }
    find_by_id(pool, id).await
}

pub async fn mark_succeeded(pool: &SqlitePool, id: i64) -> Result<()> {
    sqlx::query("UPDATE jobs SET state = 'succeeded', last_error = NULL, updated_at = datetime('now') WHERE id = ?1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn mark_failed(pool: &SqlitePool, id: i64, error: &str) -> Result<()> {
    sqlx::query("UPDATE jobs SET state = 'failed', last_error = ?1, updated_at = datetime('now') WHERE id = ?2")
        .bind(error)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Return a running job to the queue for another attempt. Callers are
/// expected to have already checked the attempt budget; this store layer
/// does not enforce one.
pub async fn requeue(pool: &SqlitePool, id: i64, error: &str) -> Result<()> {
    sqlx::query("UPDATE jobs SET state = 'queued', last_error = ?1, updated_at = datetime('now') WHERE id = ?2")
        .bind(error)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn mark_cancelled(pool: &SqlitePool, id: i64, reason: &str) -> Result<()> {
    sqlx::query("UPDATE jobs SET state = 'cancelled', last_error = ?1, updated_at = datetime('now') WHERE id = ?2")
        .bind(reason)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Jobs left `running` past a crash or restart, for sweep-and-requeue on
/// startup.
pub async fn find_stuck_running(pool: &SqlitePool, older_than: chrono::DateTime<chrono::Utc>) -> Result<Vec<Job>> {
    let rows = sqlx::query_as::<_, Job>(
        "SELECT id, created_at, updated_at, chat_id, user_id, item_id, kind, state, attempt, last_error, correlation
         FROM jobs WHERE state = 'running' AND updated_at < ?1",
    )
    .bind(older_than)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Whether a sync_catalog job is currently queued or running — the
/// periodic scheduler's single-in-flight guard.
pub async fn has_active_sync_job(pool: &SqlitePool) -> Result<bool> {
    let found: Option<i64> = sqlx::query_scalar(
        "SELECT 1 FROM jobs WHERE kind = 'sync_catalog' AND state IN ('queued', 'running') LIMIT 1",
    )
    .fetch_optional(pool)
    .await?;
    Ok(found.is_some())
}

pub async fn count_by_state(pool: &SqlitePool, state: JobState) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT count(*) FROM jobs WHERE state = ?1")
        .bind(state.as_str())
        .fetch_one(pool)
        .await?;
    Ok(count)
}
