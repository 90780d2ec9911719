//! Download audit trail: one row per finished job, admin rollups.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::Result;
use crate::types::{AuditMode, AuditResult, AuditRollup, DownloadAudit, TopDownload};

/// Record the outcome of a finished download job. The `job_id` unique
/// constraint means a job can only be audited once, matching the
/// audit-once-per-job invariant: a requeued-then-succeeded job overwrites
/// nothing, since its audit row is only written on the terminal attempt.
pub async fn record(
    pool: &SqlitePool,
    job_id: i64,
    chat_id: i64,
    user_id: i64,
    item_id: i64,
    result: AuditResult,
    mode: Option<AuditMode>,
    bytes: Option<i64>,
    error: Option<&str>,
) -> Result<()> {
    sqlx::query(
        "INSERT INTO download_audit (job_id, chat_id, user_id, item_id, result, mode, bytes, error)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(job_id) DO NOTHING",
    )
    .bind(job_id)
    .bind(chat_id)
    .bind(user_id)
    .bind(item_id)
    .bind(result.as_str())
    .bind(mode.map(|m| m.as_str()))
    .bind(bytes)
    .bind(error)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn find_by_job_id(pool: &SqlitePool, job_id: i64) -> Result<Option<DownloadAudit>> {
    let row = sqlx::query_as::<_, DownloadAudit>(
        "SELECT id, created_at, job_id, chat_id, user_id, item_id, result, mode, bytes, error
         FROM download_audit WHERE job_id = ?1",
    )
    .bind(job_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Succeeded/failed counts in `[since, now]`, for the admin summary view.
pub async fn rollup_since(pool: &SqlitePool, since: DateTime<Utc>) -> Result<AuditRollup> {
    let row: (i64, i64) = sqlx::query_as(
        "SELECT
            count(*) FILTER (WHERE result = 'succeeded'),
            count(*) FILTER (WHERE result = 'failed')
         FROM download_audit WHERE created_at >= ?1",
    )
    .bind(since)
    .fetch_one(pool)
    .await?;
    Ok(AuditRollup {
        succeeded: row.0,
        failed: row.1,
    })
}

/// Most-requested items in `[since, now]`, for the admin top-N view.
pub async fn top_downloads_since(pool: &SqlitePool, since: DateTime<Utc>, limit: i64) -> Result<Vec<TopDownload>> {
    let rows = sqlx::query_as::<_, (i64, i64, String, String)>(
        "SELECT a.item_id, count(*) as cnt, c.path, c.title
         FROM download_audit a
         JOIN catalog_items c ON c.id = a.item_id
         WHERE a.created_at >= ?1 AND a.result = 'succeeded'
         GROUP BY a.item_id
         ORDER BY cnt DESC
         LIMIT ?2",
    )
    .bind(since)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(item_id, count, path, title)| TopDownload {
            item_id,
            count,
            path,
            title,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{connect, DbConfig};
    use crate::{catalog, jobs, types::{CatalogKind, JobKind}, users};

    #[tokio::test]
    async fn record_is_write_once_per_job() {
        let pool = connect(&DbConfig::new(":memory:")).await.unwrap();
        let user = users::get_or_create(&pool, 1).await.unwrap();
        let item = catalog::upsert_seen(&pool, "/x", CatalogKind::File, "x", None, Some(1), None, Utc::now())
            .await
            .unwrap();
        let job = jobs::enqueue(&pool, 10, user.id, item, JobKind::Download, "corr").await.unwrap();

        record(&pool, job.id, 10, user.id, item, AuditResult::Succeeded, Some(AuditMode::Upload), Some(1024), None)
            .await
            .unwrap();
        // A second write for the same job must be ignored, not overwrite.
        record(&pool, job.id, 10, user.id, item, AuditResult::Failed, None, None, Some("ignored"))
            .await
            .unwrap();

        let row = find_by_job_id(&pool, job.id).await.unwrap().unwrap();
        assert_eq!(row.result, "succeeded");
    }

    #[tokio::test]
    async fn rollup_counts_by_result() {
        let pool = connect(&DbConfig::new(":memory:")).await.unwrap();
        let user = users::get_or_create(&pool, 1).await.unwrap();
        let item = catalog::upsert_seen(&pool, "/x", CatalogKind::File, "x", None, Some(1), None, Utc::now())
            .await
            .unwrap();

        for (i, result) in [AuditResult::Succeeded, AuditResult::Succeeded, AuditResult::Failed]
            .into_iter()
            .enumerate()
        {
            let job = jobs::enqueue(&pool, 10, user.id, item, JobKind::Download, &format!("corr-{i}"))
                .await
                .unwrap();
            record(&pool, job.id, 10, user.id, item, result, None, None, None).await.unwrap();
        }

        let rollup = rollup_since(&pool, Utc::now() - chrono::Duration::days(1)).await.unwrap();
        assert_eq!(rollup.succeeded, 2);
        assert_eq!(rollup.failed, 1);
    }
}
