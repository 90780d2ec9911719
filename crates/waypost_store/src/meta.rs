//! Key/value scalar storage for catalog-sync bookkeeping.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::Result;

const LAST_CATALOG_SYNC_INSTANT: &str = "last_catalog_sync_instant";
const LAST_CATALOG_SYNC_DELETED_COUNT: &str = "last_catalog_sync_deleted_count";

pub async fn get(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM meta WHERE key = ?1")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(value)
}

pub async fn set(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO meta (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn last_catalog_sync_instant(pool: &SqlitePool) -> Result<Option<DateTime<Utc>>> {
    match get(pool, LAST_CATALOG_SYNC_INSTANT).await? {
        Some(raw) => Ok(Some(
            DateTime::parse_from_rfc3339(&raw)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        )),
        None => Ok(None),
    }
}

/// Record the outcome of a finished sync pass: when it happened and how
/// many catalog rows it soft-deleted. `deleted_count` is `0` whenever the
/// pass skipped the delete pass because it hit its observed-item budget.
pub async fn record_catalog_sync(pool: &SqlitePool, at: DateTime<Utc>, deleted_count: u64) -> Result<()> {
    set(pool, LAST_CATALOG_SYNC_INSTANT, &at.to_rfc3339()).await?;
    set(pool, LAST_CATALOG_SYNC_DELETED_COUNT, &deleted_count.to_string()).await?;
    Ok(())
}
