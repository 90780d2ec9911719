//! Catalog tree: upsert-on-sync, soft deletion, lookup, and search.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::{Result, StoreError};
use crate::types::{CatalogChild, CatalogItem, CatalogKind};

/// Insert or refresh a catalog entry seen during a sync pass. Resurrects a
/// previously soft-deleted item at the same path.
///
/// `fingerprint` is the backend's content identity for this observation
/// (e.g. an md5/etag). When it differs from the row's stored fingerprint,
/// the cached content handle is cleared — the bytes changed, so a future
/// delivery must re-upload rather than replay the stale handle.
#[allow(clippy::too_many_arguments)]
pub async fn upsert_seen(
    pool: &SqlitePool,
    path: &str,
    kind: CatalogKind,
    title: &str,
    storage_id: Option<&str>,
    size_bytes: Option<i64>,
    parent_path: Option<&str>,
    seen_at: DateTime<Utc>,
) -> Result<i64> {
    upsert_seen_with_fingerprint(pool, path, kind, title, storage_id, size_bytes, parent_path, None, seen_at).await
}

#[allow(clippy::too_many_arguments)]
pub async fn upsert_seen_with_fingerprint(
    pool: &SqlitePool,
    path: &str,
    kind: CatalogKind,
    title: &str,
    storage_id: Option<&str>,
    size_bytes: Option<i64>,
    parent_path: Option<&str>,
    fingerprint: Option<&str>,
    seen_at: DateTime<Utc>,
) -> Result<i64> {
    let stored_fingerprint: Option<String> =
        sqlx::query_scalar("SELECT content_fingerprint FROM catalog_items WHERE path = ?1")
            .bind(path)
            .fetch_optional(pool)
            .await?
            .flatten();

    let fingerprint_changed = match (fingerprint, &stored_fingerprint) {
        (Some(fresh), Some(stored)) => fresh != stored,
        _ => false,
    };

    sqlx::query(
        "INSERT INTO catalog_items (path, kind, title, storage_id, size_bytes, parent_path, content_fingerprint, last_seen, is_deleted, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, datetime('now'))
         ON CONFLICT(path) DO UPDATE SET
             kind = excluded.kind,
             title = excluded.title,
             storage_id = excluded.storage_id,
             size_bytes = excluded.size_bytes,
             parent_path = excluded.parent_path,
             content_fingerprint = excluded.content_fingerprint,
             last_seen = excluded.last_seen,
             is_deleted = 0,
             updated_at = datetime('now')",
    )
    .bind(path)
    .bind(kind.as_str())
    .bind(title)
    .bind(storage_id)
    .bind(size_bytes)
    .bind(parent_path)
    .bind(fingerprint)
    .bind(seen_at)
    .execute(pool)
    .await?;

    let id: i64 = sqlx::query_scalar("SELECT id FROM catalog_items WHERE path = ?1")
        .bind(path)
        .fetch_one(pool)
        .await?;

    if fingerprint_changed {
        clear_cached_handle(pool, id).await?;
    }
    Ok(id)
}

/// Soft-delete every non-deleted item under `root` whose `last_seen`
/// predates `watermark` — i.e. it was not touched by the sync pass that
/// began at that watermark. The root item itself is never deleted.
/// Returns the number of rows newly marked deleted.
pub async fn mark_unseen_since_deleted(pool: &SqlitePool, root: &str, watermark: DateTime<Utc>) -> Result<u64> {
    let root = if root.len() > 1 { root.trim_end_matches('/') } else { root };
    let result = if root == "/" {
        sqlx::query(
            "UPDATE catalog_items
             SET is_deleted = 1, updated_at = datetime('now')
             WHERE is_deleted = 0 AND (last_seen IS NULL OR last_seen < ?1)
               AND path LIKE '/%' AND path != ?2",
        )
        .bind(watermark)
        .bind(root)
        .execute(pool)
        .await?
    } else {
        let like = format!("{root}/%");
        sqlx::query(
            "UPDATE catalog_items
             SET is_deleted = 1, updated_at = datetime('now')
             WHERE is_deleted = 0 AND (last_seen IS NULL OR last_seen < ?1)
               AND (path = ?2 OR path LIKE ?3) AND path != ?2",
        )
        .bind(watermark)
        .bind(root)
        .bind(like)
        .execute(pool)
        .await?
    };
    Ok(result.rows_affected())
}

pub async fn find_by_path(pool: &SqlitePool, path: &str) -> Result<CatalogItem> {
    sqlx::query_as::<_, CatalogItem>(
        "SELECT id, path, kind, title, storage_id, size_bytes, parent_path,
                cached_handle_id, cached_handle_unique_id, content_fingerprint, last_seen, is_deleted, updated_at
         FROM catalog_items WHERE path = ?1 AND is_deleted = 0",
    )
    .bind(path)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| StoreError::not_found(format!("catalog item {path}")))
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<CatalogItem> {
    sqlx::query_as::<_, CatalogItem>(
        "SELECT id, path, kind, title, storage_id, size_bytes, parent_path,
                cached_handle_id, cached_handle_unique_id, content_fingerprint, last_seen, is_deleted, updated_at
         FROM catalog_items WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| StoreError::not_found(format!("catalog item {id}")))
}

/// Direct children of `parent_path`, folders first then files, alphabetic
/// within each group.
pub async fn list_children(pool: &SqlitePool, parent_path: &str, limit: i64, offset: i64) -> Result<Vec<CatalogChild>> {
    let rows = sqlx::query_as::<_, CatalogChild>(
        "SELECT id, kind, title, size_bytes, path
         FROM catalog_items
         WHERE parent_path = ?1 AND is_deleted = 0
         ORDER BY kind DESC, title COLLATE NOCASE ASC
         LIMIT ?2 OFFSET ?3",
    )
    .bind(parent_path)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn count_children(pool: &SqlitePool, parent_path: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT count(*) FROM catalog_items WHERE parent_path = ?1 AND is_deleted = 0",
    )
    .bind(parent_path)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// Record a delivered content handle so later downloads of the same item
/// can skip re-uploading, as long as the storage fingerprint is unchanged.
pub async fn set_cached_handle(
    pool: &SqlitePool,
    item_id: i64,
    handle_id: &str,
    handle_unique_id: &str,
) -> Result<()> {
    sqlx::query(
        "UPDATE catalog_items
         SET cached_handle_id = ?1, cached_handle_unique_id = ?2, updated_at = datetime('now')
         WHERE id = ?3",
    )
    .bind(handle_id)
    .bind(handle_unique_id)
    .bind(item_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn clear_cached_handle(pool: &SqlitePool, item_id: i64) -> Result<()> {
    sqlx::query(
        "UPDATE catalog_items
         SET cached_handle_id = NULL, cached_handle_unique_id = NULL, updated_at = datetime('now')
         WHERE id = ?1",
    )
    .bind(item_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Full-text search over title/path via the FTS5 mirror. Falls back to a
/// plain `LIKE` scan when the FTS5 module is unavailable in this SQLite
/// build (rare, but `casparian`'s schema module carries the same fallback
/// for its tag index).
pub async fn search(pool: &SqlitePool, scope_path: &str, query: &str, limit: i64) -> Result<Vec<CatalogChild>> {
    let like_scope = format!("{scope_path}%");
    let fts_query = sanitize_fts_query(query);

    let fts_result = sqlx::query_as::<_, CatalogChild>(
        "SELECT c.id, c.kind, c.title, c.size_bytes, c.path
         FROM catalog_items_fts f
         JOIN catalog_items c ON c.id = f.rowid
         WHERE catalog_items_fts MATCH ?1 AND c.is_deleted = 0 AND c.path LIKE ?2
         ORDER BY rank, c.kind DESC, c.title COLLATE NOCASE ASC
         LIMIT ?3",
    )
    .bind(&fts_query)
    .bind(&like_scope)
    .bind(limit)
    .fetch_all(pool)
    .await;

    match fts_result {
        Ok(rows) => Ok(rows),
        Err(_) => {
            // FTS5 unavailable: fall back to a substring scan over BOTH
            // title and path, so a term present only in the path (not the
            // title) still matches — the property spec §8 calls out as a
            // critical test case.
            let like_query = format!("%{query}%");
            let rows = sqlx::query_as::<_, CatalogChild>(
                "SELECT id, kind, title, size_bytes, path
                 FROM catalog_items
                 WHERE is_deleted = 0 AND path LIKE ?1 AND (title LIKE ?2 OR path LIKE ?2)
                 ORDER BY kind DESC, title COLLATE NOCASE ASC
                 LIMIT ?3",
            )
            .bind(&like_scope)
            .bind(&like_query)
            .bind(limit)
            .fetch_all(pool)
            .await?;
            Ok(rows)
        }
    }
}

/// Quote each token so punctuation in a user query can't be read as FTS5
/// query syntax.
fn sanitize_fts_query(query: &str) -> String {
    query
        .split_whitespace()
        .map(|tok| format!("\"{}\"", tok.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" ")
}
