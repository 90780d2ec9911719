//! User records and access-control state transitions.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::{Result, StoreError};
use crate::types::{User, UserStatus};

/// Fetch a user by the messenger's external id, creating a `guest` row on
/// first contact.
pub async fn get_or_create(pool: &SqlitePool, external_user_id: i64) -> Result<User> {
    if let Some(user) = find_by_external_id(pool, external_user_id).await? {
        return Ok(user);
    }

    sqlx::query("INSERT INTO users (external_user_id, status) VALUES (?1, 'guest')")
        .bind(external_user_id)
        .execute(pool)
        .await?;

    find_by_external_id(pool, external_user_id)
        .await?
        .ok_or_else(|| StoreError::invalid_state("user vanished immediately after insert"))
}

pub async fn find_by_external_id(pool: &SqlitePool, external_user_id: i64) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, external_user_id, created_at, status, note, expires_at, warned_at, updated_at
         FROM users WHERE external_user_id = ?1",
    )
    .bind(external_user_id)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<User> {
    sqlx::query_as::<_, User>(
        "SELECT id, external_user_id, created_at, status, note, expires_at, warned_at, updated_at
         FROM users WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| StoreError::not_found(format!("user {id}")))
}

/// Set status, clearing `warned_at` so a future re-expiry warns again.
pub async fn set_status(pool: &SqlitePool, id: i64, status: UserStatus) -> Result<()> {
    sqlx::query(
        "UPDATE users SET status = ?1, warned_at = NULL, updated_at = datetime('now') WHERE id = ?2",
    )
    .bind(status.as_str())
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn set_expiry(pool: &SqlitePool, id: i64, expires_at: Option<DateTime<Utc>>) -> Result<()> {
    sqlx::query("UPDATE users SET expires_at = ?1, updated_at = datetime('now') WHERE id = ?2")
        .bind(expires_at)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_note(pool: &SqlitePool, id: i64, note: Option<&str>) -> Result<()> {
    sqlx::query("UPDATE users SET note = ?1, updated_at = datetime('now') WHERE id = ?2")
        .bind(note)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn mark_warned(pool: &SqlitePool, id: i64, at: DateTime<Utc>) -> Result<()> {
    sqlx::query("UPDATE users SET warned_at = ?1 WHERE id = ?2")
        .bind(at)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Users whose `status = 'active'`, have an `expires_at` in the past, and
/// have not yet transitioned to `expired` in this pass.
pub async fn find_newly_expired(pool: &SqlitePool, now: DateTime<Utc>) -> Result<Vec<User>> {
    let users = sqlx::query_as::<_, User>(
        "SELECT id, external_user_id, created_at, status, note, expires_at, warned_at, updated_at
         FROM users
         WHERE status = 'active' AND expires_at IS NOT NULL AND expires_at <= ?1",
    )
    .bind(now)
    .fetch_all(pool)
    .await?;
    Ok(users)
}

/// Active users whose access expires within `window` of `now` and who have
/// not yet been warned for this grant. `warned_at` is cleared whenever
/// `set_status`/extend touches the grant, so a fresh activation or
/// extension is eligible again without an extra clause here.
pub async fn find_due_for_warning(
    pool: &SqlitePool,
    now: DateTime<Utc>,
    window: chrono::Duration,
) -> Result<Vec<User>> {
    let horizon = now + window;
    let users = sqlx::query_as::<_, User>(
        "SELECT id, external_user_id, created_at, status, note, expires_at, warned_at, updated_at
         FROM users
         WHERE status = 'active'
           AND expires_at IS NOT NULL
           AND expires_at > ?1 AND expires_at <= ?2
           AND warned_at IS NULL",
    )
    .bind(now)
    .bind(horizon)
    .fetch_all(pool)
    .await?;
    Ok(users)
}

/// Admin listing: most recently updated first, optionally filtered by a
/// case-insensitive substring match against note or external id.
pub async fn list(pool: &SqlitePool, query: Option<&str>, limit: i64, offset: i64) -> Result<Vec<User>> {
    let pattern = query.map(|q| format!("%{q}%"));
    let users = sqlx::query_as::<_, User>(
        "SELECT id, external_user_id, created_at, status, note, expires_at, warned_at, updated_at
         FROM users
         WHERE ?1 IS NULL OR note LIKE ?1 OR CAST(external_user_id AS TEXT) LIKE ?1
         ORDER BY updated_at DESC
         LIMIT ?2 OFFSET ?3",
    )
    .bind(pattern)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(users)
}

/// Admin search: a purely-numeric query matches `external_user_id` exactly
/// or as a prefix; anything else does a bounded substring scan over
/// `status` and `note`. Returns `(rows, has_more)` using a limit+1 probe.
pub async fn search(pool: &SqlitePool, query: &str, limit: i64, offset: i64) -> Result<(Vec<User>, bool)> {
    let query = query.trim();
    if query.is_empty() {
        return Ok((Vec::new(), false));
    }
    let limit = limit.max(1);
    let limit_plus = limit + 1;

    let mut rows = if let Ok(exact) = query.parse::<i64>() {
        let prefix = format!("{query}%");
        sqlx::query_as::<_, User>(
            "SELECT id, external_user_id, created_at, status, note, expires_at, warned_at, updated_at
             FROM users
             WHERE external_user_id = ?1 OR CAST(external_user_id AS TEXT) LIKE ?2
             ORDER BY updated_at DESC
             LIMIT ?3 OFFSET ?4",
        )
        .bind(exact)
        .bind(prefix)
        .bind(limit_plus)
        .bind(offset)
        .fetch_all(pool)
        .await?
    } else {
        let pattern = format!("%{query}%");
        sqlx::query_as::<_, User>(
            "SELECT id, external_user_id, created_at, status, note, expires_at, warned_at, updated_at
             FROM users
             WHERE status LIKE ?1 OR (note IS NOT NULL AND note LIKE ?1)
             ORDER BY updated_at DESC
             LIMIT ?2 OFFSET ?3",
        )
        .bind(pattern)
        .bind(limit_plus)
        .bind(offset)
        .fetch_all(pool)
        .await?
    };

    let has_more = rows.len() as i64 > limit;
    rows.truncate(limit as usize);
    Ok((rows, has_more))
}

/// Admin activation: grant `active` status with `expires_at = now + ttl_days`.
/// A non-positive `ttl_days` is clamped to 1, mirroring the original bot's
/// defensive floor (an admin fat-fingering "0 days" should not lock the
/// user out immediately).
pub async fn activate(pool: &SqlitePool, id: i64, ttl_days: i64, now: DateTime<Utc>) -> Result<()> {
    let ttl_days = ttl_days.max(1);
    let expires_at = now + chrono::Duration::days(ttl_days);
    set_status(pool, id, UserStatus::Active).await?;
    set_expiry(pool, id, Some(expires_at)).await?;
    Ok(())
}

/// Admin extension: push `expires_at` forward by `add_days` from whichever
/// is later, the user's current expiry or `now` — an already-expired grant
/// extends from today, not from its stale expiry date.
pub async fn extend(pool: &SqlitePool, id: i64, add_days: i64, now: DateTime<Utc>) -> Result<()> {
    let add_days = add_days.max(1);
    let user = find_by_id(pool, id).await?;
    let base = user.expires_at.map(|e| e.max(now)).unwrap_or(now);
    let expires_at = base + chrono::Duration::days(add_days);
    set_status(pool, id, UserStatus::Active).await?;
    set_expiry(pool, id, Some(expires_at)).await?;
    Ok(())
}
