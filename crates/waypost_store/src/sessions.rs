//! Short-lived callback tokens backing the search and admin inline UIs.
//!
//! Messenger callback-data fields are small, so a full query/scope is
//! stored server-side behind a short random token instead of being
//! round-tripped through button payloads.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::error::Result;
use crate::types::{AdminSession, SearchSession};

fn new_token() -> String {
    Uuid::new_v4().simple().to_string()
}

pub async fn create_search_session(pool: &SqlitePool, user_id: i64, scope_path: &str, query: &str) -> Result<String> {
    let token = new_token();
    sqlx::query("INSERT INTO search_sessions (token, user_id, scope_path, query) VALUES (?1, ?2, ?3, ?4)")
        .bind(&token)
        .bind(user_id)
        .bind(scope_path)
        .bind(query)
        .execute(pool)
        .await?;
    Ok(token)
}

pub async fn find_search_session(pool: &SqlitePool, token: &str) -> Result<Option<SearchSession>> {
    let row = sqlx::query_as::<_, SearchSession>(
        "SELECT token, created_at, user_id, scope_path, query FROM search_sessions WHERE token = ?1",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

pub async fn create_admin_session(pool: &SqlitePool, user_id: i64, query: Option<&str>) -> Result<String> {
    let token = new_token();
    sqlx::query("INSERT INTO admin_sessions (token, user_id, query) VALUES (?1, ?2, ?3)")
        .bind(&token)
        .bind(user_id)
        .bind(query)
        .execute(pool)
        .await?;
    Ok(token)
}

pub async fn find_admin_session(pool: &SqlitePool, token: &str) -> Result<Option<AdminSession>> {
    let row = sqlx::query_as::<_, AdminSession>(
        "SELECT token, created_at, user_id, query FROM admin_sessions WHERE token = ?1",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Delete session rows older than `older_than`, of either kind. Intended
/// to be run alongside the access-control warn sweep.
pub async fn purge_expired(pool: &SqlitePool, older_than: DateTime<Utc>) -> Result<u64> {
    let a = sqlx::query("DELETE FROM search_sessions WHERE created_at < ?1")
        .bind(older_than)
        .execute(pool)
        .await?;
    let b = sqlx::query("DELETE FROM admin_sessions WHERE created_at < ?1")
        .bind(older_than)
        .execute(pool)
        .await?;
    Ok(a.rows_affected() + b.rows_affected())
}
