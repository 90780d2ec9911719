//! Forward-only, numbered schema migrations.
//!
//! Mirrors the original bot's `MIGRATIONS` dict: each migration is a batch
//! of DDL statements applied once, in order, inside its own commit. Every
//! statement tolerates a column/table that already exists (out-of-band
//! prior creation), so re-running `ensure_schema` against a half-migrated
//! database is safe.

use sqlx::SqlitePool;
use tracing::info;

use crate::error::{Result, StoreError};

/// Current target schema version. Bump when adding a migration.
pub const TARGET_SCHEMA_VERSION: i64 = 10;

struct Migration {
    version: i64,
    statements: &'static [&'static str],
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        statements: &[
            "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
            r#"CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                external_user_id INTEGER NOT NULL UNIQUE,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            )"#,
            r#"CREATE TABLE IF NOT EXISTS catalog_items (
                id INTEGER PRIMARY KEY,
                path TEXT NOT NULL UNIQUE,
                kind TEXT NOT NULL CHECK(kind IN ('folder','file')),
                title TEXT NOT NULL,
                storage_id TEXT,
                size_bytes INTEGER,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            )"#,
            r#"CREATE TABLE IF NOT EXISTS jobs (
                id INTEGER PRIMARY KEY,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now')),
                chat_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                item_id INTEGER NOT NULL,
                state TEXT NOT NULL CHECK(state IN ('queued','running','succeeded','failed','cancelled')),
                attempt INTEGER NOT NULL DEFAULT 0,
                last_error TEXT,
                correlation TEXT NOT NULL,
                UNIQUE(chat_id, item_id, correlation),
                FOREIGN KEY (item_id) REFERENCES catalog_items(id)
            )"#,
            "CREATE INDEX IF NOT EXISTS idx_jobs_state ON jobs(state)",
            "CREATE INDEX IF NOT EXISTS idx_catalog_path ON catalog_items(path)",
        ],
    },
    Migration {
        version: 2,
        // Cached content-handle pair, used to short-circuit re-uploads.
        statements: &[
            "ALTER TABLE catalog_items ADD COLUMN cached_handle_id TEXT",
            "ALTER TABLE catalog_items ADD COLUMN cached_handle_unique_id TEXT",
        ],
    },
    Migration {
        version: 3,
        // Parent pointers for inline tree navigation without long paths.
        statements: &[
            "ALTER TABLE catalog_items ADD COLUMN parent_path TEXT",
            "CREATE INDEX IF NOT EXISTS idx_catalog_parent_path ON catalog_items(parent_path)",
        ],
    },
    Migration {
        version: 4,
        statements: &[
            "ALTER TABLE jobs ADD COLUMN kind TEXT NOT NULL DEFAULT 'download'",
            r#"CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )"#,
            "CREATE INDEX IF NOT EXISTS idx_jobs_kind_state ON jobs(kind, state)",
        ],
    },
    Migration {
        version: 5,
        // Soft-delete + last-seen watermark for catalog sync.
        statements: &[
            "ALTER TABLE catalog_items ADD COLUMN last_seen TEXT",
            "ALTER TABLE catalog_items ADD COLUMN is_deleted INTEGER NOT NULL DEFAULT 0",
            "CREATE INDEX IF NOT EXISTS idx_catalog_deleted_parent ON catalog_items(is_deleted, parent_path)",
        ],
    },
    Migration {
        version: 6,
        // Access control: status, note, expiry, single warning stamp.
        statements: &[
            "ALTER TABLE users ADD COLUMN status TEXT NOT NULL DEFAULT 'guest'",
            "ALTER TABLE users ADD COLUMN note TEXT",
            "ALTER TABLE users ADD COLUMN expires_at TEXT",
            "ALTER TABLE users ADD COLUMN warned_at TEXT",
            "ALTER TABLE users ADD COLUMN updated_at TEXT NOT NULL DEFAULT (datetime('now'))",
            "CREATE INDEX IF NOT EXISTS idx_users_status_expires ON users(status, expires_at)",
        ],
    },
    Migration {
        version: 7,
        // Download audit trail + index support for admin rollups.
        statements: &[
            r#"CREATE TABLE IF NOT EXISTS download_audit (
                id INTEGER PRIMARY KEY,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                job_id INTEGER NOT NULL UNIQUE,
                chat_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                item_id INTEGER NOT NULL,
                result TEXT NOT NULL CHECK(result IN ('succeeded','failed')),
                mode TEXT,
                bytes INTEGER,
                error TEXT,
                FOREIGN KEY (job_id) REFERENCES jobs(id) ON DELETE CASCADE,
                FOREIGN KEY (item_id) REFERENCES catalog_items(id)
            )"#,
            "CREATE INDEX IF NOT EXISTS idx_download_audit_created ON download_audit(created_at)",
            "CREATE INDEX IF NOT EXISTS idx_download_audit_user_created ON download_audit(user_id, created_at)",
            "CREATE INDEX IF NOT EXISTS idx_download_audit_item_created ON download_audit(item_id, created_at)",
            "CREATE INDEX IF NOT EXISTS idx_jobs_kind_created ON jobs(kind, created_at)",
        ],
    },
    Migration {
        version: 8,
        // Full-text mirror over (title, path), kept current by triggers.
        statements: &[
            r#"CREATE VIRTUAL TABLE IF NOT EXISTS catalog_items_fts USING fts5(
                title, path, content='catalog_items', content_rowid='id'
            )"#,
            r#"CREATE TRIGGER IF NOT EXISTS catalog_items_fts_ai AFTER INSERT ON catalog_items BEGIN
                INSERT INTO catalog_items_fts(rowid, title, path) VALUES (new.id, new.title, new.path);
            END"#,
            r#"CREATE TRIGGER IF NOT EXISTS catalog_items_fts_ad AFTER DELETE ON catalog_items BEGIN
                INSERT INTO catalog_items_fts(catalog_items_fts, rowid, title, path) VALUES('delete', old.id, old.title, old.path);
            END"#,
            r#"CREATE TRIGGER IF NOT EXISTS catalog_items_fts_au AFTER UPDATE ON catalog_items BEGIN
                INSERT INTO catalog_items_fts(catalog_items_fts, rowid, title, path) VALUES('delete', old.id, old.title, old.path);
                INSERT INTO catalog_items_fts(rowid, title, path) VALUES (new.id, new.title, new.path);
            END"#,
            "INSERT INTO catalog_items_fts(catalog_items_fts) VALUES('rebuild')",
        ],
    },
    Migration {
        version: 9,
        // Short-lived callback tokens for search/admin UI (kept small for messenger callback-data limits).
        statements: &[
            r#"CREATE TABLE IF NOT EXISTS search_sessions (
                token TEXT PRIMARY KEY,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                user_id INTEGER NOT NULL,
                scope_path TEXT NOT NULL,
                query TEXT NOT NULL
            )"#,
            "CREATE INDEX IF NOT EXISTS idx_search_sessions_user_created ON search_sessions(user_id, created_at)",
            r#"CREATE TABLE IF NOT EXISTS admin_sessions (
                token TEXT PRIMARY KEY,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                user_id INTEGER NOT NULL,
                query TEXT
            )"#,
            "CREATE INDEX IF NOT EXISTS idx_admin_sessions_user_created ON admin_sessions(user_id, created_at)",
        ],
    },
    Migration {
        version: 10,
        // Content fingerprint observed at last sync, used to invalidate a
        // cached handle only when the backend's bytes actually changed.
        statements: &[
            "ALTER TABLE catalog_items ADD COLUMN content_fingerprint TEXT",
        ],
    },
];

async fn current_version(pool: &SqlitePool) -> Result<i64> {
    let table_exists: Option<i64> = sqlx::query_scalar(
        "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version'",
    )
    .fetch_optional(pool)
    .await?;

    if table_exists.is_none() {
        return Ok(0);
    }

    let version: Option<i64> = sqlx::query_scalar("SELECT version FROM schema_version LIMIT 1")
        .fetch_optional(pool)
        .await?;
    Ok(version.unwrap_or(0))
}

/// Apply every migration with version greater than the database's current
/// version, in order, each inside its own commit. Safe to call on every
/// startup.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    let mut current = current_version(pool).await?;

    if current == 0 {
        // First migration creates schema_version; seed the row once it exists.
        let first = &MIGRATIONS[0];
        apply(pool, first).await?;
        sqlx::query("INSERT INTO schema_version(version) SELECT ?1 WHERE NOT EXISTS (SELECT 1 FROM schema_version)")
            .bind(first.version)
            .execute(pool)
            .await
            .map_err(|e| StoreError::Migration { version: first.version, source: e })?;
        current = first.version;
    }

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        apply(pool, migration).await?;
        sqlx::query("UPDATE schema_version SET version = ?1")
            .bind(migration.version)
            .execute(pool)
            .await
            .map_err(|e| StoreError::Migration { version: migration.version, source: e })?;
        info!(version = migration.version, "applied schema migration");
    }

    Ok(())
}

async fn apply(pool: &SqlitePool, migration: &Migration) -> Result<()> {
    for stmt in migration.statements {
        sqlx::query(stmt)
            .execute(pool)
            .await
            .map_err(|e| StoreError::Migration { version: migration.version, source: e })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn fresh_database_reaches_target_version() {
        let pool = memory_pool().await;
        ensure_schema(&pool).await.unwrap();
        let v = current_version(&pool).await.unwrap();
        assert_eq!(v, TARGET_SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let pool = memory_pool().await;
        ensure_schema(&pool).await.unwrap();
        // Re-running must not raise even though every table/column exists.
        ensure_schema(&pool).await.unwrap();
        let v = current_version(&pool).await.unwrap();
        assert_eq!(v, TARGET_SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn partial_schema_completes_forward() {
        let pool = memory_pool().await;
        // Simulate a database stuck at version 3 (pre-access-control).
        for migration in MIGRATIONS.iter().take(3) {
            apply(&pool, migration).await.unwrap();
        }
        sqlx::query("INSERT INTO schema_version(version) VALUES (3)")
            .execute(&pool)
            .await
            .unwrap();

        ensure_schema(&pool).await.unwrap();
        let v = current_version(&pool).await.unwrap();
        assert_eq!(v, TARGET_SCHEMA_VERSION);

        let has_status: Option<i64> = sqlx::query_scalar(
            "SELECT 1 FROM pragma_table_info('users') WHERE name='status'",
        )
        .fetch_optional(&pool)
        .await
        .unwrap();
        assert!(has_status.is_some());
    }
}
