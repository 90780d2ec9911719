//! Connection pool setup: pragmas, pool sizing, migration bootstrap.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;

use crate::error::Result;
use crate::migrations::ensure_schema;

/// Pool configuration. `path` may be a filesystem path or `:memory:`.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub path: String,
    pub max_connections: u32,
}

impl DbConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            max_connections: 8,
        }
    }
}

/// Open a pool against `config`, apply pragmas, and bring the schema up to
/// the current target version.
pub async fn connect(config: &DbConfig) -> Result<SqlitePool> {
    let connect_opts = if config.path == ":memory:" {
        SqliteConnectOptions::from_str("sqlite::memory:")?
    } else {
        SqliteConnectOptions::from_str(&format!("sqlite://{}", config.path))?
            .create_if_missing(true)
    }
    .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
    .synchronous(SqliteSynchronous::Normal)
    .busy_timeout(Duration::from_secs(10))
    .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(connect_opts)
        .await?;

    ensure_schema(&pool).await?;

    Ok(pool)
}
