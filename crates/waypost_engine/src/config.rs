//! Engine configuration, covering every item spec.md §6 "Configuration"
//! enumerates. Grounded on `casparian_sentinel`'s/`casparian`'s
//! `clap::Parser` + `#[arg(env = ...)]` pattern (`casparian_sentinel/src/main.rs::Args`,
//! `casparian/src/cli`), and on the original's `pydantic_settings.BaseSettings`
//! field list (`settings.py`) for which knobs exist — ported to CLI+env
//! flags rather than a config file, matching the teacher's own style.
//!
//! This struct derives `clap::Args` rather than `Parser` so the top-level
//! `waypost` binary can flatten it into its own subcommand.

use std::time::Duration;

use clap::Args;

#[derive(Args, Debug, Clone)]
pub struct EngineConfig {
    /// Telegram bot token.
    #[arg(long, env = "WAYPOST_BOT_TOKEN")]
    pub bot_token: String,

    /// External user ids (Telegram user ids) treated as admins.
    #[arg(long, env = "WAYPOST_ADMIN_USER_IDS", value_delimiter = ',')]
    pub admin_user_ids: Vec<i64>,

    /// Chat ids admin notifications (terminal failures, warnings) fan out to.
    #[arg(long, env = "WAYPOST_ADMIN_NOTIFY_CHAT_IDS", value_delimiter = ',')]
    pub admin_notify_chat_ids: Vec<i64>,

    /// `remote` (Yandex.Disk) or `local` (filesystem) storage backend.
    #[arg(long, env = "WAYPOST_STORAGE_MODE", default_value = "remote")]
    pub storage_mode: StorageMode,

    /// OAuth token for the remote storage backend.
    #[arg(long, env = "WAYPOST_YANDEX_OAUTH_TOKEN")]
    pub remote_oauth_token: Option<String>,

    /// Root path on the remote backend to synchronize from.
    #[arg(long, env = "WAYPOST_REMOTE_BASE_PATH", default_value = "/")]
    pub remote_base_path: String,

    /// Root directory for the local storage backend.
    #[arg(long, env = "WAYPOST_LOCAL_ROOT")]
    pub local_root: Option<std::path::PathBuf>,

    /// SQLite database path (or `:memory:`).
    #[arg(long, env = "WAYPOST_STORE_PATH", default_value = "waypost.db")]
    pub store_path: String,

    /// Redis connection url backing the job queue.
    #[arg(long, env = "WAYPOST_QUEUE_URL", default_value = "redis://127.0.0.1:6379")]
    pub queue_url: String,

    /// Master switch for access-control enforcement.
    #[arg(long, env = "WAYPOST_ACCESS_CONTROL_ENABLED", default_value_t = true)]
    pub access_control_enabled: bool,

    /// Default TTL, in days, granted by an admin activation.
    #[arg(long, env = "WAYPOST_DEFAULT_TTL_DAYS", default_value_t = 30)]
    pub default_ttl_days: i64,

    /// How long before expiry a user is warned, in seconds.
    #[arg(long, env = "WAYPOST_WARN_BEFORE_SEC", default_value_t = 24 * 3600)]
    pub warn_before_sec: i64,

    /// How often the expiry/warning sweep runs, in seconds.
    #[arg(long, env = "WAYPOST_WARN_CHECK_INTERVAL_SEC", default_value_t = 300)]
    pub warn_check_interval_sec: u64,

    /// Page size for catalog children listings.
    #[arg(long, env = "WAYPOST_CATALOG_PAGE_SIZE", default_value_t = 50)]
    pub catalog_page_size: i64,

    /// Seconds between periodic catalog syncs; 0 disables the scheduler.
    #[arg(long, env = "WAYPOST_CATALOG_SYNC_INTERVAL_SEC", default_value_t = 3600)]
    pub catalog_sync_interval_sec: u64,

    /// Node budget for a single catalog sync pass.
    #[arg(long, env = "WAYPOST_CATALOG_SYNC_MAX_NODES", default_value_t = waypost_catalog::DEFAULT_NODE_BUDGET)]
    pub catalog_sync_max_nodes: usize,

    /// Attempt budget for the job retry policy.
    #[arg(long, env = "WAYPOST_NET_RETRY_ATTEMPTS", default_value_t = crate::retry::DEFAULT_MAX_ATTEMPTS)]
    pub net_retry_attempts: i64,

    /// Ceiling, in seconds, on a flood-control retry-after wait.
    #[arg(long, env = "WAYPOST_NET_RETRY_MAX_SEC", default_value_t = 120)]
    pub net_retry_max_sec: u64,

    /// Blocking timeout, in seconds, for each queue pop.
    #[arg(long, env = "WAYPOST_QUEUE_POLL_TIMEOUT_SEC", default_value_t = 5.0)]
    pub queue_poll_timeout_sec: f64,

    /// Tracing filter (e.g. `info`, `waypost_engine=debug`).
    #[arg(long, env = "WAYPOST_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl EngineConfig {
    pub fn warn_before(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.warn_before_sec)
    }

    pub fn warn_check_interval(&self) -> Duration {
        Duration::from_secs(self.warn_check_interval_sec)
    }

    pub fn catalog_sync_interval(&self) -> Duration {
        Duration::from_secs(self.catalog_sync_interval_sec)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StorageMode {
    Remote,
    Local,
}
