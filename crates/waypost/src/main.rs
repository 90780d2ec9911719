//! Waypost launcher.
//!
//! Thin `clap::Subcommand` entrypoint that wires configuration into a
//! connected store pool, the Redis-backed queue, the configured storage
//! and messenger drivers, and hands them to `waypost_engine::run`.
//! Command shape grounded on `casparian/src/main.rs`'s `Commands` enum,
//! trimmed to the two subcommands this spec's scope needs — the chat
//! dispatch, catalog-preview, and inline-keyboard commands the original
//! binary also exposes belong to the out-of-scope chat surface.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use waypost_engine::{EngineConfig, Runtime};
use waypost_messenger::TelegramMessenger;
use waypost_queue::JobQueue;
use waypost_storage::{LocalFsStorage, StorageDriver, YandexDiskStorage};
use waypost_store::pool::{connect, DbConfig};

#[derive(Parser, Debug)]
#[command(name = "waypost", about = "Waypost job engine launcher")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the worker loop, periodic sync scheduler, and expiry sweep.
    Run {
        #[command(flatten)]
        engine: EngineConfig,

        /// Log to stderr at the configured level in addition to the
        /// rolling file sink.
        #[arg(short = 'v', long)]
        verbose: bool,
    },
    /// Apply pending schema migrations and exit.
    Migrate {
        /// SQLite database path (or `:memory:`).
        #[arg(long, env = "WAYPOST_STORE_PATH", default_value = "waypost.db")]
        store_path: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { engine, verbose } => run(engine, verbose).await,
        Commands::Migrate { store_path } => migrate(store_path).await,
    }
}

async fn run(config: EngineConfig, verbose: bool) -> Result<()> {
    waypost_logging::init_logging(waypost_logging::LogConfig {
        app_name: "waypost",
        verbose,
    })
    .context("failed to initialize logging")?;

    tracing::info!(
        storage_mode = ?config.storage_mode,
        store_path = %config.store_path,
        "starting waypost"
    );

    let pool = connect(&DbConfig::new(config.store_path.clone()))
        .await
        .context("failed to open relational store")?;

    let queue = Arc::new(
        JobQueue::connect(&config.queue_url)
            .await
            .context("failed to connect to job queue")?,
    );

    let storage: Arc<dyn StorageDriver> = match config.storage_mode {
        waypost_engine::config::StorageMode::Remote => {
            let token = config
                .remote_oauth_token
                .clone()
                .context("WAYPOST_YANDEX_OAUTH_TOKEN is required when storage mode is `remote`")?;
            Arc::new(YandexDiskStorage::new(token))
        }
        waypost_engine::config::StorageMode::Local => {
            let root = config
                .local_root
                .clone()
                .context("WAYPOST_LOCAL_ROOT is required when storage mode is `local`")?;
            Arc::new(LocalFsStorage::new(root))
        }
    };

    let messenger = Arc::new(TelegramMessenger::new(config.bot_token.clone()));

    let runtime = Runtime {
        pool,
        queue,
        storage,
        messenger,
    };

    waypost_engine::run(config, runtime).await
}

async fn migrate(store_path: String) -> Result<()> {
    waypost_logging::init_logging(waypost_logging::LogConfig {
        app_name: "waypost-migrate",
        verbose: true,
    })
    .context("failed to initialize logging")?;
    let pool = connect(&DbConfig::new(store_path.clone()))
        .await
        .with_context(|| format!("failed to migrate store at {store_path}"))?;
    let version: i64 = sqlx::query_scalar("SELECT version FROM schema_version LIMIT 1")
        .fetch_one(&pool)
        .await
        .context("failed to read schema_version after migration")?;
    tracing::info!(schema_version = version, "schema up to date");
    Ok(())
}
