//! Job engine for Waypost (C8): the worker loop, retry/error
//! classification, periodic sync scheduling, and terminal-failure
//! notifications. This is the component that turns the classified errors
//! every other crate returns into concrete job-state transitions — spec
//! §7's "the job engine is the sole arbiter of retry vs terminal."

pub mod config;
pub mod dispatch;
pub mod error;
pub mod job_source;
pub mod notify;
pub mod retry;
pub mod scheduler;
pub mod worker;

pub use config::EngineConfig;
pub use dispatch::{Dispatcher, DispatcherConfig};
pub use error::{Classify, EngineError, ErrorClass, Result};
pub use job_source::{JobSource, MemoryQueue};
pub use worker::Worker;

use std::sync::Arc;

use tracing::{error, warn};
use waypost_messenger::MessengerDriver;
use waypost_storage::StorageDriver;
use waypost_store::jobs;

/// A job left in `running` for longer than this was almost certainly
/// orphaned by a crashed or killed worker process rather than being
/// genuinely in flight — the job loop never holds a job this long
/// without transitioning it. Grounded on the same "stale worker cleanup"
/// idiom `waypost_access::warn_sweep` and the scheduler already use for
/// periodic housekeeping, applied once at startup instead of on a timer.
const STUCK_JOB_THRESHOLD: chrono::Duration = chrono::Duration::minutes(15);

/// Everything `run` needs beyond `EngineConfig`: the already-connected
/// store pool and the already-constructed queue/storage/messenger
/// drivers. Assembling these from raw config (opening the sqlite pool,
/// picking a storage backend by mode, building the Telegram client) is
/// the `waypost` binary's job, not this library's — it mirrors concrete
/// backends the caller chose, and unit tests substitute fakes here.
pub struct Runtime {
    pub pool: sqlx::SqlitePool,
    pub queue: Arc<dyn JobSource>,
    pub storage: Arc<dyn StorageDriver>,
    pub messenger: Arc<dyn MessengerDriver>,
}

/// Runs the worker loop, the periodic sync scheduler (if its interval is
/// non-zero), and the access-expiry/warning sweep concurrently. Returns
/// only on a fatal error from the job loop itself — the scheduler and
/// warn-sweep tasks loop forever and log their own failures.
pub async fn run(config: EngineConfig, runtime: Runtime) -> anyhow::Result<()> {
    recover_stuck_jobs(&runtime.pool, &runtime.queue).await;

    let dispatcher = Dispatcher::new(
        runtime.pool.clone(),
        runtime.queue.clone(),
        runtime.storage.clone(),
        runtime.messenger.clone(),
        DispatcherConfig {
            max_attempts: config.net_retry_attempts,
            sync_root: config.remote_base_path.clone(),
            sync_budget: config.catalog_sync_max_nodes,
            admin_chat_ids: config.admin_notify_chat_ids.clone(),
        },
    );
    let worker = Worker::new(runtime.pool.clone(), runtime.queue.clone(), dispatcher, config.queue_poll_timeout_sec);

    let scheduler_handle = if config.catalog_sync_interval_sec > 0 {
        let pool = runtime.pool.clone();
        let queue = runtime.queue.clone();
        let interval = config.catalog_sync_interval();
        let root = config.remote_base_path.clone();
        Some(tokio::spawn(async move {
            scheduler::run(pool, queue, interval, root).await;
        }))
    } else {
        None
    };

    let warn_sweep_handle = if config.access_control_enabled {
        let pool = runtime.pool.clone();
        let messenger = runtime.messenger.clone();
        let admin_chat_ids = config.admin_notify_chat_ids.clone();
        let check_interval = config.warn_check_interval();
        let warn_before = config.warn_before();
        Some(tokio::spawn(async move {
            waypost_access::warn_sweep::run(pool, messenger, admin_chat_ids, check_interval, warn_before).await;
        }))
    } else {
        None
    };

    let result = worker.run().await;

    if let Some(handle) = scheduler_handle {
        handle.abort();
    }
    if let Some(handle) = warn_sweep_handle {
        handle.abort();
    }

    Ok(result?)
}

/// Requeue jobs a previous process instance left stranded in `running`.
/// Re-pushing onto the queue is safe because the worker tolerates
/// redundant deliveries (spec §2/C2: "exactly-once delivery is NOT
/// required") and `jobs::claim` only succeeds from `queued`.
async fn recover_stuck_jobs(pool: &sqlx::SqlitePool, queue: &Arc<dyn JobSource>) {
    let cutoff = chrono::Utc::now() - STUCK_JOB_THRESHOLD;
    let stuck = match jobs::find_stuck_running(pool, cutoff).await {
        Ok(jobs) => jobs,
        Err(e) => {
            error!(error = %e, "failed to query stuck running jobs at startup");
            return;
        }
    };

    for job in stuck {
        if let Err(e) = jobs::requeue(pool, job.id, "recovered: orphaned in running state at startup").await {
            error!(job_id = job.id, error = %e, "failed to requeue stuck job");
            continue;
        }
        if let Err(e) = queue.push(job.id).await {
            error!(job_id = job.id, error = %e, "failed to re-push recovered job onto queue");
            continue;
        }
        warn!(job_id = job.id, "recovered stuck running job at startup");
    }
}
