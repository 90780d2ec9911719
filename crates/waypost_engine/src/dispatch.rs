//! Per-job dispatch: runs the right pipeline for a claimed job, then
//! arbitrates retry vs terminal, writes the audit row, and fires terminal
//! notifications. This is the "job engine is the sole arbiter" boundary
//! spec §7 describes — `waypost_pipeline`/`waypost_catalog` only return
//! classified errors, they never touch job state or the audit table.
//!
//! Grounded on the original's `worker/main.py::process_one` for the
//! overall shape (claim already happened by the time this runs; success
//! path marks succeeded; failure path bumps attempt and either requeues
//! or marks failed) and on spec.md §4.8's retry policy matrix.

use std::sync::Arc;

use tokio::time::sleep;
use tracing::{info, warn};
use waypost_messenger::MessengerDriver;
use waypost_storage::StorageDriver;
use waypost_store::types::{AuditResult, Job, JobKind};
use waypost_store::{audit, jobs};

use crate::error::{Classify, Result};
use crate::job_source::JobSource;
use crate::notify;
use crate::retry::{self, RetryDecision};

pub struct DispatcherConfig {
    pub max_attempts: i64,
    pub sync_root: String,
    pub sync_budget: usize,
    pub admin_chat_ids: Vec<i64>,
}

/// Wires the components a claimed job needs: the store, the two
/// pipelines it can run, and the means to requeue or notify.
pub struct Dispatcher {
    pool: sqlx::SqlitePool,
    queue: Arc<dyn JobSource>,
    storage: Arc<dyn StorageDriver>,
    messenger: Arc<dyn MessengerDriver>,
    config: DispatcherConfig,
}

impl Dispatcher {
    pub fn new(
        pool: sqlx::SqlitePool,
        queue: Arc<dyn JobSource>,
        storage: Arc<dyn StorageDriver>,
        messenger: Arc<dyn MessengerDriver>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            pool,
            queue,
            storage,
            messenger,
            config,
        }
    }

    /// Run a freshly-claimed job to one of: succeeded, requeued (retry),
    /// or failed (terminal, with notification fan-out).
    pub async fn dispatch(&self, job: Job) -> Result<()> {
        match job.kind() {
            JobKind::Download => self.run_download(job).await,
            JobKind::SyncCatalog => self.run_sync(job).await,
        }
    }

    async fn run_download(&self, job: Job) -> Result<()> {
        let outcome = waypost_pipeline::deliver(&self.pool, self.storage.as_ref(), self.messenger.as_ref(), &job).await;

        match outcome {
            Ok(outcome) => {
                jobs::mark_succeeded(&self.pool, job.id).await?;
                audit::record(
                    &self.pool,
                    job.id,
                    job.chat_id,
                    job.user_id,
                    job.item_id,
                    AuditResult::Succeeded,
                    Some(outcome.mode),
                    outcome.bytes,
                    None,
                )
                .await?;
                info!(job_id = job.id, attempt = job.attempt, mode = ?outcome.mode, "download job succeeded");
                Ok(())
            }
            Err(err) => {
                let class = err.classify();
                match retry::decide(class, job.attempt, self.config.max_attempts) {
                    RetryDecision::RetryNow => {
                        self.requeue(&job, &err.to_string()).await?;
                        Ok(())
                    }
                    RetryDecision::RetryAfter(delay) => {
                        sleep(delay).await;
                        self.requeue(&job, &err.to_string()).await?;
                        Ok(())
                    }
                    RetryDecision::Terminal => {
                        let message = err.to_string();
                        jobs::mark_failed(&self.pool, job.id, &message).await?;
                        audit::record(
                            &self.pool,
                            job.id,
                            job.chat_id,
                            job.user_id,
                            job.item_id,
                            AuditResult::Failed,
                            None,
                            None,
                            Some(&message),
                        )
                        .await?;
                        warn!(job_id = job.id, attempt = job.attempt, error = %message, "download job failed terminally");
                        notify::download_failed(self.messenger.as_ref(), &job, &message, &self.config.admin_chat_ids).await;
                        Ok(())
                    }
                }
            }
        }
    }

    async fn run_sync(&self, job: Job) -> Result<()> {
        let outcome =
            waypost_catalog::sync_catalog(&self.pool, self.storage.as_ref(), &self.config.sync_root, self.config.sync_budget).await;

        match outcome {
            Ok(outcome) => {
                jobs::mark_succeeded(&self.pool, job.id).await?;
                info!(
                    job_id = job.id,
                    observed = outcome.observed,
                    deleted = outcome.deleted,
                    truncated = outcome.truncated,
                    "sync_catalog job succeeded"
                );
                Ok(())
            }
            Err(err) => {
                let class = err.classify();
                match retry::decide(class, job.attempt, self.config.max_attempts) {
                    RetryDecision::RetryNow => {
                        self.requeue(&job, &err.to_string()).await?;
                        Ok(())
                    }
                    RetryDecision::RetryAfter(delay) => {
                        sleep(delay).await;
                        self.requeue(&job, &err.to_string()).await?;
                        Ok(())
                    }
                    RetryDecision::Terminal => {
                        let message = err.to_string();
                        jobs::mark_failed(&self.pool, job.id, &message).await?;
                        warn!(job_id = job.id, attempt = job.attempt, error = %message, "sync_catalog job failed terminally");
                        notify::sync_failed(self.messenger.as_ref(), &job, &message, &self.config.admin_chat_ids).await;
                        Ok(())
                    }
                }
            }
        }
    }

    async fn requeue(&self, job: &Job, error: &str) -> Result<()> {
        jobs::requeue(&self.pool, job.id, error).await?;
        self.queue.push(job.id).await?;
        warn!(job_id = job.id, attempt = job.attempt, error, "job requeued for retry");
        Ok(())
    }
}
