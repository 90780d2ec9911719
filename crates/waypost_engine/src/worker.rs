//! The single job loop: `pop_blocking`, dispatch by kind. Loop shape
//! (poll-with-timeout, log-and-continue on transient pop errors) grounded
//! on `casparian_sentinel::Sentinel::run_with_shutdown_inner` and
//! `casparian_worker::Worker::run`'s "receive with timeout, continue on
//! none, handle on some" pattern — adapted from a ZMQ recv timeout to a
//! Redis `BLPOP` timeout.

use std::sync::Arc;

use tracing::{debug, error, warn};
use waypost_store::jobs;

use crate::dispatch::Dispatcher;
use crate::error::Result;
use crate::job_source::JobSource;

pub struct Worker {
    pool: sqlx::SqlitePool,
    queue: Arc<dyn JobSource>,
    dispatcher: Dispatcher,
    poll_timeout_secs: f64,
}

impl Worker {
    pub fn new(pool: sqlx::SqlitePool, queue: Arc<dyn JobSource>, dispatcher: Dispatcher, poll_timeout_secs: f64) -> Self {
        Self {
            pool,
            queue,
            dispatcher,
            poll_timeout_secs,
        }
    }

    /// Runs forever. Intended to be the sole task driving job state
    /// transitions in the process (spec §5: "never interleaves with
    /// another job pickup").
    pub async fn run(&self) -> Result<()> {
        loop {
            match self.queue.pop_blocking(self.poll_timeout_secs).await {
                Ok(Some(job_id)) => {
                    if let Err(e) = self.handle_popped(job_id).await {
                        error!(job_id, error = %e, "job processing failed unexpectedly");
                    }
                }
                Ok(None) => continue,
                Err(e) => {
                    error!(error = %e, "queue pop failed");
                }
            }
        }
    }

    /// Processes exactly one popped id to completion before the next pop,
    /// per spec §5's no-interleaving guarantee.
    async fn handle_popped(&self, job_id: i64) -> Result<()> {
        let job = match jobs::find_by_id(&self.pool, job_id).await {
            Ok(job) => job,
            Err(e) => {
                warn!(job_id, error = %e, "popped job id has no row, skipping");
                return Ok(());
            }
        };

        if job.state().is_terminal() {
            debug!(job_id, state = ?job.state(), "popped job already terminal, skipping");
            return Ok(());
        }

        let claimed = match jobs::claim(&self.pool, job_id).await {
            Ok(job) => job,
            Err(e) => {
                debug!(job_id, error = %e, "claim lost a race, skipping");
                return Ok(());
            }
        };

        self.dispatcher.dispatch(claimed).await
    }
}
