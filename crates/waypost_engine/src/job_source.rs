//! Abstraction over the durable queue so the dispatch/worker loop can be
//! unit-tested without a live Redis instance. `waypost_queue::JobQueue`
//! implements this directly; tests use an in-memory `VecDeque` adapter.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use waypost_queue::JobQueue;

use crate::error::Result;

#[async_trait]
pub trait JobSource: Send + Sync {
    async fn push(&self, job_id: i64) -> Result<()>;
    async fn pop_blocking(&self, timeout_secs: f64) -> Result<Option<i64>>;
}

#[async_trait]
impl JobSource for JobQueue {
    async fn push(&self, job_id: i64) -> Result<()> {
        Ok(JobQueue::push(self, job_id).await?)
    }

    async fn pop_blocking(&self, timeout_secs: f64) -> Result<Option<i64>> {
        Ok(JobQueue::pop_blocking(self, timeout_secs).await?)
    }
}

/// In-memory FIFO used by tests in place of a live Redis-backed queue.
pub struct MemoryQueue {
    items: Mutex<VecDeque<i64>>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(VecDeque::new()),
        }
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobSource for MemoryQueue {
    async fn push(&self, job_id: i64) -> Result<()> {
        self.items.lock().unwrap().push_back(job_id);
        Ok(())
    }

    async fn pop_blocking(&self, _timeout_secs: f64) -> Result<Option<i64>> {
        Ok(self.items.lock().unwrap().pop_front())
    }
}
