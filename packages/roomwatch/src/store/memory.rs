//! In-memory store used by tests and `--nodb`-adjacent tooling.

use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use uuid::Uuid;

use super::{AttemptHandle, InvocationHandle, MonitorStore};
use crate::config::RunConfig;
use crate::scrape::ScrapeOutcome;

/// A persisted attempt, denormalized from the outcome.
#[derive(Debug, Clone)]
pub struct StoredAttempt {
    pub id: i64,
    pub invocation_id: i64,
    pub hotel: String,
    pub available: bool,
    pub errored: bool,
    pub error_detail: Option<String>,
    pub needs_post_processing: bool,
    pub processed: bool,
}

#[derive(Debug, Default)]
struct Inner {
    invocations: Vec<InvocationHandle>,
    attempts: Vec<StoredAttempt>,
    next_invocation_id: i64,
    next_attempt_id: i64,
}

/// Mutex-over-Vec store; single writer per slot, so contention is nil.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all attempts, for assertions.
    pub fn attempts(&self) -> Vec<StoredAttempt> {
        self.inner.lock().unwrap().attempts.clone()
    }

    pub fn invocation_count(&self) -> usize {
        self.inner.lock().unwrap().invocations.len()
    }
}

#[async_trait]
impl MonitorStore for MemoryStore {
    async fn create_invocation(&self, _config: &RunConfig) -> Result<InvocationHandle> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_invocation_id += 1;
        let handle = InvocationHandle {
            id: inner.next_invocation_id,
            uuid: Uuid::new_v4(),
        };
        inner.invocations.push(handle);
        Ok(handle)
    }

    async fn record_attempt(
        &self,
        invocation: &InvocationHandle,
        outcome: &ScrapeOutcome,
    ) -> Result<AttemptHandle> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_attempt_id += 1;
        let id = inner.next_attempt_id;
        inner.attempts.push(StoredAttempt {
            id,
            invocation_id: invocation.id,
            hotel: outcome.adapter_name.to_string(),
            available: outcome.available,
            errored: outcome.errored,
            error_detail: outcome.error_detail.clone(),
            needs_post_processing: outcome.needs_post_processing,
            processed: false,
        });
        Ok(AttemptHandle {
            id,
            invocation_id: invocation.id,
        })
    }

    async fn mark_processed(&self, attempt: &AttemptHandle) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let record = inner
            .attempts
            .iter_mut()
            .find(|a| a.id == attempt.id)
            .ok_or_else(|| anyhow!("unknown attempt {}", attempt.id))?;
        // false -> true only; re-marking is a no-op, never a reversal.
        record.processed = true;
        Ok(())
    }
}
