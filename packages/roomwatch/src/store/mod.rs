//! Persistence for invocations and scrape attempts.
//!
//! One invocation row is created per orchestrator run; each monitor-loop
//! iteration appends an attempt row referencing it. Rows carry a
//! denormalized copy of the outcome for audit. Persistence is best-effort:
//! failures log and the pipeline keeps going.

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use crate::config::RunConfig;
use crate::scrape::ScrapeOutcome;

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// Reference to a persisted invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvocationHandle {
    pub id: i64,
    pub uuid: Uuid,
}

/// Reference to a persisted scrape attempt, carried on the outcome so the
/// result processor can mark it processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptHandle {
    pub id: i64,
    pub invocation_id: i64,
}

/// Storage operations the pipeline needs. Implementations must keep the
/// `processed` flag monotonic: false to true, at most once, never back.
#[async_trait]
pub trait MonitorStore: Send + Sync {
    /// Record run-wide configuration once per orchestrator run.
    async fn create_invocation(&self, config: &RunConfig) -> Result<InvocationHandle>;

    /// Append one attempt row under the invocation.
    async fn record_attempt(
        &self,
        invocation: &InvocationHandle,
        outcome: &ScrapeOutcome,
    ) -> Result<AttemptHandle>;

    /// Transition the attempt's `processed` flag false -> true.
    async fn mark_processed(&self, attempt: &AttemptHandle) -> Result<()>;
}
