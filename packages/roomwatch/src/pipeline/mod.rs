//! The concurrent monitoring pipeline.
//!
//! One monitor-loop task per scraper produces [`OutcomeMessage`]s onto a
//! shared FIFO queue; a single result-processor task consumes them and
//! reacts (notify, persist). The orchestrator owns task lifecycles and
//! shutdown. The queue is the only structure shared across tasks.

use tokio::sync::mpsc;

use crate::scrape::ScrapeOutcome;

pub mod monitor;
pub mod orchestrator;
pub mod processor;

pub use monitor::{MonitorSettings, StoreContext, PACING_FLOOR};
pub use orchestrator::Orchestrator;
pub use processor::ProcessorReport;

/// Message carried on the outcome queue.
#[derive(Debug)]
pub enum OutcomeMessage {
    Outcome(ScrapeOutcome),
    /// Pushed by the orchestrator once every monitor loop has finished;
    /// tells the processor to drain and stop.
    EndOfStream,
}

pub type OutcomeSender = mpsc::UnboundedSender<OutcomeMessage>;
pub type OutcomeReceiver = mpsc::UnboundedReceiver<OutcomeMessage>;

/// Terminal status of one monitor loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopStatus {
    /// Ran its full attempt budget.
    Completed { iterations: u32 },
    /// Terminated early with a fatal error (markup contradiction or
    /// connectivity loss).
    Failed { error: String },
    /// Stopped at an iteration boundary after a cancellation request.
    Cancelled { iterations: u32 },
}

impl LoopStatus {
    pub fn is_failure(&self) -> bool {
        matches!(self, LoopStatus::Failed { .. })
    }
}

/// Everything the orchestrator knows once a run has ended.
#[derive(Debug)]
pub struct AggregateResult {
    /// Per-adapter terminal status, in completion order.
    pub loops: Vec<(String, LoopStatus)>,
    pub connectivity_lost: bool,
    /// False when the processor had to be cancelled at the shutdown
    /// timeout; pending notifications may have been lost.
    pub processor_drained: bool,
    /// Present only when the processor drained cleanly.
    pub report: Option<ProcessorReport>,
}

impl AggregateResult {
    /// A run succeeds unless connectivity died or some loop failed hard.
    pub fn success(&self) -> bool {
        !self.connectivity_lost && !self.loops.iter().any(|(_, s)| s.is_failure())
    }

    pub fn status_of(&self, adapter: &str) -> Option<&LoopStatus> {
        self.loops
            .iter()
            .find(|(name, _)| name == adapter)
            .map(|(_, status)| status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_requires_no_failed_loops() {
        let result = AggregateResult {
            loops: vec![
                ("hyatt".into(), LoopStatus::Completed { iterations: 2 }),
                ("hilton".into(), LoopStatus::Failed { error: "markup".into() }),
            ],
            connectivity_lost: false,
            processor_drained: true,
            report: Some(ProcessorReport::default()),
        };
        assert!(!result.success());
    }

    #[test]
    fn cancelled_loops_alone_do_not_fail_the_run() {
        let result = AggregateResult {
            loops: vec![("hyatt".into(), LoopStatus::Cancelled { iterations: 1 })],
            connectivity_lost: false,
            processor_drained: true,
            report: Some(ProcessorReport::default()),
        };
        assert!(result.success());
    }

    #[test]
    fn connectivity_loss_fails_the_run() {
        let result = AggregateResult {
            loops: vec![("hyatt".into(), LoopStatus::Completed { iterations: 2 })],
            connectivity_lost: true,
            processor_drained: true,
            report: None,
        };
        assert!(!result.success());
    }
}
