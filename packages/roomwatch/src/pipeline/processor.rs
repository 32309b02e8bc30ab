//! The single result-processor task.
//!
//! Drains the outcome queue in arrival order and reacts: notify on
//! availability, mark persisted records processed. Gateway and store
//! failures are logged and swallowed so one bad delivery never blocks
//! outcomes from other adapters.

use std::sync::Arc;

use tracing::{debug, error, warn};

use super::{OutcomeMessage, OutcomeReceiver};
use crate::notify::NotificationGateway;
use crate::scrape::ScrapeOutcome;
use crate::store::MonitorStore;

/// Counters the processor hands back when it drains cleanly.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorReport {
    pub received: usize,
    pub notified: usize,
    pub notify_failures: usize,
}

/// Consume the queue until the end-of-stream sentinel (or until every
/// producer hung up). Owns the gateway for its lifetime and releases it on
/// every ordinary exit path.
pub(crate) async fn process_results(
    mut outcomes: OutcomeReceiver,
    gateway: Arc<dyn NotificationGateway>,
    store: Option<Arc<dyn MonitorStore>>,
) -> ProcessorReport {
    let mut report = ProcessorReport::default();

    while let Some(message) = outcomes.recv().await {
        let outcome = match message {
            OutcomeMessage::Outcome(outcome) => outcome,
            OutcomeMessage::EndOfStream => {
                debug!("end of stream; result processor draining complete");
                break;
            }
        };
        report.received += 1;

        if outcome.errored {
            // Nothing to notify; the record is still settled.
            debug!(
                "{}:rooms errored attempt, skipping notification",
                outcome.adapter_name
            );
            mark_processed(&store, &outcome).await;
            continue;
        }

        if outcome.available {
            if outcome.needs_post_processing {
                debug!(
                    "{}:rooms room-type and price extraction still pending",
                    outcome.adapter_name
                );
            }
            match gateway.notify(&outcome, None).await {
                Ok(()) => {
                    report.notified += 1;
                    mark_processed(&store, &outcome).await;
                }
                Err(e) => {
                    // Isolation contract: a gateway failure must not take
                    // down the processor. The record stays unprocessed so
                    // the attempt is visible as undelivered.
                    report.notify_failures += 1;
                    error!(
                        adapter = outcome.adapter_name,
                        error = %e,
                        "notification failed"
                    );
                }
            }
        } else {
            mark_processed(&store, &outcome).await;
        }
    }

    gateway.close().await;
    report
}

async fn mark_processed(store: &Option<Arc<dyn MonitorStore>>, outcome: &ScrapeOutcome) {
    let (Some(store), Some(attempt)) = (store.as_ref(), outcome.attempt.as_ref()) else {
        return;
    };
    if let Err(e) = store.mark_processed(attempt).await {
        warn!(
            adapter = outcome.adapter_name,
            attempt = attempt.id,
            error = %e,
            "could not mark attempt processed"
        );
    }
}
