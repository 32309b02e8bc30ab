//! Orchestrator: owns the lifecycle of every task in one monitoring run.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::monitor::{monitor_rooms, MonitorSettings, StoreContext};
use super::processor::process_results;
use super::{AggregateResult, LoopStatus, OutcomeMessage};
use crate::config::RunConfig;
use crate::notify::NotificationGateway;
use crate::scrape::HotelScraper;
use crate::store::MonitorStore;

const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs the pipeline: N monitor loops, one result processor, one shared
/// queue. All context is passed in explicitly; two orchestrators can run
/// side by side without stepping on each other.
pub struct Orchestrator {
    scrapers: Vec<Arc<dyn HotelScraper>>,
    gateway: Arc<dyn NotificationGateway>,
    store: Option<Arc<dyn MonitorStore>>,
    settings: MonitorSettings,
    config: RunConfig,
    shutdown_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        scrapers: Vec<Arc<dyn HotelScraper>>,
        gateway: Arc<dyn NotificationGateway>,
        config: RunConfig,
    ) -> Self {
        Self {
            scrapers,
            gateway,
            store: None,
            settings: MonitorSettings::from(&config),
            config,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn MonitorStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Run the full pipeline to completion and aggregate the per-adapter
    /// terminal statuses.
    pub async fn run_monitoring(&self) -> Result<AggregateResult> {
        debug!("spawning room availability monitors");

        // Persistence is best-effort from the very start: if the
        // invocation row cannot be created, the run continues without
        // durability rather than aborting.
        let store_ctx = match &self.store {
            Some(store) => match store.create_invocation(&self.config).await {
                Ok(invocation) => Some(StoreContext {
                    store: store.clone(),
                    invocation,
                }),
                Err(e) => {
                    warn!(error = %e, "invocation not persisted; continuing without durability");
                    None
                }
            },
            None => None,
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let mut monitors = JoinSet::new();
        for scraper in &self.scrapers {
            monitors.spawn(monitor_rooms(
                scraper.clone(),
                self.settings.clone(),
                store_ctx.clone(),
                tx.clone(),
                cancel.clone(),
            ));
        }

        let mut processor = tokio::spawn(process_results(
            rx,
            self.gateway.clone(),
            self.store.clone(),
        ));

        let mut loops = Vec::with_capacity(self.scrapers.len());
        let mut connectivity_lost = false;

        while let Some(joined) = monitors.join_next().await {
            match joined {
                Ok((name, Ok(result))) => {
                    let status = if result.cancelled {
                        LoopStatus::Cancelled {
                            iterations: result.iterations,
                        }
                    } else {
                        LoopStatus::Completed {
                            iterations: result.iterations,
                        }
                    };
                    loops.push((name.to_string(), status));
                }
                Ok((name, Err(e))) => {
                    if e.is_fatal_to_run() {
                        connectivity_lost = true;
                        error!(
                            adapter = name,
                            error = %e,
                            "connectivity lost; cancelling all monitors"
                        );
                        cancel.cancel();
                    } else {
                        error!(adapter = name, error = %e, "monitor terminated early");
                    }
                    loops.push((
                        name.to_string(),
                        LoopStatus::Failed {
                            error: e.to_string(),
                        },
                    ));
                }
                Err(join_err) => {
                    error!(error = %join_err, "monitor task panicked");
                    loops.push((
                        "<panicked>".to_string(),
                        LoopStatus::Failed {
                            error: join_err.to_string(),
                        },
                    ));
                }
            }
        }

        // Every producer is done; tell the processor to drain and stop.
        let _ = tx.send(OutcomeMessage::EndOfStream);
        drop(tx);

        let (report, drained) =
            match tokio::time::timeout(self.shutdown_timeout, &mut processor).await {
                Ok(Ok(report)) => {
                    info!(
                        received = report.received,
                        notified = report.notified,
                        "result processor drained"
                    );
                    (Some(report), true)
                }
                Ok(Err(join_err)) => {
                    error!(error = %join_err, "result processor panicked");
                    (None, false)
                }
                Err(_) => {
                    processor.abort();
                    warn!(
                        timeout = ?self.shutdown_timeout,
                        "result processor did not drain in time; pending notifications may be lost"
                    );
                    (None, false)
                }
            };

        Ok(AggregateResult {
            loops,
            connectivity_lost,
            processor_drained: drained,
            report,
        })
    }
}
