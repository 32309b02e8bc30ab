//! Per-adapter monitor loop.
//!
//! `INIT -> (SCRAPE -> PARSE -> EMIT)* -> DONE`, with transport errors
//! absorbed per iteration and fatal errors (markup contradiction,
//! connectivity loss) terminating the loop. Iterations are strictly
//! sequential: at most one in-flight scrape per adapter, ever.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{OutcomeMessage, OutcomeSender};
use crate::config::RunConfig;
use crate::error::ScrapeError;
use crate::scrape::{HotelScraper, ScrapeOutcome};
use crate::store::{InvocationHandle, MonitorStore};

/// Sleep floor between iterations; prevents tight-loop hammering even when
/// a scrape returns instantly.
pub const PACING_FLOOR: Duration = Duration::from_millis(100);

/// In unbounded mode the loop yields briefly each iteration and relies on
/// natural scrape latency for throttling.
const UNBOUNDED_YIELD: Duration = Duration::from_millis(100);

/// Pacing and budget for a set of monitor loops.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// 0 means monitor forever.
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            interval: Duration::from_secs(1),
        }
    }
}

impl From<&RunConfig> for MonitorSettings {
    fn from(config: &RunConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            interval: config.interval,
        }
    }
}

/// Store plus the invocation the current run writes under.
#[derive(Clone)]
pub struct StoreContext {
    pub store: Arc<dyn MonitorStore>,
    pub invocation: InvocationHandle,
}

/// What a loop reports back on an ordinary exit.
#[derive(Debug, Clone, Copy)]
pub struct LoopResult {
    pub iterations: u32,
    pub cancelled: bool,
}

/// Drive one adapter until its budget is exhausted, it fails fatally, or
/// cancellation is observed at an iteration boundary.
///
/// Returns the adapter name alongside the result so the orchestrator can
/// attribute completions joined in arbitrary order.
pub(crate) async fn monitor_rooms(
    scraper: Arc<dyn HotelScraper>,
    settings: MonitorSettings,
    store: Option<StoreContext>,
    outcomes: OutcomeSender,
    cancel: CancellationToken,
) -> (&'static str, Result<LoopResult, ScrapeError>) {
    let name = scraper.name();
    info!("monitoring {} room availability...", scraper.friendly());

    let mut iteration: u32 = 0;
    loop {
        // Cancellation is cooperative and only honored here, never
        // mid-request; an in-flight scrape completes or times out first.
        if cancel.is_cancelled() {
            debug!("{name}:rooms cancelled at iteration boundary");
            return (
                name,
                Ok(LoopResult {
                    iterations: iteration,
                    cancelled: true,
                }),
            );
        }

        let started = Instant::now();

        let mut outcome = match scraper.scrape(scraper.timeout()).await {
            Ok(page) => match scraper.parse(page) {
                Ok(outcome) => outcome,
                Err(e) => {
                    // A markup contradiction risks silent false negatives
                    // on availability; stop this loop rather than guess.
                    error!("{name}:rooms {e}");
                    return (name, Err(e));
                }
            },
            Err(e) if e.is_transport() => {
                error!("{name}:rooms {e}");
                ScrapeOutcome::transport_error(name, scraper.friendly(), &e)
            }
            Err(e) => {
                error!("{name}:rooms {e}");
                return (name, Err(e));
            }
        };

        outcome.phone = scraper.phone();
        outcome.link = scraper.link();

        if let Some(ctx) = &store {
            match ctx.store.record_attempt(&ctx.invocation, &outcome).await {
                Ok(handle) => outcome.attempt = Some(handle),
                Err(e) => {
                    // Best-effort durability: this attempt goes unrecorded.
                    warn!("{name}:rooms attempt not persisted: {e}");
                }
            }
        }

        if outcome.available {
            debug!("{name}:rooms AVAILABILITY FOUND");
        } else {
            debug!("{name}:rooms UNAVAILABLE");
        }

        if outcomes.send(OutcomeMessage::Outcome(outcome)).is_err() {
            warn!("{name}:rooms outcome queue closed; stopping");
            return (
                name,
                Ok(LoopResult {
                    iterations: iteration + 1,
                    cancelled: true,
                }),
            );
        }

        iteration += 1;

        let pause = if settings.max_attempts == 0 {
            UNBOUNDED_YIELD
        } else {
            if iteration >= settings.max_attempts {
                break;
            }
            settings
                .interval
                .saturating_sub(started.elapsed())
                .max(PACING_FLOOR)
        };

        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(pause) => {}
        }
    }

    info!("{name}:rooms monitor finished after {iteration} attempts");
    (
        name,
        Ok(LoopResult {
            iterations: iteration,
            cancelled: false,
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use crate::scrape::{RawPage, ResponseChain, SessionState};

    struct StubScraper;

    #[async_trait]
    impl HotelScraper for StubScraper {
        fn name(&self) -> &'static str {
            "stub"
        }

        fn friendly(&self) -> &'static str {
            "Stub Hotel"
        }

        fn phone(&self) -> &'static str {
            "555-0100"
        }

        fn link(&self) -> &'static str {
            "https://stub.example/book"
        }

        async fn scrape(&self, _timeout: Duration) -> Result<RawPage, ScrapeError> {
            Ok(RawPage {
                body: "ok".to_string(),
                chain: ResponseChain::default(),
                session: SessionState::default(),
            })
        }

        fn parse(&self, page: RawPage) -> Result<ScrapeOutcome, ScrapeError> {
            Ok(ScrapeOutcome::parsed(
                self.name(),
                self.friendly(),
                page,
                true,
                false,
            ))
        }
    }

    #[tokio::test]
    async fn outcomes_carry_the_scraper_contact_details() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let settings = MonitorSettings {
            max_attempts: 1,
            interval: Duration::from_millis(10),
        };
        let cancel = CancellationToken::new();

        let (name, result) =
            monitor_rooms(Arc::new(StubScraper), settings, None, tx, cancel).await;
        assert_eq!(name, "stub");
        assert_eq!(result.unwrap().iterations, 1);

        let Some(OutcomeMessage::Outcome(outcome)) = rx.recv().await else {
            panic!("expected an outcome on the queue");
        };
        assert_eq!(outcome.phone, "555-0100");
        assert_eq!(outcome.link, "https://stub.example/book");
    }

    #[test]
    fn settings_follow_run_config() {
        let config = RunConfig {
            max_attempts: 3,
            interval: Duration::from_secs(2),
            ..RunConfig::default()
        };
        let settings = MonitorSettings::from(&config);
        assert_eq!(settings.max_attempts, 3);
        assert_eq!(settings.interval, Duration::from_secs(2));
    }

    #[test]
    fn pacing_never_drops_below_the_floor() {
        let interval = Duration::from_secs(1);
        let elapsed = Duration::from_millis(950);
        let pause = interval.saturating_sub(elapsed).max(PACING_FLOOR);
        assert_eq!(pause, PACING_FLOOR);

        // Even when elapsed exceeds the interval outright.
        let elapsed = Duration::from_secs(5);
        let pause = interval.saturating_sub(elapsed).max(PACING_FLOOR);
        assert_eq!(pause, PACING_FLOOR);
    }
}
