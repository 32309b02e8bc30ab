//! End-to-end pipeline tests driving the orchestrator with scripted
//! scrapers, a counting gateway, and the in-memory store.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use roomwatch::config::RunConfig;
use roomwatch::error::ScrapeError;
use roomwatch::notify::NotificationGateway;
use roomwatch::pipeline::{LoopStatus, Orchestrator};
use roomwatch::scrape::{HotelScraper, RawPage, ResponseChain, ScrapeOutcome, SessionState};
use roomwatch::store::MemoryStore;

/// What one scripted iteration should do.
#[derive(Debug, Clone, Copy)]
enum Step {
    Unavailable,
    Available,
    TransportError,
    MarkupError,
    ConnectivityLost,
}

/// Scraper that follows a fixed script; the last step repeats forever.
struct ScriptedScraper {
    name: &'static str,
    plan: Vec<Step>,
    delay: Duration,
    calls: AtomicU32,
}

impl ScriptedScraper {
    fn new(name: &'static str, plan: Vec<Step>) -> Self {
        Self {
            name,
            plan,
            delay: Duration::ZERO,
            calls: AtomicU32::new(0),
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn step(&self, iteration: u32) -> Step {
        *self
            .plan
            .get(iteration as usize)
            .unwrap_or_else(|| self.plan.last().unwrap())
    }
}

#[async_trait]
impl HotelScraper for ScriptedScraper {
    fn name(&self) -> &'static str {
        self.name
    }

    fn friendly(&self) -> &'static str {
        "Scripted Hotel"
    }

    async fn scrape(&self, _timeout: Duration) -> Result<RawPage, ScrapeError> {
        let iteration = self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let body = match self.step(iteration) {
            Step::Unavailable => "unavailable",
            Step::Available => "available",
            Step::MarkupError => "markup",
            Step::TransportError => {
                return Err(ScrapeError::Connection("connection reset".to_string()))
            }
            Step::ConnectivityLost => {
                return Err(ScrapeError::ConnectivityLost("dns lookup failed".to_string()))
            }
        };
        let mut chain = ResponseChain::default();
        chain.push(format!("https://{}.example.com/rooms", self.name), 200);
        Ok(RawPage {
            body: body.to_string(),
            chain,
            session: SessionState::default(),
        })
    }

    fn parse(&self, page: RawPage) -> Result<ScrapeOutcome, ScrapeError> {
        match page.body.as_str() {
            "available" => Ok(ScrapeOutcome::parsed(
                self.name,
                self.friendly(),
                page,
                true,
                false,
            )),
            "unavailable" => Ok(ScrapeOutcome::parsed(
                self.name,
                self.friendly(),
                page,
                false,
                false,
            )),
            _ => Err(ScrapeError::Markup(
                "page claims sold out and shows rooms".to_string(),
            )),
        }
    }
}

/// Gateway that counts deliveries and can be told to fail or dawdle.
#[derive(Default)]
struct CountingGateway {
    notified: AtomicUsize,
    fail: bool,
    delay: Duration,
}

impl CountingGateway {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    fn count(&self) -> usize {
        self.notified.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationGateway for CountingGateway {
    async fn notify(&self, _outcome: &ScrapeOutcome, _ref_id: Option<Uuid>) -> anyhow::Result<()> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            anyhow::bail!("gateway rejected the message");
        }
        self.notified.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn config(max_attempts: u32, interval: Duration) -> RunConfig {
    RunConfig {
        max_attempts,
        interval,
        use_db: false,
        ..RunConfig::default()
    }
}

#[tokio::test]
async fn finite_run_completes_and_notifies_on_availability() {
    let quiet = Arc::new(ScriptedScraper::new("quiet", vec![Step::Unavailable]));
    let lucky = Arc::new(ScriptedScraper::new(
        "lucky",
        vec![Step::Unavailable, Step::Available, Step::Unavailable],
    ));
    let gateway = Arc::new(CountingGateway::default());
    let store = Arc::new(MemoryStore::new());

    let result = Orchestrator::new(
        vec![quiet, lucky],
        gateway.clone(),
        config(3, Duration::from_millis(10)),
    )
    .with_store(store.clone())
    .run_monitoring()
    .await
    .unwrap();

    assert!(result.success());
    assert!(result.processor_drained);
    assert_eq!(
        result.status_of("quiet"),
        Some(&LoopStatus::Completed { iterations: 3 })
    );
    assert_eq!(
        result.status_of("lucky"),
        Some(&LoopStatus::Completed { iterations: 3 })
    );

    let report = result.report.unwrap();
    assert_eq!(report.received, 6);
    assert_eq!(report.notified, 1);
    assert_eq!(gateway.count(), 1);

    // Every attempt was recorded and settled.
    let attempts = store.attempts();
    assert_eq!(attempts.len(), 6);
    assert!(attempts.iter().all(|a| a.processed));
    assert_eq!(attempts.iter().filter(|a| a.available).count(), 1);
    assert_eq!(store.invocation_count(), 1);
}

#[tokio::test]
async fn markup_contradiction_kills_only_its_loop() {
    let broken = Arc::new(ScriptedScraper::new("broken", vec![Step::MarkupError]));
    let steady = Arc::new(ScriptedScraper::new("steady", vec![Step::Unavailable]));
    let gateway = Arc::new(CountingGateway::default());

    let result = Orchestrator::new(
        vec![broken, steady],
        gateway,
        config(2, Duration::from_millis(10)),
    )
    .run_monitoring()
    .await
    .unwrap();

    assert!(!result.success());
    assert!(!result.connectivity_lost);
    assert!(matches!(
        result.status_of("broken"),
        Some(LoopStatus::Failed { .. })
    ));
    assert_eq!(
        result.status_of("steady"),
        Some(&LoopStatus::Completed { iterations: 2 })
    );
    // The broken loop died before emitting anything.
    assert_eq!(result.report.unwrap().received, 2);
}

#[tokio::test]
async fn transport_errors_are_absorbed_per_iteration() {
    let flaky = Arc::new(ScriptedScraper::new(
        "flaky",
        vec![Step::TransportError, Step::Unavailable],
    ));
    let gateway = Arc::new(CountingGateway::default());
    let store = Arc::new(MemoryStore::new());

    let result = Orchestrator::new(
        vec![flaky],
        gateway.clone(),
        config(2, Duration::from_millis(10)),
    )
    .with_store(store.clone())
    .run_monitoring()
    .await
    .unwrap();

    assert!(result.success());
    assert_eq!(
        result.status_of("flaky"),
        Some(&LoopStatus::Completed { iterations: 2 })
    );
    assert_eq!(gateway.count(), 0);

    let attempts = store.attempts();
    assert_eq!(attempts.len(), 2);
    assert!(attempts[0].errored);
    assert!(!attempts[1].errored);
    // Errored attempts still get settled by the processor.
    assert!(attempts.iter().all(|a| a.processed));
}

#[tokio::test]
async fn connectivity_loss_cancels_the_other_monitors() {
    let doomed = Arc::new(
        ScriptedScraper::new("doomed", vec![Step::ConnectivityLost])
            .with_delay(Duration::from_millis(20)),
    );
    // Unbounded loop; only cancellation can stop it.
    let endless = Arc::new(
        ScriptedScraper::new("endless", vec![Step::Unavailable])
            .with_delay(Duration::from_millis(5)),
    );
    let gateway = Arc::new(CountingGateway::default());

    let result = Orchestrator::new(
        vec![doomed, endless],
        gateway,
        config(0, Duration::from_millis(10)),
    )
    .run_monitoring()
    .await
    .unwrap();

    assert!(!result.success());
    assert!(result.connectivity_lost);
    assert!(matches!(
        result.status_of("doomed"),
        Some(LoopStatus::Failed { .. })
    ));
    assert!(matches!(
        result.status_of("endless"),
        Some(LoopStatus::Cancelled { .. })
    ));
}

#[tokio::test]
async fn notify_failure_leaves_the_record_unprocessed() {
    let lucky = Arc::new(ScriptedScraper::new("lucky", vec![Step::Available]));
    let gateway = Arc::new(CountingGateway::failing());
    let store = Arc::new(MemoryStore::new());

    let result = Orchestrator::new(
        vec![lucky],
        gateway.clone(),
        config(1, Duration::from_millis(10)),
    )
    .with_store(store.clone())
    .run_monitoring()
    .await
    .unwrap();

    // A delivery failure is not a pipeline failure.
    assert!(result.success());
    let report = result.report.unwrap();
    assert_eq!(report.received, 1);
    assert_eq!(report.notified, 0);
    assert_eq!(report.notify_failures, 1);
    assert_eq!(gateway.count(), 0);

    // The attempt stays visibly undelivered.
    let attempts = store.attempts();
    assert_eq!(attempts.len(), 1);
    assert!(!attempts[0].processed);
}

#[tokio::test(start_paused = true)]
async fn pacing_holds_the_interval_between_iterations() {
    // Scrapes take 950ms against a 1s interval, so each gap compresses to
    // the 100ms floor: two iterations land at 950 + 100 + 950 = 2000ms.
    let slow = Arc::new(
        ScriptedScraper::new("slow", vec![Step::Unavailable])
            .with_delay(Duration::from_millis(950)),
    );
    let gateway = Arc::new(CountingGateway::default());

    let started = tokio::time::Instant::now();
    let result = Orchestrator::new(vec![slow], gateway, config(2, Duration::from_secs(1)))
        .run_monitoring()
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(
        result.status_of("slow"),
        Some(&LoopStatus::Completed { iterations: 2 })
    );
    assert!(
        elapsed >= Duration::from_millis(1990) && elapsed <= Duration::from_millis(2100),
        "elapsed {elapsed:?}"
    );
}

#[tokio::test]
async fn shutdown_timeout_abandons_a_stuck_processor() {
    let lucky = Arc::new(ScriptedScraper::new("lucky", vec![Step::Available]));
    let gateway = Arc::new(CountingGateway::slow(Duration::from_millis(500)));

    let result = Orchestrator::new(
        vec![lucky],
        gateway,
        config(1, Duration::from_millis(10)),
    )
    .with_shutdown_timeout(Duration::from_millis(50))
    .run_monitoring()
    .await
    .unwrap();

    // The run itself finished; the drain did not.
    assert!(result.success());
    assert!(!result.processor_drained);
    assert!(result.report.is_none());
    assert_eq!(
        result.status_of("lucky"),
        Some(&LoopStatus::Completed { iterations: 1 })
    );
}
