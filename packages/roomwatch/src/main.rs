// Roomwatch CLI entry point.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use roomwatch::config::{RunCache, RunConfig, DEFAULT_CACHE_FILE};
use roomwatch::event::{self, EventWindow};
use roomwatch::notify::{
    CommConfig, CommGateway, LogGateway, NotificationGateway, DEFAULT_COMM_CONFIG,
};
use roomwatch::pipeline::Orchestrator;
use roomwatch::scrape::{self, ResponseChain, ScrapeOutcome, SessionState};
use roomwatch::store::{MonitorStore, PostgresStore};

#[derive(Parser)]
#[command(name = "roomwatch", version, about = "Host-hotel room availability monitor")]
struct Cli {
    /// Cache discovered event dates and settings in a dot-file.
    #[arg(short = 'c', long)]
    cache: bool,

    /// Debug mode: alerts are marked as tests.
    #[arg(short = 'd', long)]
    debug: bool,

    /// Log configuration data before running.
    #[arg(short = 'i', long)]
    info: bool,

    /// Lowest level of log messages to show.
    #[arg(short = 'l', long, value_parser = ["trace", "debug", "info", "warn", "error"])]
    loglevel: Option<String>,

    /// Max number of tries to find room availability (0 = forever).
    #[arg(short = 'm', long = "max-tries")]
    max_attempts: Option<u32>,

    /// Seconds between attempts for each hotel.
    #[arg(long, default_value_t = 1)]
    interval: u64,

    /// Do not store anything in the database.
    #[arg(short = 'n', long)]
    nodb: bool,

    /// Include module information in log messages.
    #[arg(long)]
    verbose: bool,

    /// Check-in date override (YYYY-MM-DD); defaults to the event start.
    #[arg(long)]
    checkin: Option<NaiveDate>,

    /// Check-out date override (YYYY-MM-DD); defaults to the event end.
    #[arg(long)]
    checkout: Option<NaiveDate>,

    /// Path to the gateway/recipients config file.
    #[arg(long, default_value = DEFAULT_COMM_CONFIG)]
    comm_config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Monitor the host hotels for room availability (the default).
    Rooms,
    /// Send a synthetic alert through the gateway to verify delivery.
    TestAlert {
        /// Extra message to inject into the test alert.
        #[arg(long)]
        message: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = RunConfig {
        verbose: cli.verbose,
        debug: cli.debug,
        info: cli.info,
        use_cache: cli.cache,
        use_db: !cli.nodb,
        max_attempts: cli.max_attempts.unwrap_or(0),
        interval: Duration::from_secs(cli.interval),
        checkin: cli.checkin,
        checkout: cli.checkout,
        ..RunConfig::default()
    };
    config.apply_env(cli.loglevel.as_deref());

    init_logging(&config);
    for warning in &config.warnings {
        warn!("{warning}");
    }

    let mut cache =
        RunCache::load(DEFAULT_CACHE_FILE, config.use_cache).unwrap_or_default();
    config.apply_cache(&cache);

    let result = match cli.command.unwrap_or(Command::Rooms) {
        Command::Rooms => run_rooms(config, &mut cache, &cli.comm_config).await,
        Command::TestAlert { message } => run_test_alert(&cli.comm_config, message).await,
    };

    info!("roomwatch exiting");
    result
}

fn init_logging(config: &RunConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "{level},roomwatch={level},sqlx=warn,reqwest=warn,hyper=warn",
            level = config.loglevel
        )
        .into()
    });
    let fmt = tracing_subscriber::fmt::layer().with_target(config.verbose);
    tracing_subscriber::registry().with(filter).with(fmt).init();
}

async fn run_rooms(
    mut config: RunConfig,
    cache: &mut RunCache,
    comm_config: &str,
) -> Result<()> {
    // Resolve the monitoring window; a failure here means the network is
    // gone entirely, and the run stops before spawning anything.
    let window = resolve_window(&config).await?;
    cache.set_event_window(window.start, window.end);
    if let Err(e) = cache.flush() {
        warn!(error = %e, "could not write cache file");
    }
    let checkin = config.checkin.unwrap_or(window.start);
    let checkout = config.checkout.unwrap_or(window.end);
    config.checkin = Some(checkin);
    config.checkout = Some(checkout);
    info!("monitoring window: {checkin} .. {checkout}");
    if config.info {
        info!(?config, "run configuration");
    }

    let gateway = build_gateway(&config, comm_config);
    let store = build_store(&config).await;

    let scrapers = scrape::host_scrapers(checkin, checkout);
    let mut orchestrator = Orchestrator::new(scrapers, gateway, config);
    if let Some(store) = store {
        orchestrator = orchestrator.with_store(store);
    }

    let result = orchestrator
        .run_monitoring()
        .await
        .context("monitoring pipeline failed")?;

    for (adapter, status) in &result.loops {
        debug!("{adapter}: {status:?}");
    }
    if !result.success() {
        anyhow::bail!("monitoring terminated with failures");
    }
    Ok(())
}

async fn resolve_window(config: &RunConfig) -> Result<EventWindow> {
    if let (Some(start), Some(end)) = (config.checkin, config.checkout) {
        return Ok(EventWindow { start, end });
    }
    match event::discover_event_window(event::DEFAULT_EVENT_URL).await {
        Ok(window) => Ok(window),
        Err(e) if e.is_fatal_to_run() => {
            error!("internet connection error; aborting!");
            Err(e).context("resolving event dates")
        }
        Err(e) => Err(e).context("resolving event dates"),
    }
}

fn build_gateway(config: &RunConfig, comm_config: &str) -> Arc<dyn NotificationGateway> {
    if !config.sms_enabled && !config.email_enabled {
        info!("alerts disabled; availability will only be logged");
        return Arc::new(LogGateway);
    }
    match CommConfig::load(comm_config) {
        Ok(comm) => Arc::new(CommGateway::new(
            comm,
            config.debug,
            config.sms_enabled,
            config.email_enabled,
        )),
        Err(e) => {
            warn!(error = %e, "gateway config unavailable; availability will only be logged");
            Arc::new(LogGateway)
        }
    }
}

async fn build_store(config: &RunConfig) -> Option<Arc<dyn MonitorStore>> {
    if !config.use_db {
        return None;
    }
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            warn!("DATABASE_URL not set; continuing without persistence");
            return None;
        }
    };
    let pool = match PgPoolOptions::new().max_connections(5).connect(&url).await {
        Ok(pool) => pool,
        Err(e) => {
            warn!(error = %e, "database unavailable; continuing without persistence");
            return None;
        }
    };
    let store = PostgresStore::new(pool);
    if let Err(e) = store.init_schema().await {
        warn!(error = %e, "schema init failed; continuing without persistence");
        return None;
    }
    Some(Arc::new(store))
}

async fn run_test_alert(comm_config: &str, message: Option<String>) -> Result<()> {
    let comm = CommConfig::load(comm_config)?;
    let email = comm.smtp.is_some();
    // Test alerts are always marked, whatever the debug flag says.
    let gateway = CommGateway::new(comm, true, true, email);

    let mut chain = ResponseChain::default();
    chain.push("https://example.com/?q=room+availability", 200);
    let outcome = ScrapeOutcome {
        adapter_name: "test",
        friendly_name: "TEST HOTEL NAME",
        phone: "",
        link: "",
        available: true,
        needs_post_processing: false,
        errored: false,
        error_detail: None,
        raw_content: message.unwrap_or_else(|| "This is test alert data!".to_string()),
        session_state: SessionState::default(),
        response_chain: chain,
        attempt: None,
    };

    gateway
        .notify(&outcome, None)
        .await
        .context("test alert delivery failed")?;
    info!("test alert sent");
    Ok(())
}
