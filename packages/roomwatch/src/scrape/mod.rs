//! Scraper adapters for the host hotels.
//!
//! Each hotel site gets one implementation of [`HotelScraper`]: `scrape`
//! performs the network exchange and `parse` classifies the fetched page.
//! `scrape` never fails for an ordinary "no rooms" answer, only for
//! transport problems; `parse` raises [`ScrapeError::Markup`] when the page
//! claims two incompatible things at once.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{redirect, Client, Response};
use scraper::Selector;
use serde::{Deserialize, Serialize};

use crate::error::ScrapeError;
use crate::store::AttemptHandle;

mod hilton;
mod hyatt;
mod hyatt_passkey;
mod marriott;

pub use hilton::HiltonScraper;
pub use hyatt::HyattScraper;
pub use hyatt_passkey::HyattPasskeyScraper;
pub use marriott::MarriottScraper;

/// Browser-like User-Agent; some booking sites refuse obvious bots.
pub(crate) const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Cookies and headers captured from the HTTP session, kept for
/// diagnostics and forensic replay of a detection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionState {
    pub cookies: Vec<String>,
    pub headers: Vec<(String, String)>,
}

/// One visited URL plus the status it returned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseHop {
    pub url: String,
    pub status: u16,
}

/// Ordered record of every URL the scrape visited, redirects included.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseChain {
    pub hops: Vec<ResponseHop>,
}

impl ResponseChain {
    pub fn push(&mut self, url: impl Into<String>, status: u16) {
        self.hops.push(ResponseHop {
            url: url.into(),
            status,
        });
    }

    pub fn final_hop(&self) -> Option<&ResponseHop> {
        self.hops.last()
    }
}

/// The fetched page handed from `scrape` to `parse`.
#[derive(Debug, Clone)]
pub struct RawPage {
    pub body: String,
    pub chain: ResponseChain,
    pub session: SessionState,
}

/// Structured result of one scrape+parse cycle.
///
/// Created by `scrape`/`parse`, optionally annotated with a persistence
/// handle by the monitor loop, then consumed exactly once by the result
/// processor.
#[derive(Debug, Clone)]
pub struct ScrapeOutcome {
    pub adapter_name: &'static str,
    pub friendly_name: &'static str,
    /// Front-desk phone number for the alert body; set by the monitor loop
    /// from the owning scraper.
    pub phone: &'static str,
    /// Canonical booking link for the alert body; set by the monitor loop
    /// from the owning scraper.
    pub link: &'static str,
    pub available: bool,
    /// The result is ambiguous and needs a second-stage content extraction
    /// (room types and prices) before anyone books blindly.
    pub needs_post_processing: bool,
    pub errored: bool,
    pub error_detail: Option<String>,
    pub raw_content: String,
    pub session_state: SessionState,
    pub response_chain: ResponseChain,
    /// Set by the monitor loop when the attempt was persisted.
    pub attempt: Option<AttemptHandle>,
}

impl ScrapeOutcome {
    /// Outcome for a successfully fetched and classified page.
    pub fn parsed(
        name: &'static str,
        friendly: &'static str,
        page: RawPage,
        available: bool,
        needs_post_processing: bool,
    ) -> Self {
        Self {
            adapter_name: name,
            friendly_name: friendly,
            phone: "",
            link: "",
            available,
            needs_post_processing,
            errored: false,
            error_detail: None,
            raw_content: page.body,
            session_state: page.session,
            response_chain: page.chain,
            attempt: None,
        }
    }

    /// Outcome for an iteration that died in transport; never available.
    pub fn transport_error(
        name: &'static str,
        friendly: &'static str,
        err: &ScrapeError,
    ) -> Self {
        Self {
            adapter_name: name,
            friendly_name: friendly,
            phone: "",
            link: "",
            available: false,
            needs_post_processing: false,
            errored: true,
            error_detail: Some(err.to_string()),
            raw_content: String::new(),
            session_state: SessionState::default(),
            response_chain: ResponseChain::default(),
            attempt: None,
        }
    }
}

/// Capability interface implemented once per hotel site.
#[async_trait]
pub trait HotelScraper: Send + Sync {
    /// Stable identifier, e.g. "hyatt".
    fn name(&self) -> &'static str;

    /// Display string for logs and alerts.
    fn friendly(&self) -> &'static str;

    /// Front-desk phone number, included in alerts.
    fn phone(&self) -> &'static str {
        ""
    }

    /// Booking link, included in alerts.
    fn link(&self) -> &'static str {
        ""
    }

    /// Per-request timeout tuned to the site's latency profile.
    fn timeout(&self) -> Duration {
        Duration::from_secs(8)
    }

    /// Perform the network exchange and return the final page.
    ///
    /// Must only fail for transport-level problems; "no rooms" is a
    /// successful scrape.
    async fn scrape(&self, timeout: Duration) -> Result<RawPage, ScrapeError>;

    /// Classify the fetched page. Pure with respect to the page content.
    fn parse(&self, page: RawPage) -> Result<ScrapeOutcome, ScrapeError>;
}

/// The fixed set of host-hotel scrapers, registered explicitly at startup.
pub fn host_scrapers(
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<std::sync::Arc<dyn HotelScraper>> {
    vec![
        std::sync::Arc::new(HyattScraper::new(start, end)),
        std::sync::Arc::new(HyattPasskeyScraper::new(start, end)),
        std::sync::Arc::new(HiltonScraper::new(start, end)),
        std::sync::Arc::new(MarriottScraper::new(start, end)),
    ]
}

/// Build the HTTP client an adapter uses for one scrape.
///
/// A fresh client per iteration keeps cookie state scoped to a single
/// attempt, matching the one-in-flight-session-per-adapter invariant.
pub(crate) fn http_client(timeout: Duration) -> Result<Client, ScrapeError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .redirect(redirect::Policy::limited(10))
        .cookie_store(true)
        .build()
        .map_err(|e| ScrapeError::Connection(e.to_string()))
}

/// Record a response onto the chain and capture any cookies it set.
pub(crate) fn absorb_response(
    resp: &Response,
    chain: &mut ResponseChain,
    session: &mut SessionState,
) {
    chain.push(resp.url().to_string(), resp.status().as_u16());
    for value in resp.headers().get_all(reqwest::header::SET_COOKIE) {
        if let Ok(v) = value.to_str() {
            session.cookies.push(v.to_string());
        }
    }
}

/// Parse a selector known to be valid at compile time.
pub(crate) fn static_selector(css: &str) -> Selector {
    Selector::parse(css).expect("static selector must be valid")
}

/// Collect the own-text of every element matching `css`.
pub(crate) fn marker_texts(body: &str, css: &str) -> Vec<String> {
    let document = scraper::Html::parse_document(body);
    let selector = static_selector(css);
    document
        .select(&selector)
        .map(|el| {
            el.text()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|t| !t.is_empty())
        .collect()
}

#[cfg(test)]
pub(crate) fn page_from_body(body: &str) -> RawPage {
    RawPage {
        body: body.to_string(),
        chain: ResponseChain::default(),
        session: SessionState::default(),
    }
}
