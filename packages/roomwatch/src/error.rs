//! Error taxonomy for the monitoring pipeline.
//!
//! The split matters for control flow: transport errors are absorbed by the
//! owning monitor loop, a markup contradiction terminates that loop only,
//! and connectivity loss cancels the whole run.

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by scraping, parsing, and event-date discovery.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// The request did not complete within the adapter's timeout.
    /// Recoverable; the next iteration starts fresh.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// Connection refused/reset or a similar transport-level failure.
    /// Recoverable; the next iteration starts fresh.
    #[error("connection error: {0}")]
    Connection(String),

    /// The page content is self-contradictory, e.g. the unavailability
    /// marker text is present but the expected marker element is missing.
    /// Continuing would risk silent false negatives, so this is fatal to
    /// the loop that observed it.
    #[error("markup contradiction: {0}")]
    Markup(String),

    /// The network is unreachable entirely. Fatal to the whole run.
    #[error("total connectivity loss: {0}")]
    ConnectivityLost(String),
}

impl ScrapeError {
    /// Classify a reqwest failure as a per-iteration transport error.
    pub fn from_transport(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            ScrapeError::Timeout(timeout)
        } else {
            ScrapeError::Connection(err.to_string())
        }
    }

    /// Recoverable within a single monitor-loop iteration.
    pub fn is_transport(&self) -> bool {
        matches!(self, ScrapeError::Timeout(_) | ScrapeError::Connection(_))
    }

    /// Requires cancelling every outstanding monitor loop.
    pub fn is_fatal_to_run(&self) -> bool {
        matches!(self, ScrapeError::ConnectivityLost(_))
    }
}
