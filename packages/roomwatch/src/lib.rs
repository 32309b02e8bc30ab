//! Roomwatch monitors host-hotel booking sites for room availability
//! during an event window and alerts a roster of recipients the moment a
//! scraper sees bookable rooms.
//!
//! Architecture: one monitor-loop task per hotel scraper feeds a shared
//! outcome queue; a single result processor consumes the queue and
//! handles notification and persistence. The [`pipeline::Orchestrator`]
//! owns all task lifecycles, cancellation, and shutdown.

pub mod config;
pub mod error;
pub mod event;
pub mod notify;
pub mod pipeline;
pub mod scrape;
pub mod store;

pub use config::{RunCache, RunConfig};
pub use error::ScrapeError;
pub use pipeline::{AggregateResult, LoopStatus, Orchestrator};
pub use scrape::{HotelScraper, RawPage, ScrapeOutcome};
