//! Event-date discovery.
//!
//! The convention homepage publishes its date range in a countdown
//! banner; that range decides the default check-in/check-out window. A
//! network failure here is the canonical "total connectivity loss"
//! signal: if we cannot even reach the event site, no scraper will fare
//! better, and the whole run should stop.

use std::time::Duration;

use chrono::NaiveDate;
use tracing::debug;

use crate::error::ScrapeError;
use crate::scrape;

pub const DEFAULT_EVENT_URL: &str = "http://www.dragoncon.org/";
const DATES_SELECTOR: &str = ".region-countdown > div > h2";
const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// The event's start and end dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Fetch the event site and extract the date range from the countdown.
pub async fn discover_event_window(site_url: &str) -> Result<EventWindow, ScrapeError> {
    debug!("retrieving event dates from {site_url}");
    let client = scrape::http_client(DISCOVERY_TIMEOUT)
        .map_err(|e| ScrapeError::ConnectivityLost(e.to_string()))?;
    let resp = client
        .get(site_url)
        .send()
        .await
        .map_err(|e| ScrapeError::ConnectivityLost(e.to_string()))?;
    let body = resp
        .text()
        .await
        .map_err(|e| ScrapeError::ConnectivityLost(e.to_string()))?;

    let banners = scrape::marker_texts(&body, DATES_SELECTOR);
    let banner = match banners.as_slice() {
        [single] => single,
        other => {
            return Err(ScrapeError::Markup(format!(
                "expected one countdown banner, found {}",
                other.len()
            )))
        }
    };

    let window = parse_date_range(banner)?;
    debug!("start date: {}", window.start);
    debug!("  end date: {}", window.end);
    Ok(window)
}

/// Parse a banner like "Aug. 29 - Sep. 1, 2025" into an event window.
///
/// The start side usually omits the year; it borrows the end side's.
pub fn parse_date_range(text: &str) -> Result<EventWindow, ScrapeError> {
    let halves: Vec<&str> = text.split('-').collect();
    let [start_raw, end_raw] = halves.as_slice() else {
        return Err(ScrapeError::Markup(format!(
            "expected two dates separated by a dash, got {text:?}"
        )));
    };

    let end_tokens = clean_tokens(end_raw);
    let [end_month, end_day, end_year] = end_tokens.as_slice() else {
        return Err(ScrapeError::Markup(format!(
            "cannot read end date from {end_raw:?}"
        )));
    };
    let year: i32 = end_year
        .parse()
        .map_err(|_| ScrapeError::Markup(format!("bad year {end_year:?}")))?;
    let end = build_date(year, end_month, end_day)?;

    let start_tokens = clean_tokens(start_raw);
    let start = match start_tokens.as_slice() {
        [month, day] => build_date(year, month, day)?,
        [month, day, start_year] => {
            let _explicit: i32 = start_year
                .parse()
                .map_err(|_| ScrapeError::Markup(format!("bad year {start_year:?}")))?;
            // The banner's start year is taken from the end side anyway;
            // a multi-year event window has never existed.
            build_date(year, month, day)?
        }
        _ => {
            return Err(ScrapeError::Markup(format!(
                "cannot read start date from {start_raw:?}"
            )))
        }
    };

    if start >= end {
        return Err(ScrapeError::Markup(format!(
            "event window out of order: {start} .. {end}"
        )));
    }

    Ok(EventWindow { start, end })
}

fn clean_tokens(raw: &str) -> Vec<String> {
    raw.split_whitespace()
        .map(|t| t.trim_matches(|c: char| c == '.' || c == ',').to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

fn build_date(year: i32, month: &str, day: &str) -> Result<NaiveDate, ScrapeError> {
    let month = month_number(month)
        .ok_or_else(|| ScrapeError::Markup(format!("bad month {month:?}")))?;
    let day: u32 = day
        .parse()
        .map_err(|_| ScrapeError::Markup(format!("bad day {day:?}")))?;
    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| ScrapeError::Markup(format!("invalid date {year}-{month}-{day}")))
}

fn month_number(name: &str) -> Option<u32> {
    let key: String = name.to_lowercase().chars().take(3).collect();
    let number = match key.as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(number)
}
