//! Hyatt Regency Atlanta direct-booking scraper.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use tracing::{debug, error};

use super::{
    absorb_response, http_client, marker_texts, HotelScraper, RawPage, ResponseChain,
    ScrapeOutcome, SessionState,
};
use crate::error::ScrapeError;

const SOLD_OUT_TEXT: &str = "The hotel is not available for your requested travel dates. \
     It is either sold out or not yet open for reservations.";
const ERROR_SELECTOR: &str = ".error-block #msg .error";

pub struct HyattScraper {
    start: NaiveDate,
    end: NaiveDate,
    occupancy: u32,
    rooms: u32,
}

impl HyattScraper {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start,
            end,
            occupancy: 4,
            rooms: 1,
        }
    }
}

#[async_trait]
impl HotelScraper for HyattScraper {
    fn name(&self) -> &'static str {
        "hyatt"
    }

    fn friendly(&self) -> &'static str {
        "Hyatt Regency Atlanta"
    }

    fn phone(&self) -> &'static str {
        "404-577-1234"
    }

    fn link(&self) -> &'static str {
        "https://atlantaregency.hyatt.com/en/hotel/home.html"
    }

    // Their redirects take a long time to actually return a response.
    fn timeout(&self) -> Duration {
        Duration::from_secs(8)
    }

    async fn scrape(&self, timeout: Duration) -> Result<RawPage, ScrapeError> {
        let client = http_client(timeout)?;
        let mut chain = ResponseChain::default();
        let mut session = SessionState::default();

        let base = "https://atlantaregency.hyatt.com";
        let home_url = format!("{base}/en/hotel/home.html");
        let search_url = format!("{base}/HICBooking");
        let monthyear = |d: NaiveDate| format!("{} {:02}", d.month(), d.year() % 100);
        let params: Vec<(&str, String)> = vec![
            ("Lang", "en".into()),
            ("accessibilityCheck", "false".into()),
            ("adults", self.occupancy.to_string()),
            ("childAge1", "-1".into()),
            ("childAge2", "-1".into()),
            ("childAge3", "-1".into()),
            ("childAge4", "-1".into()),
            ("corp_id", String::new()),
            ("day1", self.start.day().to_string()),
            ("day2", self.end.day().to_string()),
            ("kids", "0".into()),
            ("monthyear1", monthyear(self.start)),
            ("monthyear2", monthyear(self.end)),
            ("offercode", String::new()),
            ("pid", "atlra".into()),
            ("rateType", "Standard".into()),
            ("rooms", self.rooms.to_string()),
            ("srcd", "dayprop".into()),
        ];

        // The search request redirects several times while the site
        // processes it; the cookie jar carries the session across hops.
        let resp = client
            .get(&home_url)
            .send()
            .await
            .map_err(|e| ScrapeError::from_transport(e, timeout))?;
        absorb_response(&resp, &mut chain, &mut session);
        resp.text()
            .await
            .map_err(|e| ScrapeError::from_transport(e, timeout))?;

        let resp = client
            .get(&search_url)
            .query(&params)
            .send()
            .await
            .map_err(|e| ScrapeError::from_transport(e, timeout))?;
        absorb_response(&resp, &mut chain, &mut session);
        debug!(adapter = self.name(), status = resp.status().as_u16(), "search response");
        let body = resp
            .text()
            .await
            .map_err(|e| ScrapeError::from_transport(e, timeout))?;

        Ok(RawPage {
            body,
            chain,
            session,
        })
    }

    fn parse(&self, page: RawPage) -> Result<ScrapeOutcome, ScrapeError> {
        let errors = marker_texts(&page.body, ERROR_SELECTOR);
        let unavailable = errors.iter().any(|t| t.contains(SOLD_OUT_TEXT));

        if errors.is_empty() && page.body.contains(SOLD_OUT_TEXT) {
            let msg = "sold-out text present but error block missing";
            error!(adapter = self.name(), "{msg}");
            return Err(ScrapeError::Markup(msg.into()));
        }

        if unavailable {
            debug!(adapter = self.name(), "UNAVAILABLE");
            Ok(ScrapeOutcome::parsed(
                self.name(),
                self.friendly(),
                page,
                false,
                false,
            ))
        } else {
            // No sold-out marker: treat as available, pending a second-stage
            // pass over the rates container to pull room types and prices.
            debug!(adapter = self.name(), "post processing required");
            Ok(ScrapeOutcome::parsed(
                self.name(),
                self.friendly(),
                page,
                true,
                true,
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrape::page_from_body;

    fn scraper() -> HyattScraper {
        HyattScraper::new(
            NaiveDate::from_ymd_opt(2025, 8, 29).unwrap(),
            NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
        )
    }

    #[test]
    fn sold_out_marker_means_unavailable() {
        let body = format!(
            r#"<html><body><div class="error-block"><div id="msg">
               <span class="error">{SOLD_OUT_TEXT}</span>
               </div></div></body></html>"#
        );
        let outcome = scraper().parse(page_from_body(&body)).unwrap();
        assert!(!outcome.available);
        assert!(!outcome.needs_post_processing);
    }

    #[test]
    fn missing_marker_means_available_with_post_processing() {
        let body = "<html><body><div id=\"rates_and_rooms_container\"></div></body></html>";
        let outcome = scraper().parse(page_from_body(body)).unwrap();
        assert!(outcome.available);
        assert!(outcome.needs_post_processing);
    }

    #[test]
    fn contradictory_page_is_a_markup_fault() {
        // Sold-out text in the body but no error block to anchor it.
        let body = format!("<html><body><p>{SOLD_OUT_TEXT}</p></body></html>");
        let err = scraper().parse(page_from_body(&body)).unwrap_err();
        assert!(matches!(err, ScrapeError::Markup(_)));
    }
}
