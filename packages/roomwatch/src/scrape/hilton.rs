//! Hilton Atlanta scraper.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::debug;

use super::{
    absorb_response, http_client, marker_texts, HotelScraper, RawPage, ResponseChain,
    ScrapeOutcome, SessionState,
};
use crate::error::ScrapeError;

const NO_ROOMS_TEXT: &str = "There are no rooms available";
const ALERT_SELECTOR: &str = "div#main_content div#main div.alertBox p";

pub struct HiltonScraper {
    start: NaiveDate,
    end: NaiveDate,
    occupancy: u32,
    rooms: u32,
}

impl HiltonScraper {
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
impl HotelScraper for HiltonScraper {
    fn name(&self) -> &'static str {
        "hilton"
    }

    fn friendly(&self) -> &'static str {
        "Hilton Atlanta"
    }

    fn phone(&self) -> &'static str {
        "404-659-2000"
    }

    fn link(&self) -> &'static str {
        "http://www3.hilton.com/en/hotels/georgia/hilton-atlanta-ATLAHHH/index.html"
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(10)
    }

    async fn scrape(&self, timeout: Duration) -> Result<RawPage, ScrapeError> {
        let client = http_client(timeout)?;
        let mut chain = ResponseChain::default();
        let mut session = SessionState::default();

        let base = "http://www3.hilton.com";
        let home_url =
            format!("{base}/en/hotels/georgia/hilton-atlanta-ATLAHHH/index.html");
        let search_url = format!("{base}/en_US/hi/search/findhotels/index.htm");
        let datefmt = |d: NaiveDate| d.format("%d %b %Y").to_string();
        let mut params: Vec<(String, String)> = vec![
            ("arrivalDate".into(), datefmt(self.start)),
            ("departureDate".into(), datefmt(self.end)),
            ("_aaaRate".into(), "on".into()),
            ("_aarpRate".into(), "on".into()),
            ("_flexibleDates".into(), "on".into()),
            ("_governmentRate".into(), "on".into()),
            ("_seniorRate".into(), "on".into()),
            ("_travelAgencyRate".into(), "on".into()),
            ("bookButton".into(), "false".into()),
            ("corporateId".into(), String::new()),
            ("ctyhocn".into(), "ATLAHHH".into()),
            ("groupCode".into(), String::new()),
            ("numberOfRooms".into(), self.rooms.to_string()),
            ("offerId".into(), String::new()),
            ("promoCode".into(), String::new()),
            ("roomKeyEnable".into(), "false".into()),
            ("searchQuery".into(), String::new()),
            ("searchType".into(), "PROP".into()),
        ];
        // The form wants per-room occupancy slots even for a single room.
        params.push(("numberOfAdults[0]".into(), self.occupancy.to_string()));
        for slot in 1..9 {
            params.push((format!("numberOfAdults[{slot}]"), "1".into()));
        }
        for slot in 0..9 {
            params.push((format!("numberOfChildren[{slot}]"), "0".into()));
        }

        // The search post redirects a number of times while their site
        // resolves the query.
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
            .post(&search_url)
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
        let alerts = marker_texts(&page.body, ALERT_SELECTOR);
        let unavailable = alerts.iter().any(|t| t.contains(NO_ROOMS_TEXT));

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
