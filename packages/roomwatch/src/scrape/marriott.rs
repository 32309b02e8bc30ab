//! Atlanta Marriott Marquis scraper.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::{debug, error};

use super::{
    absorb_response, http_client, marker_texts, HotelScraper, RawPage, ResponseChain,
    ScrapeOutcome, SessionState,
};
use crate::error::ScrapeError;

const NO_ROOMS_TEXT: &str = "Sorry, currently there are no rooms available at this \
     property for the dates you selected. Please try your search again";
const NO_ROOMS_SELECTOR: &str = "#popover-panel #no-rooms-available";

pub struct MarriottScraper {
    start: NaiveDate,
    end: NaiveDate,
    occupancy: u32,
    rooms: u32,
}

impl MarriottScraper {
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
impl HotelScraper for MarriottScraper {
    fn name(&self) -> &'static str {
        "marriott"
    }

    fn friendly(&self) -> &'static str {
        "Atlanta Marriott Marquis"
    }

    fn phone(&self) -> &'static str {
        "404-521-0000"
    }

    fn link(&self) -> &'static str {
        "https://www.marriott.com/hotels/travel/atlmq-atlanta-marriott-marquis/"
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(5)
    }

    async fn scrape(&self, timeout: Duration) -> Result<RawPage, ScrapeError> {
        let client = http_client(timeout)?;
        let mut chain = ResponseChain::default();
        let mut session = SessionState::default();

        let base = "https://www.marriott.com";
        let home_url = format!("{base}/hotels/travel/atlmq-atlanta-marriott-marquis/");
        let search_url = format!("{base}/reservation/availabilitySearch.mi");
        let datefmt = |d: NaiveDate| d.format("%m/%d/%Y").to_string();
        let params: Vec<(&str, String)> = vec![
            ("fromDate", datefmt(self.start)),
            ("toDate", datefmt(self.end)),
            ("accountId", String::new()),
            ("clusterCode", "none".into()),
            ("corporateCode", String::new()),
            ("dateFormatPattern", String::new()),
            ("flexibleDateSearch", "false".into()),
            ("flushSelectedRoomType", "true".into()),
            ("groupCode", String::new()),
            ("includeNearByLocation", "false".into()),
            ("isHwsGroupSearch", "true".into()),
            ("isSearch", "false".into()),
            ("marriottRewardsNumber", String::new()),
            ("numberOfGuests", self.occupancy.to_string()),
            ("numberOfNights", "1".into()),
            ("numberOfRooms", self.rooms.to_string()),
            ("propertyCode", "atlmq".into()),
            ("useRewardsPoints", "false".into()),
        ];

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
        let markers = marker_texts(&page.body, NO_ROOMS_SELECTOR);

        if let Some(text) = markers.first() {
            // The no-rooms panel exists; its text must actually say so,
            // otherwise the markup has drifted out from under us.
            if !text.contains(NO_ROOMS_TEXT) {
                let msg = "no-rooms panel present but expected text missing";
                error!(adapter = self.name(), "{msg}");
                return Err(ScrapeError::Markup(msg.into()));
            }
            debug!(adapter = self.name(), "UNAVAILABLE");
            return Ok(ScrapeOutcome::parsed(
                self.name(),
                self.friendly(),
                page,
                false,
                false,
            ));
        }

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
