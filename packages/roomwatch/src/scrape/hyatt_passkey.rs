//! Hyatt group-block scraper going through the Passkey event portal.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::{debug, error};

use super::{
    absorb_response, http_client, marker_texts, HotelScraper, RawPage, ResponseChain,
    ScrapeOutcome, SessionState,
};
use crate::error::ScrapeError;

const NO_MATCH_TEXT: &str = "No lodging matches your search criteria.";
const MESSAGE_SELECTOR: &str = "#main .shell #content .message-room";

pub struct HyattPasskeyScraper {
    start: NaiveDate,
    end: NaiveDate,
    occupancy: u32,
    rooms: u32,
}

impl HyattPasskeyScraper {
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
impl HotelScraper for HyattPasskeyScraper {
    fn name(&self) -> &'static str {
        "hyatt_passkey"
    }

    fn friendly(&self) -> &'static str {
        "Hyatt (passkey)"
    }

    fn phone(&self) -> &'static str {
        "404-577-1234"
    }

    fn link(&self) -> &'static str {
        "https://aws.passkey.com/event/14179207/owner/323/home"
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(8)
    }

    async fn scrape(&self, timeout: Duration) -> Result<RawPage, ScrapeError> {
        let client = http_client(timeout)?;
        let mut chain = ResponseChain::default();
        let mut session = SessionState::default();

        let base = "https://aws.passkey.com/event/14179207/owner/323";
        let home_url = format!("{base}/home");
        let group_url = format!("{base}/home/group");
        let landing_url = format!("{base}/landing");
        let search_url = format!("{base}/rooms/select");
        let datefmt = |d: NaiveDate| d.format("%Y-%m-%d").to_string();
        let payload: Vec<(&str, String)> = vec![
            ("hotelId", "323".into()),
            ("blockMap.blocks[0].blockId", "0".into()),
            ("blockMap.blocks[0].checkIn", datefmt(self.start)),
            ("blockMap.blocks[0].checkOut", datefmt(self.end)),
            ("blockMap.blocks[0].numberOfGuests", self.occupancy.to_string()),
            ("blockMap.blocks[0].numberOfRooms", self.rooms.to_string()),
            ("blockMap.blocks[0].numberOfChildren", "0".into()),
        ];
        let group_id = [("groupTypeId", "52445573")];

        // The portal bounces through several redirects to set the cookies
        // it requires before the room search will answer.
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
            .post(&group_url)
            .form(&group_id)
            .send()
            .await
            .map_err(|e| ScrapeError::from_transport(e, timeout))?;
        absorb_response(&resp, &mut chain, &mut session);
        resp.text()
            .await
            .map_err(|e| ScrapeError::from_transport(e, timeout))?;

        let resp = client
            .post(&search_url)
            .header(reqwest::header::REFERER, &landing_url)
            .form(&payload)
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
        // The portal parks itself on a maintenance page now and then;
        // that is a transport-grade hiccup, not an availability answer.
        if let Some(hop) = page.chain.final_hop() {
            if hop.url.contains("maintenance/index.html") {
                return Err(ScrapeError::Connection(
                    "passkey portal is in maintenance mode".into(),
                ));
            }
        }

        let messages = marker_texts(&page.body, MESSAGE_SELECTOR);
        let unavailable = messages.iter().any(|t| t.contains(NO_MATCH_TEXT));

        if messages.is_empty() && page.body.contains(NO_MATCH_TEXT) {
            let msg = "no-match text present but message element missing";
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

    fn scraper() -> HyattPasskeyScraper {
        HyattPasskeyScraper::new(
            NaiveDate::from_ymd_opt(2025, 8, 29).unwrap(),
            NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
        )
    }

    #[test]
    fn no_match_marker_means_unavailable() {
        let body = format!(
            r#"<html><body><div id="main"><div class="shell"><div id="content">
               <div class="message-room">{NO_MATCH_TEXT}</div>
               </div></div></div></body></html>"#
        );
        let outcome = scraper().parse(page_from_body(&body)).unwrap();
        assert!(!outcome.available);
    }

    #[test]
    fn contradictory_page_is_a_markup_fault() {
        let body = format!("<html><body><p>{NO_MATCH_TEXT}</p></body></html>");
        let err = scraper().parse(page_from_body(&body)).unwrap_err();
        assert!(matches!(err, ScrapeError::Markup(_)));
    }

    #[test]
    fn maintenance_redirect_is_a_transport_error() {
        let mut page = page_from_body("<html><body></body></html>");
        page.chain
            .push("https://aws.passkey.com/maintenance/index.html", 200);
        let err = scraper().parse(page).unwrap_err();
        assert!(matches!(err, ScrapeError::Connection(_)));
    }
}
