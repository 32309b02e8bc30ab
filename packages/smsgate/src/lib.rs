// Minimal client for a Twilio-compatible programmable messaging API.
// Only the pieces roomwatch needs: outbound SMS with an optional subject
// line for carriers that route long messages through an MMS gateway.

use std::collections::HashMap;

pub mod models;

use reqwest::{header, Client};

use crate::models::MessageResponse;

/// Credentials and endpoint configuration for the messaging API.
#[derive(Debug, Clone)]
pub struct GatewayOptions {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
    /// Override for the API base URL (tests point this at a local server).
    pub base_url: Option<String>,
}

const DEFAULT_BASE_URL: &str = "https://api.twilio.com/2010-04-01";

/// SMS messages cap out at 160 characters; anything longer must be
/// delivered as MMS or it will be truncated or dropped by the carrier.
pub const SMS_MAX_LEN: usize = 160;

#[derive(Debug, Clone)]
pub struct GatewayClient {
    options: GatewayOptions,
    client: Client,
}

impl GatewayClient {
    pub fn new(options: GatewayOptions) -> Self {
        Self {
            options,
            client: Client::new(),
        }
    }

    fn messages_url(&self) -> String {
        let base = self
            .options
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL);
        format!(
            "{base}/Accounts/{sid}/Messages.json",
            sid = self.options.account_sid
        )
    }

    /// Send a text message to a single recipient.
    ///
    /// The caller decides the body; this client only handles transport.
    pub async fn send_message(
        &self,
        recipient: &str,
        body: &str,
    ) -> Result<MessageResponse, &'static str> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            "Content-Type",
            "application/x-www-form-urlencoded"
                .parse()
                .expect("Header value should parse correctly"),
        );

        let mut form_body: HashMap<&str, String> = HashMap::new();
        form_body.insert("To", recipient.to_string());
        form_body.insert("From", self.options.from_number.clone());
        form_body.insert("Body", body.to_string());

        let res = self
            .client
            .post(self.messages_url())
            .basic_auth(
                self.options.account_sid.clone(),
                Some(self.options.auth_token.clone()),
            )
            .headers(headers)
            .form(&form_body)
            .send()
            .await;

        match res {
            Ok(response) => {
                let status = response.status();
                if !status.is_success() {
                    let error_body = response.text().await.unwrap_or_default();
                    eprintln!("gateway error ({}): {}", status, error_body);
                    return Err("messaging gateway returned an error");
                }

                match response.json::<MessageResponse>().await {
                    Ok(data) => Ok(data),
                    Err(e) => {
                        eprintln!("failed to parse gateway response: {}", e);
                        Err("error parsing message response")
                    }
                }
            }
            Err(e) => {
                eprintln!("request to messaging gateway failed: {}", e);
                Err("error sending message")
            }
        }
    }

    /// Whether `body` must be routed as MMS instead of plain SMS.
    pub fn needs_mms(body: &str) -> bool {
        body.len() >= SMS_MAX_LEN
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> GatewayOptions {
        GatewayOptions {
            account_sid: "AC0000".to_string(),
            auth_token: "token".to_string(),
            from_number: "+15550000000".to_string(),
            base_url: None,
        }
    }

    #[test]
    fn messages_url_includes_account_sid() {
        let client = GatewayClient::new(options());
        assert!(client.messages_url().contains("AC0000"));
    }

    #[test]
    fn messages_url_respects_base_override() {
        let mut opts = options();
        opts.base_url = Some("http://localhost:9999".to_string());
        let client = GatewayClient::new(opts);
        assert!(client.messages_url().starts_with("http://localhost:9999"));
    }

    #[test]
    fn long_bodies_route_as_mms() {
        assert!(!GatewayClient::needs_mms("short"));
        assert!(GatewayClient::needs_mms(&"x".repeat(200)));
    }
}
