//! Notification gateway: turns an available outcome into email and
//! SMS alerts.
//!
//! The gateway is a scoped resource owned by the result processor for the
//! lifetime of one run. Email alerts carry the raw response and session
//! cookies as attachments for forensic replay; SMS alerts are a clipped
//! one-liner. Delivery failures are the caller's problem to swallow; this
//! module only reports them.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use lettre::message::{header::ContentType, Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Deserialize;
use smsgate::{GatewayClient, GatewayOptions, SMS_MAX_LEN};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::scrape::ScrapeOutcome;

pub const DEFAULT_COMM_CONFIG: &str = "roomwatch-comm.json";
const ALERT_SUBJECT: &str = "Roomwatch Alert: Host Hotel Availability";

/// Delivery interface the result processor depends on. Must be safe to
/// call repeatedly within one acquisition.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    /// Deliver an alert for one available outcome. At-most-once per
    /// outcome is enforced by the caller, not here.
    async fn notify(&self, outcome: &ScrapeOutcome, ref_id: Option<Uuid>) -> Result<()>;

    /// Release any underlying connection. Called on every ordinary exit
    /// path of the processor.
    async fn close(&self) {}
}

/// A person to alert.
#[derive(Debug, Clone, Deserialize)]
pub struct Recipient {
    pub first_name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// SMTP relay settings for the email side of the gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub server: String,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

/// On-disk gateway configuration (credentials plus roster).
#[derive(Debug, Clone, Deserialize)]
pub struct CommConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
    pub recipients: Vec<Recipient>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub smtp: Option<SmtpConfig>,
}

impl CommConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("comm config {} could not be accessed", path.display()))?;
        let config: CommConfig =
            serde_json::from_str(&raw).context("malformed comm config")?;
        if config.recipients.is_empty() {
            return Err(anyhow!("comm config has no recipients"));
        }
        Ok(config)
    }
}

/// Combined email/SMS gateway: SMS through [`smsgate`], email through an
/// SMTP relay. Either side can be toggled off per run.
pub struct CommGateway {
    client: GatewayClient,
    recipients: Vec<Recipient>,
    smtp: Option<SmtpConfig>,
    /// Debug runs mark every alert so nobody books a room off a test.
    debug: bool,
    sms_enabled: bool,
    email_enabled: bool,
}

impl CommGateway {
    pub fn new(config: CommConfig, debug: bool, sms_enabled: bool, email_enabled: bool) -> Self {
        let client = GatewayClient::new(GatewayOptions {
            account_sid: config.account_sid,
            auth_token: config.auth_token,
            from_number: config.from_number,
            base_url: config.base_url,
        });
        Self {
            client,
            recipients: config.recipients,
            smtp: config.smtp,
            debug,
            sms_enabled,
            email_enabled,
        }
    }

    fn subject(&self) -> String {
        if self.debug {
            format!("***TEST*** {ALERT_SUBJECT}")
        } else {
            ALERT_SUBJECT.to_string()
        }
    }

    fn render(&self, outcome: &ScrapeOutcome, ref_id: &str) -> String {
        let link = if outcome.link.is_empty() {
            outcome
                .response_chain
                .final_hop()
                .map(|h| h.url.as_str())
                .unwrap_or("<unknown>")
        } else {
            outcome.link
        };
        let mut body = format!(
            "{subject}\n{hotel} has rooms.",
            subject = self.subject(),
            hotel = outcome.friendly_name,
        );
        if !outcome.phone.is_empty() {
            body.push_str(&format!(" Call {}.", outcome.phone));
        }
        body.push_str(&format!(" Book now: {link} ref={ref_id}"));
        body
    }

    /// Assemble the multipart email: alert text, the raw page that
    /// triggered the detection, and the session cookies, so the detection
    /// can be verified without re-scraping.
    fn build_email(&self, outcome: &ScrapeOutcome, body: &str) -> Result<Message> {
        let smtp = self
            .smtp
            .as_ref()
            .ok_or_else(|| anyhow!("email enabled but smtp settings missing"))?;

        let mut builder = Message::builder()
            .from(smtp.from_address.parse::<Mailbox>()?)
            .subject(self.subject());
        let mut addressed = false;
        for recipient in &self.recipients {
            if let Some(addr) = &recipient.email {
                builder = builder.to(addr.parse::<Mailbox>()?);
                addressed = true;
            }
        }
        if !addressed {
            return Err(anyhow!("no recipients with an email address"));
        }

        let cookies = serde_json::to_string_pretty(&outcome.session_state)?;
        let message = builder.multipart(
            MultiPart::mixed()
                .singlepart(SinglePart::plain(body.to_string()))
                .singlepart(
                    Attachment::new("raw_response.html".to_string())
                        .body(outcome.raw_content.clone(), ContentType::TEXT_HTML),
                )
                .singlepart(
                    Attachment::new("cookies.json".to_string())
                        .body(cookies, ContentType::parse("application/json")?),
                ),
        )?;
        Ok(message)
    }

    async fn send_email(&self, outcome: &ScrapeOutcome, body: &str) -> Result<()> {
        let message = self.build_email(outcome, body)?;
        let smtp = self
            .smtp
            .as_ref()
            .ok_or_else(|| anyhow!("email enabled but smtp settings missing"))?;
        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&smtp.server)
            .context("smtp relay setup")?
            .credentials(Credentials::new(
                smtp.username.clone(),
                smtp.password.clone(),
            ))
            .build();
        mailer.send(message).await.context("smtp delivery")?;
        Ok(())
    }
}

/// Trim the alert body to fit a single SMS. Anything longer would need an
/// MMS gateway; the full text still goes out in the email alert.
fn clip_for_sms(body: &str) -> &str {
    if !GatewayClient::needs_mms(body) {
        return body;
    }
    let mut end = SMS_MAX_LEN - 1;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

#[async_trait]
impl NotificationGateway for CommGateway {
    async fn notify(&self, outcome: &ScrapeOutcome, ref_id: Option<Uuid>) -> Result<()> {
        let alert_id = ref_id.unwrap_or_else(Uuid::new_v4);
        let body = self.render(outcome, &alert_id.simple().to_string());
        debug!(ref_id = %alert_id, hotel = outcome.adapter_name, "sending alerts");

        let mut attempted = 0usize;
        let mut failures = 0usize;

        if self.email_enabled {
            attempted += 1;
            match self.send_email(outcome, &body).await {
                Ok(()) => info!(hotel = outcome.adapter_name, "email alert delivered"),
                Err(e) => {
                    failures += 1;
                    warn!(error = %e, "email alert failed");
                }
            }
        }

        if self.sms_enabled {
            let sms_body = clip_for_sms(&body);
            if sms_body.len() < body.len() {
                debug!(hotel = outcome.adapter_name, "alert body clipped to fit one SMS");
            }
            for recipient in &self.recipients {
                attempted += 1;
                match self.client.send_message(&recipient.phone, sms_body).await {
                    Ok(resp) => {
                        info!(
                            to = %recipient.first_name,
                            sid = %resp.sid,
                            "alert delivered"
                        );
                    }
                    Err(e) => {
                        failures += 1;
                        warn!(to = %recipient.first_name, error = %e, "alert delivery failed");
                    }
                }
            }
        }

        if attempted > 0 && failures == attempted {
            return Err(anyhow!("all {failures} alert deliveries failed"));
        }
        Ok(())
    }
}

/// Gateway that only logs; used when alerts are disabled or unconfigured.
#[derive(Debug, Default)]
pub struct LogGateway;

#[async_trait]
impl NotificationGateway for LogGateway {
    async fn notify(&self, outcome: &ScrapeOutcome, ref_id: Option<Uuid>) -> Result<()> {
        info!(
            hotel = outcome.friendly_name,
            ref_id = ?ref_id,
            "AVAILABILITY FOUND (notifications disabled, logging only)"
        );
        Ok(())
    }
}
