//! Email alerts through an HTTP mail relay (JSON message, optional basic auth).

use super::{check_response, AlertChannel, AlertEvent, ChannelError};
use crate::config::EmailConfig;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

const SUBJECT: &str = "Intrusion Alert - Network Security";

#[derive(Serialize)]
struct MailPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    body: String,
    alert_id: &'a str,
    severity: &'a str,
}

pub struct EmailChannel {
    client: reqwest::blocking::Client,
    endpoint: String,
    from: String,
    to: String,
    password: Option<String>,
}

impl EmailChannel {
    /// `None` (with a warning) when relay, sender or recipient is missing.
    pub fn new(config: &EmailConfig, timeout: Duration) -> Option<Self> {
        let (Some(endpoint), Some(from), Some(to)) = (
            config.relay_endpoint.as_ref(),
            config.from.as_ref(),
            config.to.as_ref(),
        ) else {
            warn!("email configuration missing (relay_endpoint, EMAIL_ADDRESS, TO_EMAIL); email alerts disabled");
            return None;
        };
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| warn!(error = %e, "email client build failed"))
            .ok()?;
        Some(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            from: from.clone(),
            to: to.clone(),
            password: config.password.clone(),
        })
    }
}

impl AlertChannel for EmailChannel {
    fn name(&self) -> &'static str {
        "email"
    }

    fn send(&self, event: &AlertEvent) -> Result<(), ChannelError> {
        let payload = MailPayload {
            from: &self.from,
            to: &self.to,
            subject: SUBJECT,
            body: event.message(),
            alert_id: &event.id,
            severity: event.severity.as_str(),
        };
        let mut req = self.client.post(&self.endpoint).json(&payload);
        if let Some(password) = &self.password {
            req = req.basic_auth(&self.from, Some(password));
        }
        check_response(req.send()?)?;
        info!(alert_id = %event.id, to = %self.to, "email alert sent");
        Ok(())
    }
}
