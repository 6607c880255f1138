//! SMS alerts via the Twilio Messages REST API.

use super::{check_response, AlertChannel, AlertEvent, ChannelError};
use crate::config::SmsConfig;
use std::time::Duration;
use tracing::{info, warn};

pub struct SmsChannel {
    client: reqwest::blocking::Client,
    url: String,
    account_sid: String,
    auth_token: String,
    from: String,
    to: String,
}

impl SmsChannel {
    /// `None` (with a warning) when any Twilio credential or number is missing.
    pub fn new(config: &SmsConfig, timeout: Duration) -> Option<Self> {
        let (Some(sid), Some(token), Some(from), Some(to)) = (
            config.account_sid.as_ref(),
            config.auth_token.as_ref(),
            config.from.as_ref(),
            config.to.as_ref(),
        ) else {
            warn!("sms configuration missing (TWILIO_SID, TWILIO_AUTH_TOKEN, TWILIO_PHONE_NUMBER, TO_PHONE_NUMBER); sms alerts disabled");
            return None;
        };
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .map_err(|e| warn!(error = %e, "sms client build failed"))
            .ok()?;
        let url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            config.api_base.trim_end_matches('/'),
            sid
        );
        Some(Self {
            client,
            url,
            account_sid: sid.clone(),
            auth_token: token.clone(),
            from: from.clone(),
            to: to.clone(),
        })
    }
}

impl AlertChannel for SmsChannel {
    fn name(&self) -> &'static str {
        "sms"
    }

    fn send(&self, event: &AlertEvent) -> Result<(), ChannelError> {
        let body = event.message();
        let form = [
            ("To", self.to.as_str()),
            ("From", self.from.as_str()),
            ("Body", body.as_str()),
        ];
        let res = self
            .client
            .post(&self.url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&form)
            .send()?;
        check_response(res)?;
        info!(alert_id = %event.id, to = %self.to, "sms alert sent");
        Ok(())
    }
}
