//! Alert events and multi-channel dispatch.
//!
//! The audit entry is written before any channel runs, so a hung transport cannot keep
//! a detection out of the log. Channels then run concurrently and fail independently,
//! and the entry is rewritten with their outcomes once every channel has returned.

mod email;
mod severity;
mod sms;

pub use email::EmailChannel;
pub use severity::{Severity, SeverityEngine};
pub use sms::SmsChannel;

use crate::config::AlertsConfig;
use crate::model::Prediction;
use crate::storage::{AuditStore, StoreError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

/// Fallback audit key material when `IDS_AUDIT_SECRET` is unset.
const DEFAULT_AUDIT_SECRET: &[u8] = b"ids-agent-audit-placeholder";

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("audit store: {0}")]
    Audit(#[from] StoreError),

    #[error("channel panicked")]
    Panicked,

    #[error("{0}")]
    Other(String),
}

/// Structured detection event handed to every channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub id: String,
    pub src: IpAddr,
    pub dst: IpAddr,
    pub timestamp: DateTime<Utc>,
    pub severity: Severity,
    pub confidence: f64,
    pub classifier: String,
}

impl AlertEvent {
    pub fn new(
        src: IpAddr,
        dst: IpAddr,
        severity: Severity,
        prediction: &Prediction,
        classifier: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            src,
            dst,
            timestamp: Utc::now(),
            severity,
            confidence: prediction.confidence,
            classifier: classifier.into(),
        }
    }

    pub fn message(&self) -> String {
        format!(
            "Intrusion detected from {} to {} ({} severity). Immediate action required!",
            self.src,
            self.dst,
            self.severity.as_str()
        )
    }
}

/// An outbound notification transport.
///
/// `send` must return within a bounded time (the HTTP channels use the configured
/// request timeout); dispatch waits for every channel before reporting.
pub trait AlertChannel: Send + Sync {
    fn name(&self) -> &'static str;
    fn send(&self, event: &AlertEvent) -> Result<(), ChannelError>;
}

/// Durable record of each detection and what dispatch achieved. Called twice per
/// event with the same id: first with no outcomes, then with the final report.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AlertEvent, report: &DispatchReport) -> Result<(), ChannelError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelOutcome {
    pub channel: String,
    pub delivered: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DispatchReport {
    pub outcomes: Vec<ChannelOutcome>,
    pub audited: bool,
}

impl DispatchReport {
    pub fn delivered(&self, channel: &str) -> bool {
        self.outcomes
            .iter()
            .any(|o| o.channel == channel && o.delivered)
    }

    pub fn failures(&self) -> impl Iterator<Item = &ChannelOutcome> {
        self.outcomes.iter().filter(|o| !o.delivered)
    }
}

/// Check a transport response; non-2xx becomes `Rejected`.
pub(crate) fn check_response(res: reqwest::blocking::Response) -> Result<(), ChannelError> {
    if res.status().is_success() {
        return Ok(());
    }
    let status = res.status().as_u16();
    let body = res.text().unwrap_or_default();
    Err(ChannelError::Rejected { status, body })
}

#[derive(Default)]
pub struct AlertDispatcher {
    channels: Vec<Box<dyn AlertChannel>>,
    audit: Option<Box<dyn AuditSink>>,
}

impl AlertDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_channel(mut self, channel: impl AlertChannel + 'static) -> Self {
        self.channels.push(Box::new(channel));
        self
    }

    pub fn with_audit(mut self, sink: impl AuditSink + 'static) -> Self {
        self.audit = Some(Box::new(sink));
        self
    }

    /// Build the channels the configuration enables. Channels with incomplete
    /// configuration are left out with a warning; a broken audit store is an error.
    pub fn from_config(config: &AlertsConfig, audit_path: &Path) -> Result<Self, ChannelError> {
        let timeout = Duration::from_secs(config.timeout_secs.max(1));
        let mut dispatcher = Self::new();

        if config.email.enabled {
            if let Some(c) = EmailChannel::new(&config.email, timeout) {
                dispatcher = dispatcher.with_channel(c);
            }
        }
        if config.sms.enabled {
            if let Some(c) = SmsChannel::new(&config.sms, timeout) {
                dispatcher = dispatcher.with_channel(c);
            }
        }
        if config.audit.enabled {
            let secret = match config.audit.secret.as_deref() {
                Some(s) => s.as_bytes(),
                None => {
                    warn!("IDS_AUDIT_SECRET unset; audit payloads use the built-in key");
                    DEFAULT_AUDIT_SECRET
                }
            };
            if let Some(parent) = audit_path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| ChannelError::Other(e.to_string()))?;
            }
            dispatcher = dispatcher.with_audit(AuditStore::open(audit_path, secret)?);
        }

        info!(
            channels = ?dispatcher.channel_names(),
            audit = dispatcher.audit.is_some(),
            "alert dispatcher ready"
        );
        Ok(dispatcher)
    }

    pub fn channel_names(&self) -> Vec<&'static str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    /// Write the audit entry, fan out to every channel on its own scoped thread, then
    /// update the entry with the channel outcomes.
    pub fn dispatch(&self, event: &AlertEvent) -> DispatchReport {
        let mut report = DispatchReport::default();
        if let Some(sink) = &self.audit {
            match sink.record(event, &report) {
                Ok(()) => report.audited = true,
                Err(e) => warn!(alert_id = %event.id, error = %e, "audit entry failed"),
            }
        }

        report.outcomes = std::thread::scope(|scope| {
            let pending: Vec<_> = self
                .channels
                .iter()
                .map(|channel| (channel.name(), scope.spawn(move || channel.send(event))))
                .collect();
            pending
                .into_iter()
                .map(|(name, handle)| {
                    let result = handle.join().unwrap_or(Err(ChannelError::Panicked));
                    ChannelOutcome {
                        channel: name.to_string(),
                        delivered: result.is_ok(),
                        error: result.err().map(|e| e.to_string()),
                    }
                })
                .collect()
        });

        for failed in report.failures() {
            warn!(
                alert_id = %event.id,
                channel = %failed.channel,
                error = failed.error.as_deref().unwrap_or(""),
                "alert channel failed"
            );
        }

        if let (Some(sink), true) = (&self.audit, report.audited) {
            if let Err(e) = sink.record(event, &report) {
                warn!(alert_id = %event.id, error = %e, "audit entry not updated with channel outcomes");
            }
        }
        report
    }
}
