//! Alert dispatch: channel isolation, audit entries and severity grading.

use ids_agent::{
    alert::{
        AlertChannel, AlertDispatcher, AlertEvent, AuditSink, ChannelError, DispatchReport,
        Severity, SeverityEngine,
    },
    config::{AlertsConfig, SmsConfig},
    features::Label,
    model::Prediction,
    storage::AuditStore,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

struct FailingSms;

impl AlertChannel for FailingSms {
    fn name(&self) -> &'static str {
        "sms"
    }

    fn send(&self, _event: &AlertEvent) -> Result<(), ChannelError> {
        Err(ChannelError::Rejected {
            status: 401,
            body: "authenticate".into(),
        })
    }
}

struct RecordingEmail(Arc<AtomicUsize>);

impl AlertChannel for RecordingEmail {
    fn name(&self) -> &'static str {
        "email"
    }

    fn send(&self, _event: &AlertEvent) -> Result<(), ChannelError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct Panicking;

impl AlertChannel for Panicking {
    fn name(&self) -> &'static str {
        "webhook"
    }

    fn send(&self, _event: &AlertEvent) -> Result<(), ChannelError> {
        panic!("transport bug")
    }
}

/// Keeps every report it is handed, in order.
#[derive(Clone, Default)]
struct MemorySink(Arc<Mutex<Vec<DispatchReport>>>);

impl AuditSink for MemorySink {
    fn record(&self, _event: &AlertEvent, report: &DispatchReport) -> Result<(), ChannelError> {
        self.0.lock().unwrap().push(report.clone());
        Ok(())
    }
}

/// Slow transport that notes how many audit writes happened before it ran.
struct SlowSms {
    sink: MemorySink,
    seen: Arc<AtomicUsize>,
}

impl AlertChannel for SlowSms {
    fn name(&self) -> &'static str {
        "sms"
    }

    fn send(&self, _event: &AlertEvent) -> Result<(), ChannelError> {
        self.seen.store(self.sink.0.lock().unwrap().len(), Ordering::SeqCst);
        std::thread::sleep(std::time::Duration::from_millis(50));
        Ok(())
    }
}

fn attack_event() -> AlertEvent {
    let prediction = Prediction {
        label: Label::Attack,
        confidence: 0.93,
    };
    AlertEvent::new(
        "192.168.0.10".parse().unwrap(),
        "10.0.0.1".parse().unwrap(),
        Severity::High,
        &prediction,
        "svm",
    )
}

#[test]
fn failing_sms_does_not_block_email_or_audit() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.db");
    let sent = Arc::new(AtomicUsize::new(0));

    let dispatcher = AlertDispatcher::new()
        .with_channel(FailingSms)
        .with_channel(RecordingEmail(sent.clone()))
        .with_audit(AuditStore::open(&path, b"test-secret").unwrap());
    assert_eq!(dispatcher.channel_names(), vec!["sms", "email"]);

    let event = attack_event();
    let report = dispatcher.dispatch(&event);

    assert_eq!(sent.load(Ordering::SeqCst), 1);
    assert!(report.delivered("email"));
    assert!(!report.delivered("sms"));
    assert_eq!(report.failures().count(), 1);
    assert!(report.audited);

    let store = AuditStore::open(&path, b"test-secret").unwrap();
    assert_eq!(store.count().unwrap(), 1);
    let entry = store.get(&event.id).unwrap().unwrap();
    assert_eq!(entry.event, event);
    assert_eq!(entry.report.outcomes.len(), 2);
}

#[test]
fn audit_entry_exists_before_channels_run() {
    let sink = MemorySink::default();
    let seen = Arc::new(AtomicUsize::new(0));
    let dispatcher = AlertDispatcher::new()
        .with_channel(SlowSms {
            sink: sink.clone(),
            seen: seen.clone(),
        })
        .with_audit(sink.clone());

    let report = dispatcher.dispatch(&attack_event());
    assert_eq!(seen.load(Ordering::SeqCst), 1);
    assert!(report.audited);
    assert!(report.delivered("sms"));

    let writes = sink.0.lock().unwrap();
    assert_eq!(writes.len(), 2);
    assert!(writes[0].outcomes.is_empty());
    assert_eq!(writes[1], report);
}

#[test]
fn panicking_channel_is_reported_as_failure() {
    let sent = Arc::new(AtomicUsize::new(0));
    let dispatcher = AlertDispatcher::new()
        .with_channel(Panicking)
        .with_channel(RecordingEmail(sent.clone()));
    let report = dispatcher.dispatch(&attack_event());
    assert_eq!(sent.load(Ordering::SeqCst), 1);
    assert!(!report.delivered("webhook"));
    assert!(!report.audited);
}

#[test]
fn audit_store_wrong_secret_cannot_decrypt() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.db");
    let event = attack_event();
    {
        let dispatcher =
            AlertDispatcher::new().with_audit(AuditStore::open(&path, b"right").unwrap());
        assert!(dispatcher.dispatch(&event).audited);
    }
    let other = AuditStore::open(&path, b"wrong").unwrap();
    assert!(other.get(&event.id).is_err());
    assert!(other.get("missing").unwrap().is_none());
    assert_eq!(other.prune_before(i64::MAX).unwrap(), 1);
    assert_eq!(other.count().unwrap(), 0);
}

#[test]
fn incomplete_sms_config_builds_no_channel() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = AlertsConfig::default();
    config.sms = SmsConfig {
        enabled: true,
        account_sid: Some("AC123".into()),
        ..SmsConfig::default()
    };
    config.audit.enabled = false;
    let dispatcher = AlertDispatcher::from_config(&config, &dir.path().join("audit.db")).unwrap();
    assert!(dispatcher.channel_names().is_empty());
}

#[test]
fn severity_thresholds() {
    let engine = SeverityEngine::default();
    assert_eq!(engine.grade(0.55), Severity::Low);
    assert_eq!(engine.grade(0.7), Severity::Medium);
    assert_eq!(engine.grade(0.89), Severity::Medium);
    assert_eq!(engine.grade(0.9), Severity::High);
    assert!(Severity::High > Severity::Low);
}

#[test]
fn event_message_names_both_addresses() {
    let event = attack_event();
    let message = event.message();
    assert!(message.contains("192.168.0.10"));
    assert!(message.contains("10.0.0.1"));
    assert!(message.contains("high"));
    assert_eq!(event.id.len(), 36);
}
