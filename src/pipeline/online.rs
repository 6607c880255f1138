//! Per-packet detection: extract → classify → (alert on attack) → idle.
//!
//! Packets are independent; no flow state survives between calls. The bundle is shared
//! read-only, so `process` can be called from several threads at once.

use crate::alert::{AlertDispatcher, AlertEvent, DispatchReport, SeverityEngine};
use crate::capture::{PacketSource, RawPacket};
use crate::error::{IdsError, Result};
use crate::features::Label;
use crate::logging::{StructuredLogger, VerdictLine};
use crate::model::{ModelBundle, Prediction};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum PipelineState {
    Idle = 0,
    Extracting = 1,
    Classifying = 2,
    Alerting = 3,
}

impl PipelineState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => PipelineState::Extracting,
            2 => PipelineState::Classifying,
            3 => PipelineState::Alerting,
            _ => PipelineState::Idle,
        }
    }
}

#[derive(Debug, Default)]
pub struct PipelineStats {
    received: AtomicU64,
    skipped: AtomicU64,
    classified: AtomicU64,
    attacks: AtomicU64,
    errors: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub received: u64,
    /// Packets without a network-layer header
    pub skipped: u64,
    pub classified: u64,
    pub attacks: u64,
    pub errors: u64,
}

impl PipelineStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            classified: self.classified.load(Ordering::Relaxed),
            attacks: self.attacks.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Outcome of one packet.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// No network-layer header; nothing was classified
    Skipped,
    Normal(Prediction),
    Attack {
        prediction: Prediction,
        event: AlertEvent,
        report: DispatchReport,
    },
}

impl Verdict {
    pub fn label(&self) -> Option<Label> {
        match self {
            Verdict::Skipped => None,
            Verdict::Normal(p) => Some(p.label),
            Verdict::Attack { .. } => Some(Label::Attack),
        }
    }

    pub fn is_attack(&self) -> bool {
        matches!(self, Verdict::Attack { .. })
    }
}

pub struct DetectionPipeline {
    bundle: Arc<ModelBundle>,
    dispatcher: AlertDispatcher,
    severity: SeverityEngine,
    stats: PipelineStats,
    state: AtomicU8,
}

impl DetectionPipeline {
    /// Refuses a bundle with any unfitted stage.
    pub fn new(
        bundle: Arc<ModelBundle>,
        dispatcher: AlertDispatcher,
        severity: SeverityEngine,
    ) -> Result<Self> {
        bundle.validate()?;
        Ok(Self {
            bundle,
            dispatcher,
            severity,
            stats: PipelineStats::default(),
            state: AtomicU8::new(PipelineState::Idle as u8),
        })
    }

    pub fn bundle(&self) -> &Arc<ModelBundle> {
        &self.bundle
    }

    pub fn state(&self) -> PipelineState {
        PipelineState::from_u8(self.state.load(Ordering::Relaxed))
    }

    fn enter(&self, state: PipelineState) {
        self.state.store(state as u8, Ordering::Relaxed);
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Classify one packet, dispatching an alert when it is an attack.
    pub fn process(&self, packet: &RawPacket) -> Result<Verdict> {
        self.stats.received.fetch_add(1, Ordering::Relaxed);
        let result = self.process_inner(packet);
        if result.is_err() {
            self.stats.errors.fetch_add(1, Ordering::Relaxed);
        }
        self.enter(PipelineState::Idle);
        result
    }

    fn process_inner(&self, packet: &RawPacket) -> Result<Verdict> {
        self.enter(PipelineState::Extracting);
        let (Some(ip), Some(vector)) = (packet.ip.as_ref(), self.bundle.extractor.encode_live(packet)?)
        else {
            self.stats.skipped.fetch_add(1, Ordering::Relaxed);
            debug!(len = packet.len, "packet skipped: no network-layer header");
            return Ok(Verdict::Skipped);
        };

        self.enter(PipelineState::Classifying);
        let prediction = self.bundle.classify_vector(&vector)?;
        self.stats.classified.fetch_add(1, Ordering::Relaxed);
        if prediction.label == Label::Normal {
            return Ok(Verdict::Normal(prediction));
        }

        self.enter(PipelineState::Alerting);
        self.stats.attacks.fetch_add(1, Ordering::Relaxed);
        let severity = self.severity.grade(prediction.confidence);
        let event = AlertEvent::new(
            ip.src,
            ip.dst,
            severity,
            &prediction,
            self.bundle.classifier().name(),
        );
        warn!(
            alert_id = %event.id,
            src = %event.src,
            dst = %event.dst,
            severity = severity.as_str(),
            confidence = prediction.confidence,
            "intrusion detected"
        );
        let report = self.dispatcher.dispatch(&event);
        Ok(Verdict::Attack {
            prediction,
            event,
            report,
        })
    }

    /// Drain `source` until it is exhausted or `stop` is set, writing one verdict line
    /// per classified packet to `out`. Undecodable packets and per-packet failures are
    /// logged and counted; I/O failures on the source end the run.
    pub fn run<S: PacketSource>(
        &self,
        source: &mut S,
        stop: &AtomicBool,
        out: &mut impl Write,
    ) -> Result<StatsSnapshot> {
        info!(classifier = self.bundle.classifier().name(), "detection loop started");
        while !stop.load(Ordering::Relaxed) {
            let packet = match source.next_packet() {
                Ok(Some(p)) => p,
                Ok(None) => break,
                Err(e @ (IdsError::PacketDecode { .. } | IdsError::Json(_))) => {
                    self.stats.errors.fetch_add(1, Ordering::Relaxed);
                    warn!(error = %e, "undecodable packet record");
                    continue;
                }
                Err(e) => return Err(e),
            };
            let verdict = match self.process(&packet) {
                Ok(v) => v,
                Err(e) => {
                    warn!(error = %e, "packet classification failed");
                    continue;
                }
            };
            if let Some(line) = verdict_line(&packet, &verdict) {
                StructuredLogger::emit_json(&line, out)?;
            }
        }
        let stats = self.stats();
        info!(
            received = stats.received,
            skipped = stats.skipped,
            classified = stats.classified,
            attacks = stats.attacks,
            errors = stats.errors,
            "detection loop stopped"
        );
        Ok(stats)
    }
}

fn verdict_line(packet: &RawPacket, verdict: &Verdict) -> Option<VerdictLine> {
    let ip = packet.ip.as_ref()?;
    let (prediction, severity, alert_id) = match verdict {
        Verdict::Skipped => return None,
        Verdict::Normal(p) => (p, None, None),
        Verdict::Attack {
            prediction, event, ..
        } => (prediction, Some(event.severity), Some(event.id.clone())),
    };
    Some(VerdictLine {
        ts: Utc::now(),
        src: ip.src,
        dst: ip.dst,
        label: prediction.label,
        confidence: prediction.confidence,
        severity,
        alert_id,
    })
}
