//! Maps classifier confidence to alert severity with configurable thresholds.

use crate::config::AlertsConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn from_confidence(confidence: f64, high: f64, medium: f64) -> Self {
        if confidence >= high {
            Severity::High
        } else if confidence >= medium {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SeverityEngine {
    high_threshold: f64,
    medium_threshold: f64,
}

impl SeverityEngine {
    pub fn new(config: &AlertsConfig) -> Self {
        Self {
            high_threshold: config.high_threshold,
            medium_threshold: config.medium_threshold,
        }
    }

    pub fn grade(&self, confidence: f64) -> Severity {
        Severity::from_confidence(confidence, self.high_threshold, self.medium_threshold)
    }
}

impl Default for SeverityEngine {
    fn default() -> Self {
        Self::new(&AlertsConfig::default())
    }
}
