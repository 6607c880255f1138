//! Feature extraction: training records and live packets → fixed-order numeric vectors.

mod encoding;
mod live;
mod pipeline;

pub use encoding::CategoricalEncoding;
pub use live::{LiveFields, LIVE_FIELD_COUNT, LIVE_FIELD_NAMES};
pub use pipeline::FeatureExtractor;

use serde::{Deserialize, Serialize};

/// Binary verdict shared by every stage. Raw corpus labels collapse to this first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    Normal,
    Attack,
}

impl Label {
    /// Corpus label text: `normal.` (or `normal`) is benign, every attack name is an attack.
    pub fn from_raw(raw: &str) -> Self {
        match raw.trim() {
            "normal." | "normal" => Label::Normal,
            _ => Label::Attack,
        }
    }

    pub fn as_ordinal(self) -> u8 {
        match self {
            Label::Normal => 0,
            Label::Attack => 1,
        }
    }

    pub fn from_ordinal(v: u8) -> Self {
        if v == 0 {
            Label::Normal
        } else {
            Label::Attack
        }
    }

    /// Target for the margin classifier: -1 normal, +1 attack
    pub fn as_sign(self) -> f64 {
        match self {
            Label::Normal => -1.0,
            Label::Attack => 1.0,
        }
    }

    pub fn from_score(score: f64) -> Self {
        if score > 0.0 {
            Label::Attack
        } else {
            Label::Normal
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Label::Normal => "normal",
            Label::Attack => "attack",
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed-width feature vector; field order is defined by the fitted encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub values: Vec<f64>,
}

impl FeatureVector {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn zeros(dim: usize) -> Self {
        Self {
            values: vec![0.0; dim],
        }
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }
}
