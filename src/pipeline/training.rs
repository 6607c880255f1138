//! Offline training driver: fits the four stages once, in order, into a fresh bundle.

use crate::config::PipelineConfig;
use crate::corpus::RawRecord;
use crate::error::{IdsError, Result};
use crate::features::Label;
use crate::model::{get_accuracy, ModelBundle};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub records: usize,
    pub normal: usize,
    pub attack: usize,
    /// Encoded width L before projection
    pub input_dim: usize,
    /// K after projection
    pub components: usize,
    /// Share of total variance kept by the K components
    pub retained_variance: f64,
    pub classifier: String,
}

/// Held-out scoring with attack as the positive class.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub accuracy: f64,
    pub true_positives: usize,
    pub false_positives: usize,
    pub true_negatives: usize,
    pub false_negatives: usize,
}

impl Evaluation {
    pub fn total(&self) -> usize {
        self.true_positives + self.false_positives + self.true_negatives + self.false_negatives
    }

    /// Attacks flagged / attacks present; 0.0 when the corpus has no attacks.
    pub fn detection_rate(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_negatives)
    }

    /// Normal records flagged / normal records present.
    pub fn false_alarm_rate(&self) -> f64 {
        ratio(self.false_positives, self.false_positives + self.true_negatives)
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Fit encoding → projection → normalization → classifier on `records`.
pub fn train(records: &[RawRecord], config: &PipelineConfig) -> Result<(ModelBundle, TrainingReport)> {
    if records.is_empty() {
        return Err(IdsError::EmptyInput("training corpus has no records".into()));
    }
    let labels: Vec<Label> = records.iter().map(|r| r.label).collect();
    let attack = labels.iter().filter(|l| **l == Label::Attack).count();
    let normal = labels.len() - attack;

    let mut bundle = ModelBundle::new(config);

    bundle.extractor.fit(records)?;
    let encoded = bundle.extractor.encode_matrix(records)?;
    info!(rows = encoded.nrows(), cols = encoded.ncols(), "dimensions before reduction");

    bundle.projector.fit(&encoded)?;
    let projected = bundle.projector.transform_matrix(&encoded)?;
    info!(rows = projected.nrows(), cols = projected.ncols(), "dimensions after reduction");

    bundle.normalizer.fit(&projected)?;
    let normalized = bundle.normalizer.transform_matrix(&projected)?;

    bundle.classifier.as_classifier_mut().fit(&normalized, &labels)?;
    bundle.validate()?;

    let retained_variance = bundle
        .projector
        .model()?
        .explained_variance_ratio
        .iter()
        .sum::<f64>();
    let report = TrainingReport {
        records: records.len(),
        normal,
        attack,
        input_dim: encoded.ncols(),
        components: projected.ncols(),
        retained_variance,
        classifier: bundle.classifier().name().to_string(),
    };
    info!(
        records = report.records,
        normal,
        attack,
        retained_variance,
        classifier = %report.classifier,
        "training complete"
    );
    Ok((bundle, report))
}

/// Score a labeled corpus against a trained bundle.
pub fn evaluate(bundle: &ModelBundle, records: &[RawRecord]) -> Result<Evaluation> {
    if records.is_empty() {
        warn!("evaluation corpus is empty");
        return Ok(Evaluation::default());
    }
    let x = bundle.transform_records(records)?;
    let predictions = bundle.classifier().predict_batch(&x)?;
    let truth: Vec<Label> = records.iter().map(|r| r.label).collect();

    let mut eval = Evaluation {
        accuracy: get_accuracy(&predictions, &truth),
        ..Evaluation::default()
    };
    for (p, t) in predictions.iter().zip(&truth) {
        match (p, t) {
            (Label::Attack, Label::Attack) => eval.true_positives += 1,
            (Label::Attack, Label::Normal) => eval.false_positives += 1,
            (Label::Normal, Label::Normal) => eval.true_negatives += 1,
            (Label::Normal, Label::Attack) => eval.false_negatives += 1,
        }
    }
    info!(
        records = eval.total(),
        accuracy = eval.accuracy,
        detection_rate = eval.detection_rate(),
        false_alarm_rate = eval.false_alarm_rate(),
        "evaluation complete"
    );
    Ok(eval)
}
