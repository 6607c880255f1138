//! Fitted pipeline stages: projection, normalization and the two classifiers,
//! plus the versioned bundle that carries them from training to detection.

mod bundle;
mod knn;
mod linear;
mod projection;
mod scaler;

pub use bundle::{ModelBundle, BUNDLE_FORMAT_VERSION};
pub use knn::{get_accuracy, predict_neighbors, NearestNeighbors, NeighborModel};
pub use linear::{LinearModel, LinearSvm};
pub use projection::{ProjectionModel, Projector};
pub use scaler::{NormalizationModel, Normalizer};

use crate::config::{ClassifierKind, PipelineConfig};
use crate::error::{IdsError, Result};
use crate::features::Label;
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// Unfitted/Fitted state of one pipeline stage. Parameters are set exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "params", rename_all = "snake_case")]
pub enum Stage<M> {
    Unfitted,
    Fitted(M),
}

impl<M> Default for Stage<M> {
    fn default() -> Self {
        Stage::Unfitted
    }
}

impl<M> Stage<M> {
    pub fn is_fitted(&self) -> bool {
        matches!(self, Stage::Fitted(_))
    }

    pub fn get(&self, stage: &'static str) -> Result<&M> {
        match self {
            Stage::Fitted(m) => Ok(m),
            Stage::Unfitted => Err(IdsError::NotFitted(stage)),
        }
    }

    pub fn set(&mut self, stage: &'static str, model: M) -> Result<()> {
        if self.is_fitted() {
            return Err(IdsError::AlreadyFitted(stage));
        }
        *self = Stage::Fitted(model);
        Ok(())
    }
}

pub(crate) fn check_dim(stage: &'static str, expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(IdsError::SchemaMismatch {
            stage,
            expected,
            got,
        });
    }
    Ok(())
}

/// Label plus how strongly the classifier backs it (0.0–1.0).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub label: Label,
    pub confidence: f64,
}

/// Shared capability of both classifiers. `predict` never mutates the model.
pub trait Classifier: Send + Sync {
    fn name(&self) -> &'static str;

    /// Learn from normalized training rows. Runs once.
    fn fit(&mut self, x: &Array2<f64>, y: &[Label]) -> Result<()>;

    fn score(&self, x: ArrayView1<'_, f64>) -> Result<Prediction>;

    fn predict(&self, x: ArrayView1<'_, f64>) -> Result<Label> {
        Ok(self.score(x)?.label)
    }

    fn predict_batch(&self, x: &Array2<f64>) -> Result<Vec<Label>> {
        x.rows().into_iter().map(|r| self.predict(r)).collect()
    }

    fn is_fitted(&self) -> bool;

    /// Width of the vectors the fitted model accepts
    fn input_dim(&self) -> Result<usize>;
}

/// Persisted form of whichever classifier was trained.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifierModel {
    Svm(LinearSvm),
    Knn(NearestNeighbors),
}

impl ClassifierModel {
    pub fn from_config(config: &PipelineConfig) -> Self {
        match config.classifier {
            ClassifierKind::Svm => ClassifierModel::Svm(LinearSvm::new(config.svm.clone())),
            ClassifierKind::Knn => ClassifierModel::Knn(NearestNeighbors::new(config.knn.k)),
        }
    }

    pub fn as_classifier(&self) -> &dyn Classifier {
        match self {
            ClassifierModel::Svm(c) => c,
            ClassifierModel::Knn(c) => c,
        }
    }

    pub fn as_classifier_mut(&mut self) -> &mut dyn Classifier {
        match self {
            ClassifierModel::Svm(c) => c,
            ClassifierModel::Knn(c) => c,
        }
    }
}
