//! Versioned model bundle: the four fitted stages produced by one training run.
//!
//! On disk: one JSON header line `{format_version, sha256}` followed by the JSON body.
//! f64 parameters round-trip exactly (serde_json `float_roundtrip`).

use super::{check_dim, Classifier, ClassifierModel, Normalizer, Prediction, Projector};
use crate::config::PipelineConfig;
use crate::corpus::RawRecord;
use crate::error::{IdsError, Result};
use crate::features::{FeatureExtractor, FeatureVector};
use chrono::{DateTime, Utc};
use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::info;

pub const BUNDLE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelBundle {
    pub format_version: u32,
    pub created_at: DateTime<Utc>,
    pub extractor: FeatureExtractor,
    pub projector: Projector,
    pub normalizer: Normalizer,
    pub classifier: ClassifierModel,
}

#[derive(Debug, Serialize, Deserialize)]
struct BundleHeader {
    format_version: u32,
    sha256: String,
}

fn digest_hex(body: &str) -> String {
    let mut h = Sha256::new();
    h.update(body.as_bytes());
    format!("{:x}", h.finalize())
}

fn as_missing(err: IdsError) -> IdsError {
    match err {
        IdsError::NotFitted(stage) => {
            IdsError::ModelNotLoaded(format!("{stage} is not fitted in this bundle"))
        }
        other => other,
    }
}

impl ModelBundle {
    /// Fresh, entirely unfitted bundle for one training run.
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            format_version: BUNDLE_FORMAT_VERSION,
            created_at: Utc::now(),
            extractor: FeatureExtractor::new(),
            projector: Projector::new(config.components),
            normalizer: Normalizer::new(),
            classifier: ClassifierModel::from_config(config),
        }
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_classifier()
    }

    /// Every stage fitted and each stage's output width matches the next stage's input.
    pub fn validate(&self) -> Result<()> {
        let width = self.extractor.dim().map_err(as_missing)?;
        let projection = self.projector.model().map_err(as_missing)?;
        let scaling = self.normalizer.model().map_err(as_missing)?;
        let classifier_dim = self.classifier().input_dim().map_err(as_missing)?;

        check_dim("projector", projection.input_dim(), width)?;
        check_dim("normalizer", scaling.dim(), projection.output_dim())?;
        check_dim(self.classifier().name(), classifier_dim, scaling.dim())?;
        Ok(())
    }

    /// Project then normalize one encoded vector.
    pub fn transform(&self, vector: &FeatureVector) -> Result<Vec<f64>> {
        let projected = self.projector.transform(vector.as_slice())?;
        self.normalizer.transform(&projected)
    }

    /// Encode, project and normalize a batch of records into classifier input rows.
    pub fn transform_records(&self, records: &[RawRecord]) -> Result<Array2<f64>> {
        let encoded = self.extractor.encode_matrix(records)?;
        let projected = self.projector.transform_matrix(&encoded)?;
        self.normalizer.transform_matrix(&projected)
    }

    pub fn classify_vector(&self, vector: &FeatureVector) -> Result<Prediction> {
        let normalized = self.transform(vector)?;
        self.classifier().score(ArrayView1::from(normalized.as_slice()))
    }

    pub fn classify_record(&self, record: &RawRecord) -> Result<Prediction> {
        let vector = self.extractor.encode_training(record)?;
        self.classify_vector(&vector)
    }

    pub fn to_artifact(&self) -> Result<String> {
        let body = serde_json::to_string(self)?;
        let header = BundleHeader {
            format_version: self.format_version,
            sha256: digest_hex(&body),
        };
        Ok(format!("{}\n{}", serde_json::to_string(&header)?, body))
    }

    pub fn from_artifact(artifact: &str) -> Result<Self> {
        let (header_line, body) = artifact
            .split_once('\n')
            .ok_or_else(|| IdsError::ArtifactCorrupted("missing bundle header".into()))?;
        let header: BundleHeader = serde_json::from_str(header_line)
            .map_err(|e| IdsError::ArtifactCorrupted(format!("bad header: {e}")))?;
        if header.format_version != BUNDLE_FORMAT_VERSION {
            return Err(IdsError::ArtifactCorrupted(format!(
                "bundle format {} unsupported (expected {})",
                header.format_version, BUNDLE_FORMAT_VERSION
            )));
        }
        let actual = digest_hex(body);
        if actual != header.sha256 {
            return Err(IdsError::ArtifactCorrupted(format!(
                "checksum mismatch: header {}, body {}",
                header.sha256, actual
            )));
        }
        let bundle: ModelBundle = serde_json::from_str(body)?;
        bundle.validate()?;
        Ok(bundle)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_artifact()?)?;
        info!(path = %path.display(), classifier = self.classifier().name(), "model bundle saved");
        Ok(())
    }

    /// Load a trained bundle. A missing file is `ModelNotLoaded`.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(IdsError::ModelNotLoaded(format!(
                "no model bundle at {}",
                path.display()
            )));
        }
        let artifact = std::fs::read_to_string(path)?;
        let bundle = Self::from_artifact(&artifact)?;
        info!(
            path = %path.display(),
            classifier = bundle.classifier().name(),
            created_at = %bundle.created_at,
            "model bundle loaded"
        );
        Ok(bundle)
    }
}
