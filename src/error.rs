//! Error types shared by the feature pipeline, model stages and bundle I/O.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IdsError {
    /// A vector's length disagrees with what a fitted stage expects
    #[error("schema mismatch in {stage}: expected {expected} features, got {got}")]
    SchemaMismatch {
        stage: &'static str,
        expected: usize,
        got: usize,
    },

    /// Stage used before `fit`
    #[error("{0} has not been fitted")]
    NotFitted(&'static str),

    /// Second `fit` on a stage that already holds learned parameters
    #[error("{0} is already fitted; retrain into a fresh pipeline instead")]
    AlreadyFitted(&'static str),

    #[error("model not loaded: {0}")]
    ModelNotLoaded(String),

    #[error("empty input: {0}")]
    EmptyInput(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("corpus line {line}: {reason}")]
    Corpus { line: u64, reason: String },

    #[error("packet record at line {line}: {reason}")]
    PacketDecode { line: u64, reason: String },

    #[error("model artifact corrupted: {0}")]
    ArtifactCorrupted(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl IdsError {
    /// True for errors that mean "no usable model": a missing artifact or an unfitted stage.
    pub fn is_model_missing(&self) -> bool {
        matches!(self, IdsError::ModelNotLoaded(_) | IdsError::NotFitted(_))
    }
}

pub type Result<T> = std::result::Result<T, IdsError>;
