//! ids-agent: network intrusion detection from a trained feature pipeline.
//!
//! Modular structure:
//! - [`corpus`]: KDD-style labeled training records
//! - [`capture`]: Decoded packet headers and packet sources
//! - [`features`]: Fixed-order feature extraction for records and live packets
//! - [`model`]: Projection, normalization, classifiers and the model bundle
//! - [`pipeline`]: Offline training and the online detection loop
//! - [`alert`]: Severity grading and multi-channel alert dispatch
//! - [`storage`]: Encrypted audit log of detections
//! - [`logging`]: Structured JSON logging and verdict lines

pub mod alert;
pub mod capture;
pub mod config;
pub mod corpus;
pub mod error;
pub mod features;
pub mod logging;
pub mod model;
pub mod pipeline;
pub mod storage;

pub use alert::{AlertDispatcher, AlertEvent, Severity, SeverityEngine};
pub use capture::{NdjsonReplay, PacketSource, RawPacket};
pub use config::IdsConfig;
pub use corpus::RawRecord;
pub use error::{IdsError, Result};
pub use features::{FeatureExtractor, FeatureVector, Label};
pub use logging::StructuredLogger;
pub use model::{Classifier, ModelBundle, Prediction};
pub use pipeline::{evaluate, train, DetectionPipeline, Verdict};
pub use storage::AuditStore;
