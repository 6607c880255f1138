//! Training and online detection drivers built on the fitted stages.

mod online;
mod training;

pub use online::{DetectionPipeline, PipelineState, PipelineStats, StatsSnapshot, Verdict};
pub use training::{evaluate, train, Evaluation, TrainingReport};
