//! Per-dimension standardization learned from projected training vectors.

use super::{check_dim, Stage};
use crate::error::{IdsError, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

const STAGE: &str = "normalizer";
const DEGENERATE_STD: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationModel {
    pub mean: Vec<f64>,
    /// Population standard deviation; exactly 0.0 marks a degenerate dimension
    pub std: Vec<f64>,
}

impl NormalizationModel {
    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    pub fn degenerate_dims(&self) -> Vec<usize> {
        self.std
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == 0.0)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn transform(&self, x: &[f64]) -> Result<Vec<f64>> {
        check_dim(STAGE, self.dim(), x.len())?;
        Ok(x.iter()
            .zip(self.mean.iter().zip(&self.std))
            .map(|(v, (m, s))| if *s == 0.0 { 0.0 } else { (v - m) / s })
            .collect())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Normalizer {
    model: Stage<NormalizationModel>,
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_fitted(&self) -> bool {
        self.model.is_fitted()
    }

    pub fn model(&self) -> Result<&NormalizationModel> {
        self.model.get(STAGE)
    }

    pub fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        if self.model.is_fitted() {
            return Err(IdsError::AlreadyFitted(STAGE));
        }
        let n = x.nrows();
        if n == 0 {
            return Err(IdsError::EmptyInput("normalizer needs at least one row".into()));
        }

        let mut mean = Vec::with_capacity(x.ncols());
        let mut std = Vec::with_capacity(x.ncols());
        for col in x.columns() {
            let m = col.sum() / n as f64;
            let var = col.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / n as f64;
            let s = var.sqrt();
            mean.push(m);
            std.push(if s < DEGENERATE_STD * m.abs().max(1.0) { 0.0 } else { s });
        }

        let model = NormalizationModel { mean, std };
        let degenerate = model.degenerate_dims();
        if !degenerate.is_empty() {
            warn!(dims = ?degenerate, "zero-variance dimensions normalize to 0");
        }
        info!(dim = model.dim(), "normalizer fitted");
        self.model.set(STAGE, model)
    }

    pub fn transform(&self, x: &[f64]) -> Result<Vec<f64>> {
        self.model()?.transform(x)
    }

    pub fn transform_matrix(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let model = self.model()?;
        let mut out = Array2::<f64>::zeros(x.dim());
        for (row, mut dst) in x.rows().into_iter().zip(out.rows_mut()) {
            let scaled = model.transform(&row.to_vec())?;
            for (d, v) in dst.iter_mut().zip(scaled) {
                *d = v;
            }
        }
        Ok(out)
    }
}
