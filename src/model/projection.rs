//! Principal-component projection L → K, fitted once on the encoded training matrix.

use super::{check_dim, Stage};
use crate::error::{IdsError, Result};
use nalgebra::{DMatrix, SymmetricEigen};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{debug, info};

const STAGE: &str = "projector";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectionModel {
    /// Training mean per input dimension (length L)
    pub mean: Vec<f64>,
    /// K unit-length principal axes, each of length L, by descending variance
    pub components: Vec<Vec<f64>>,
    pub explained_variance: Vec<f64>,
    pub explained_variance_ratio: Vec<f64>,
}

impl ProjectionModel {
    pub fn input_dim(&self) -> usize {
        self.mean.len()
    }

    pub fn output_dim(&self) -> usize {
        self.components.len()
    }

    pub fn transform(&self, x: &[f64]) -> Result<Vec<f64>> {
        check_dim(STAGE, self.input_dim(), x.len())?;
        Ok(self
            .components
            .iter()
            .map(|axis| {
                axis.iter()
                    .zip(x.iter().zip(&self.mean))
                    .map(|(a, (v, m))| a * (v - m))
                    .sum()
            })
            .collect())
    }

    /// Map a reduced vector back into the input space (mean + Σ z_k · axis_k).
    pub fn reconstruct(&self, z: &[f64]) -> Result<Vec<f64>> {
        check_dim(STAGE, self.output_dim(), z.len())?;
        let mut out = self.mean.clone();
        for (axis, zk) in self.components.iter().zip(z) {
            for (o, a) in out.iter_mut().zip(axis) {
                *o += zk * a;
            }
        }
        Ok(out)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Projector {
    components: usize,
    model: Stage<ProjectionModel>,
}

impl Projector {
    pub fn new(components: usize) -> Self {
        Self {
            components,
            model: Stage::Unfitted,
        }
    }

    pub fn components(&self) -> usize {
        self.components
    }

    pub fn is_fitted(&self) -> bool {
        self.model.is_fitted()
    }

    pub fn model(&self) -> Result<&ProjectionModel> {
        self.model.get(STAGE)
    }

    pub fn fit(&mut self, x: &Array2<f64>) -> Result<()> {
        if self.model.is_fitted() {
            return Err(IdsError::AlreadyFitted(STAGE));
        }
        let (n, l) = x.dim();
        if n == 0 {
            return Err(IdsError::EmptyInput("projector needs at least one row".into()));
        }
        let k = self.components;
        if k == 0 || k > l {
            return Err(IdsError::InvalidConfig(format!(
                "{k} components requested for {l} input dimensions"
            )));
        }

        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| IdsError::EmptyInput("projector needs at least one row".into()))?;
        let centered = x - &mean;
        let denom = if n > 1 { (n - 1) as f64 } else { 1.0 };
        let cov = centered.t().dot(&centered) / denom;
        if cov.iter().any(|v| !v.is_finite()) {
            return Err(IdsError::InvalidConfig(
                "training matrix has non-finite values".into(),
            ));
        }

        let (values, vectors) = symmetric_eigen(&cov);
        let mut order: Vec<usize> = (0..l).collect();
        order.sort_by(|&a, &b| {
            values[b]
                .partial_cmp(&values[a])
                .unwrap_or(Ordering::Equal)
                .then(a.cmp(&b))
        });

        let total: f64 = values.iter().map(|v| v.max(0.0)).sum();
        let mut components = Vec::with_capacity(k);
        let mut explained_variance = Vec::with_capacity(k);
        for &idx in order.iter().take(k) {
            let mut axis: Vec<f64> = vectors.column(idx).iter().copied().collect();
            orient(&mut axis);
            components.push(axis);
            explained_variance.push(values[idx].max(0.0));
        }
        let explained_variance_ratio = explained_variance
            .iter()
            .map(|v| if total > 0.0 { v / total } else { 0.0 })
            .collect::<Vec<_>>();

        info!(
            rows = n,
            input_dim = l,
            output_dim = k,
            retained_variance = explained_variance_ratio.iter().sum::<f64>(),
            "projection fitted"
        );

        self.model.set(
            STAGE,
            ProjectionModel {
                mean: mean.to_vec(),
                components,
                explained_variance,
                explained_variance_ratio,
            },
        )
    }

    pub fn transform(&self, x: &[f64]) -> Result<Vec<f64>> {
        self.model()?.transform(x)
    }

    /// Row-by-row through `transform`, so batch and single-vector output are identical.
    pub fn transform_matrix(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let model = self.model()?;
        let mut out = Array2::<f64>::zeros((x.nrows(), model.output_dim()));
        for (row, mut dst) in x.rows().into_iter().zip(out.rows_mut()) {
            let projected = model.transform(&row.to_vec())?;
            for (d, v) in dst.iter_mut().zip(projected) {
                *d = v;
            }
        }
        Ok(out)
    }
}

/// Flip so the largest-magnitude entry (first one on ties) is positive.
fn orient(axis: &mut [f64]) {
    let mut pivot = 0;
    for (i, v) in axis.iter().enumerate() {
        if v.abs() > axis[pivot].abs() {
            pivot = i;
        }
    }
    if axis.get(pivot).map_or(false, |v| *v < 0.0) {
        for v in axis.iter_mut() {
            *v = -*v;
        }
    }
}

/// Eigenvalues of a symmetric matrix and a matrix whose columns are the matching unit
/// eigenvectors, in solver order.
fn symmetric_eigen(cov: &Array2<f64>) -> (Vec<f64>, DMatrix<f64>) {
    let n = cov.nrows();
    let m = DMatrix::from_fn(n, n, |i, j| cov[[i, j]]);
    let eigen = SymmetricEigen::new(m);
    debug!(dim = n, "covariance decomposed");
    (eigen.eigenvalues.iter().copied().collect(), eigen.eigenvectors)
}
