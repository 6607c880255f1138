//! Linear margin classifier: hinge loss, L2 penalty, plain SGD over seeded shuffles.

use super::{check_dim, Classifier, Prediction, Stage};
use crate::config::SvmParams;
use crate::error::{IdsError, Result};
use crate::features::Label;
use ndarray::{Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

const STAGE: &str = "linear svm";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub weights: Vec<f64>,
    pub bias: f64,
    /// Epochs actually run
    pub epochs: usize,
    /// Stopped on the tolerance rule rather than `max_iter`
    pub converged: bool,
}

impl LinearModel {
    /// Signed distance-like score; positive means attack.
    pub fn decision(&self, x: &[f64]) -> Result<f64> {
        check_dim(STAGE, self.weights.len(), x.len())?;
        Ok(dot(&self.weights, x) + self.bias)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearSvm {
    params: SvmParams,
    model: Stage<LinearModel>,
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

impl LinearSvm {
    pub fn new(params: SvmParams) -> Self {
        Self {
            params,
            model: Stage::Unfitted,
        }
    }

    pub fn params(&self) -> &SvmParams {
        &self.params
    }

    pub fn model(&self) -> Result<&LinearModel> {
        self.model.get(STAGE)
    }

    fn validate(&self) -> Result<()> {
        let p = &self.params;
        if p.max_iter == 0 || p.n_iter_no_change == 0 {
            return Err(IdsError::InvalidConfig(
                "svm max_iter and n_iter_no_change must be positive".into(),
            ));
        }
        if !(p.alpha > 0.0) || !(p.eta0 > 0.0) {
            return Err(IdsError::InvalidConfig(
                "svm alpha and eta0 must be positive".into(),
            ));
        }
        Ok(())
    }
}

impl Classifier for LinearSvm {
    fn name(&self) -> &'static str {
        "svm"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &[Label]) -> Result<()> {
        if self.model.is_fitted() {
            return Err(IdsError::AlreadyFitted(STAGE));
        }
        self.validate()?;
        let (n, dim) = x.dim();
        check_dim(STAGE, n, y.len())?;
        if n == 0 {
            return Err(IdsError::EmptyInput("svm needs training rows".into()));
        }
        for class in [Label::Normal, Label::Attack] {
            if !y.contains(&class) {
                return Err(IdsError::EmptyInput(format!("no {class} rows in training labels")));
            }
        }

        let rows: Vec<Vec<f64>> = x.rows().into_iter().map(|r| r.to_vec()).collect();
        let targets: Vec<f64> = y.iter().map(|l| l.as_sign()).collect();

        let SvmParams {
            max_iter,
            tol,
            alpha,
            eta0,
            n_iter_no_change,
            seed,
        } = self.params;
        let t0 = 1.0 / (alpha * eta0);

        let mut rng = StdRng::seed_from_u64(seed);
        let mut order: Vec<usize> = (0..n).collect();
        let mut w = vec![0.0; dim];
        let mut b = 0.0;
        let mut t = 0.0;
        let mut best_loss = f64::INFINITY;
        let mut no_improvement = 0;
        let mut epochs = 0;
        let mut converged = false;

        while epochs < max_iter {
            epochs += 1;
            order.shuffle(&mut rng);
            let mut loss_sum = 0.0;
            for &i in &order {
                t += 1.0;
                let eta = 1.0 / (alpha * (t0 + t));
                let xi = &rows[i];
                let yi = targets[i];
                let margin = yi * (dot(&w, xi) + b);
                loss_sum += (1.0 - margin).max(0.0);

                let decay = 1.0 - eta * alpha;
                for wj in w.iter_mut() {
                    *wj *= decay;
                }
                if margin < 1.0 {
                    for (wj, xj) in w.iter_mut().zip(xi) {
                        *wj += eta * yi * xj;
                    }
                    b += eta * yi;
                }
            }

            let loss = loss_sum / n as f64;
            debug!(epoch = epochs, loss, "svm epoch");
            if loss > best_loss - tol {
                no_improvement += 1;
            } else {
                no_improvement = 0;
            }
            best_loss = best_loss.min(loss);
            if no_improvement >= n_iter_no_change {
                converged = true;
                break;
            }
        }

        if converged {
            info!(epochs, loss = best_loss, "svm trained");
        } else {
            warn!(epochs, loss = best_loss, "svm hit max_iter before converging");
        }
        self.model.set(
            STAGE,
            LinearModel {
                weights: w,
                bias: b,
                epochs,
                converged,
            },
        )
    }

    fn score(&self, x: ArrayView1<'_, f64>) -> Result<Prediction> {
        let margin = self.model()?.decision(&x.to_vec())?;
        Ok(Prediction {
            label: Label::from_score(margin),
            confidence: 1.0 / (1.0 + (-margin.abs()).exp()),
        })
    }

    fn is_fitted(&self) -> bool {
        self.model.is_fitted()
    }

    fn input_dim(&self) -> Result<usize> {
        Ok(self.model()?.weights.len())
    }
}
