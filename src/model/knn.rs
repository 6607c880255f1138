//! Majority-vote nearest neighbors over the full normalized training corpus.
//!
//! Every query scans all N stored rows (O(N·D)); on a full KDD corpus that is hundreds of
//! thousands of distance computations per packet. The linear model is the online default.

use super::{check_dim, Classifier, Prediction, Stage};
use crate::error::{IdsError, Result};
use crate::features::Label;
use ndarray::{Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::info;

const STAGE: &str = "nearest neighbors";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighborModel {
    pub dim: usize,
    /// Row-major training vectors
    pub data: Vec<f64>,
    pub labels: Vec<Label>,
}

impl NeighborModel {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn view(&self) -> Result<ArrayView2<'_, f64>> {
        ArrayView2::from_shape((self.labels.len(), self.dim), self.data.as_slice()).map_err(|_| {
            IdsError::SchemaMismatch {
                stage: STAGE,
                expected: self.labels.len() * self.dim,
                got: self.data.len(),
            }
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NearestNeighbors {
    k: usize,
    model: Stage<NeighborModel>,
}

impl NearestNeighbors {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            model: Stage::Unfitted,
        }
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn model(&self) -> Result<&NeighborModel> {
        self.model.get(STAGE)
    }
}

impl Classifier for NearestNeighbors {
    fn name(&self) -> &'static str {
        "knn"
    }

    fn fit(&mut self, x: &Array2<f64>, y: &[Label]) -> Result<()> {
        if self.model.is_fitted() {
            return Err(IdsError::AlreadyFitted(STAGE));
        }
        if self.k == 0 {
            return Err(IdsError::InvalidConfig("knn k must be positive".into()));
        }
        check_dim(STAGE, x.nrows(), y.len())?;
        if x.nrows() == 0 {
            return Err(IdsError::EmptyInput("knn needs training rows".into()));
        }
        info!(rows = x.nrows(), k = self.k, "knn corpus stored");
        self.model.set(
            STAGE,
            NeighborModel {
                dim: x.ncols(),
                data: x.iter().copied().collect(),
                labels: y.to_vec(),
            },
        )
    }

    fn score(&self, x: ArrayView1<'_, f64>) -> Result<Prediction> {
        let model = self.model()?;
        nearest_vote(model.view()?, &model.labels, &x.to_vec(), self.k)
    }

    fn is_fitted(&self) -> bool {
        self.model.is_fitted()
    }

    fn input_dim(&self) -> Result<usize> {
        Ok(self.model()?.dim)
    }
}

fn squared_distance(a: ArrayView1<'_, f64>, b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Vote among the `k` closest rows. Neighbors are ordered by (distance, row index);
/// on a tied vote the label whose closest member comes first wins.
fn nearest_vote(
    train: ArrayView2<'_, f64>,
    labels: &[Label],
    query: &[f64],
    k: usize,
) -> Result<Prediction> {
    check_dim(STAGE, train.nrows(), labels.len())?;
    check_dim(STAGE, train.ncols(), query.len())?;
    if train.nrows() == 0 {
        return Err(IdsError::EmptyInput("knn has no training rows".into()));
    }
    if k == 0 {
        return Err(IdsError::InvalidConfig("knn k must be positive".into()));
    }
    let k = k.min(train.nrows());

    let mut dists: Vec<(f64, usize)> = train
        .rows()
        .into_iter()
        .enumerate()
        .map(|(i, row)| (squared_distance(row, query), i))
        .collect();
    let by_distance =
        |a: &(f64, usize), b: &(f64, usize)| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1));
    if k < dists.len() {
        dists.select_nth_unstable_by(k - 1, by_distance);
        dists.truncate(k);
    }
    dists.sort_by(by_distance);

    let mut counts = [0usize; 2];
    let mut first_seen = [usize::MAX; 2];
    for (pos, &(_, i)) in dists.iter().enumerate() {
        let slot = labels[i].as_ordinal() as usize;
        counts[slot] += 1;
        first_seen[slot] = first_seen[slot].min(pos);
    }
    let winner = match counts[0].cmp(&counts[1]) {
        Ordering::Greater => 0,
        Ordering::Less => 1,
        Ordering::Equal => {
            if first_seen[0] < first_seen[1] {
                0
            } else {
                1
            }
        }
    };

    Ok(Prediction {
        label: Label::from_ordinal(winner as u8),
        confidence: counts[winner] as f64 / k as f64,
    })
}

/// Majority label among the `k` nearest training rows to `query`.
pub fn predict_neighbors(
    train: ArrayView2<'_, f64>,
    labels: &[Label],
    query: &[f64],
    k: usize,
) -> Result<Label> {
    Ok(nearest_vote(train, labels, query, k)?.label)
}

/// Fraction of positions where the prediction equals the ground truth.
/// Empty predictions score 0.0; a missing ground-truth entry counts as a miss.
pub fn get_accuracy(predictions: &[Label], ground_truth: &[Label]) -> f64 {
    if predictions.is_empty() {
        return 0.0;
    }
    let hits = predictions
        .iter()
        .zip(ground_truth)
        .filter(|(p, t)| p == t)
        .count();
    hits as f64 / predictions.len() as f64
}
