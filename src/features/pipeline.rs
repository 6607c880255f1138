//! Feature extraction pipeline: records / packets → fixed-order vectors.

use super::live::{LiveFields, LIVE_FIELD_COUNT};
use super::{CategoricalEncoding, FeatureVector};
use crate::capture::RawPacket;
use crate::corpus::RawRecord;
use crate::error::{IdsError, Result};
use crate::model::Stage;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

const STAGE: &str = "feature extractor";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureExtractor {
    encoding: Stage<CategoricalEncoding>,
}

impl FeatureExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit the categorical encoding over the full training corpus. Runs once.
    pub fn fit(&mut self, records: &[RawRecord]) -> Result<()> {
        if self.encoding.is_fitted() {
            return Err(IdsError::AlreadyFitted(STAGE));
        }
        let encoding = CategoricalEncoding::fit(records)?;
        info!(
            dim = encoding.dim(),
            numeric = encoding.numeric_count(),
            categorical = encoding.categorical_count(),
            "categorical encoding fitted"
        );
        self.encoding.set(STAGE, encoding)
    }

    pub fn is_fitted(&self) -> bool {
        self.encoding.is_fitted()
    }

    pub fn encoding(&self) -> Result<&CategoricalEncoding> {
        self.encoding.get(STAGE)
    }

    /// Vector width L
    pub fn dim(&self) -> Result<usize> {
        Ok(self.encoding()?.dim())
    }

    /// One-hot categoricals, numeric pass-through. Unseen categories encode as zero.
    pub fn encode_training(&self, record: &RawRecord) -> Result<FeatureVector> {
        let encoding = self.encoding()?;
        let mut values = vec![0.0; encoding.dim()];
        let unseen = encoding.encode_into(&record.attributes, &mut values);
        if unseen > 0 {
            trace!(unseen, "attributes without a fitted column encoded as zero");
        }
        Ok(FeatureVector::new(values))
    }

    /// Packet → width-L vector. The live fields fill positions `0..min(L, 10)` in
    /// [`LIVE_FIELD_NAMES`](super::live::LIVE_FIELD_NAMES) order and everything after is zero; fields past L are dropped.
    /// `Ok(None)` when the packet has no network-layer header.
    pub fn encode_live(&self, packet: &RawPacket) -> Result<Option<FeatureVector>> {
        let Some(fields) = LiveFields::from_packet(packet) else {
            debug!(len = packet.len, "packet has no network-layer header");
            return Ok(None);
        };
        let dim = self.dim()?;
        let filled = dim.min(LIVE_FIELD_COUNT);
        if filled < LIVE_FIELD_COUNT {
            trace!(dim, dropped = LIVE_FIELD_COUNT - filled, "live fields truncated to fitted width");
        }
        let mut values = vec![0.0; dim];
        values[..filled].copy_from_slice(&fields.to_array()[..filled]);
        Ok(Some(FeatureVector::new(values)))
    }

    /// Encode a batch into an N × L matrix (rows in input order).
    pub fn encode_matrix(&self, records: &[RawRecord]) -> Result<Array2<f64>> {
        let encoding = self.encoding()?;
        let dim = encoding.dim();
        let mut m = Array2::<f64>::zeros((records.len(), dim));
        for (mut row, record) in m.rows_mut().into_iter().zip(records) {
            let slice = row
                .as_slice_mut()
                .ok_or_else(|| IdsError::InvalidConfig("non-contiguous feature matrix".into()))?;
            encoding.encode_into(&record.attributes, slice);
        }
        Ok(m)
    }
}
