//! Categorical one-hot encoding fitted once over the training corpus.
//!
//! Numeric attribute `name` becomes feature `name`; categorical `(name, value)` becomes
//! feature `name=value`. Feature names are sorted, and that sorted order is the vector
//! order for every later encode.

use crate::corpus::{AttributeValue, RawRecord};
use crate::error::{IdsError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoricalEncoding {
    /// feature name → column index (indices follow the map's sorted order)
    vocabulary: BTreeMap<String, usize>,
    numeric_count: usize,
    categorical_count: usize,
}

fn feature_key(name: &str, value: &AttributeValue) -> String {
    match value {
        AttributeValue::Numeric(_) => name.to_string(),
        AttributeValue::Categorical(v) => format!("{name}={v}"),
    }
}

impl CategoricalEncoding {
    pub fn fit(records: &[RawRecord]) -> Result<Self> {
        if records.is_empty() {
            return Err(IdsError::EmptyInput("training corpus has no records".into()));
        }
        let mut numeric = BTreeSet::new();
        let mut categorical = BTreeSet::new();
        for r in records {
            for (name, value) in &r.attributes {
                let key = feature_key(name, value);
                match value {
                    AttributeValue::Numeric(_) => numeric.insert(key),
                    AttributeValue::Categorical(_) => categorical.insert(key),
                };
            }
        }

        let names: BTreeSet<&String> = numeric.iter().chain(categorical.iter()).collect();
        let vocabulary = names
            .into_iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect();

        Ok(Self {
            vocabulary,
            numeric_count: numeric.len(),
            categorical_count: categorical.len(),
        })
    }

    /// L: one column per numeric attribute plus one per fitted category value
    pub fn dim(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn numeric_count(&self) -> usize {
        self.numeric_count
    }

    pub fn categorical_count(&self) -> usize {
        self.categorical_count
    }

    /// Feature names in vector order
    pub fn feature_names(&self) -> impl Iterator<Item = &str> {
        self.vocabulary.keys().map(String::as_str)
    }

    pub fn index_of(&self, feature: &str) -> Option<usize> {
        self.vocabulary.get(feature).copied()
    }

    /// Write one record into `out` (length `dim()`, zeroed by the caller).
    /// Returns how many attributes had no fitted column; those contribute zero.
    pub(crate) fn encode_into(
        &self,
        attributes: &BTreeMap<String, AttributeValue>,
        out: &mut [f64],
    ) -> usize {
        let mut unseen = 0;
        for (name, value) in attributes {
            match self.vocabulary.get(&feature_key(name, value)) {
                Some(&i) => {
                    out[i] = match value {
                        AttributeValue::Numeric(v) => *v,
                        AttributeValue::Categorical(_) => 1.0,
                    }
                }
                None => unseen += 1,
            }
        }
        unseen
    }
}
