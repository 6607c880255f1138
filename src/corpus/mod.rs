//! Labeled training records and the KDD-style corpus reader.

mod kdd;

pub use kdd::{load_kdd, read_kdd, ColumnKind, KDD_COLUMNS, LABEL_COLUMN};

use crate::features::Label;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Numeric(f64),
    Categorical(String),
}

/// One labeled observation. Attribute order is irrelevant; the fitted encoding fixes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub attributes: BTreeMap<String, AttributeValue>,
    pub label: Label,
}

impl RawRecord {
    pub fn new(label: Label) -> Self {
        Self {
            attributes: BTreeMap::new(),
            label,
        }
    }

    pub fn numeric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.attributes
            .insert(name.into(), AttributeValue::Numeric(value));
        self
    }

    pub fn categorical(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes
            .insert(name.into(), AttributeValue::Categorical(value.into()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }
}
