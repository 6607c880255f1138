//! Encrypted local audit log of detections.

mod encrypted;

pub use encrypted::{AuditEntry, AuditStore, StoreError};
