//! SQLite audit log of detections. Event payloads are AES-256-GCM encrypted; the key is
//! derived from a secret supplied at open time.

use crate::alert::{AlertEvent, AuditSink, ChannelError, DispatchReport};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rand::RngCore;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("payload encoding: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("payload json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("encryption failure")]
    Crypto,
    #[error("payload too short")]
    Truncated,
    #[error("store lock poisoned")]
    Poisoned,
}

fn derive_key(seed: &[u8]) -> [u8; KEY_LEN] {
    use ring::digest;
    let mut out = [0u8; KEY_LEN];
    let h = digest::digest(&digest::SHA256, seed);
    out[..h.as_ref().len().min(KEY_LEN)].copy_from_slice(h.as_ref());
    out
}

fn encrypt(key: &[u8; KEY_LEN], plaintext: &[u8]) -> Result<String, StoreError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| StoreError::Crypto)?;
    let mut nonce = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce);
    let ciphertext = cipher
        .encrypt((&nonce).into(), plaintext)
        .map_err(|_| StoreError::Crypto)?;
    let mut out = nonce.to_vec();
    out.extend(ciphertext);
    Ok(BASE64.encode(&out))
}

fn decrypt(key: &[u8; KEY_LEN], encoded: &str) -> Result<Vec<u8>, StoreError> {
    let raw = BASE64.decode(encoded)?;
    if raw.len() < NONCE_LEN {
        return Err(StoreError::Truncated);
    }
    let (nonce, ct) = raw.split_at(NONCE_LEN);
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| StoreError::Crypto)?;
    cipher.decrypt(nonce.into(), ct).map_err(|_| StoreError::Crypto)
}

/// Decrypted audit row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub event: AlertEvent,
    pub report: DispatchReport,
}

pub struct AuditStore {
    conn: Mutex<Connection>,
    key: [u8; KEY_LEN],
}

impl AuditStore {
    /// Open or create the store at `path`.
    pub fn open(path: &Path, secret: &[u8]) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS detections (
                id TEXT PRIMARY KEY,
                ts INTEGER NOT NULL,
                src TEXT NOT NULL,
                dst TEXT NOT NULL,
                severity TEXT NOT NULL,
                delivered INTEGER NOT NULL,
                payload_enc TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_detections_ts ON detections(ts);
            "#,
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
            key: derive_key(secret),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    pub fn insert(&self, event: &AlertEvent, report: &DispatchReport) -> Result<(), StoreError> {
        let entry = AuditEntry {
            event: event.clone(),
            report: report.clone(),
        };
        let enc = encrypt(&self.key, serde_json::to_string(&entry)?.as_bytes())?;
        let delivered = report.outcomes.iter().filter(|o| o.delivered).count() as i64;
        self.conn()?.execute(
            "INSERT OR REPLACE INTO detections (id, ts, src, dst, severity, delivered, payload_enc)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                event.id,
                event.timestamp.timestamp_millis(),
                event.src.to_string(),
                event.dst.to_string(),
                event.severity.as_str(),
                delivered,
                enc
            ],
        )?;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Option<AuditEntry>, StoreError> {
        let enc: Option<String> = self
            .conn()?
            .query_row(
                "SELECT payload_enc FROM detections WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        match enc {
            Some(enc) => {
                let plain = decrypt(&self.key, &enc)?;
                Ok(Some(serde_json::from_slice(&plain)?))
            }
            None => Ok(None),
        }
    }

    pub fn count(&self) -> Result<u64, StoreError> {
        let n: i64 = self
            .conn()?
            .query_row("SELECT COUNT(*) FROM detections", [], |row| row.get(0))?;
        Ok(n as u64)
    }

    /// Retention: delete detections older than the given epoch-millis timestamp
    pub fn prune_before(&self, ts: i64) -> Result<u64, StoreError> {
        let n = self
            .conn()?
            .execute("DELETE FROM detections WHERE ts < ?1", params![ts])?;
        Ok(n as u64)
    }
}

impl AuditSink for AuditStore {
    fn record(&self, event: &AlertEvent, report: &DispatchReport) -> Result<(), ChannelError> {
        Ok(self.insert(event, report)?)
    }
}
