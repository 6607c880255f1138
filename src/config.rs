//! Agent configuration. Transport secrets come from the environment, never the config file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdsConfig {
    /// Data directory (model bundle, audit store)
    pub data_dir: PathBuf,
    /// Path to the trained model bundle
    pub model_path: PathBuf,
    /// Training / evaluation corpus files
    pub corpus: CorpusConfig,
    /// Feature pipeline and classifier parameters
    pub pipeline: PipelineConfig,
    /// Severity thresholds and alert channels
    pub alerts: AlertsConfig,
    /// Logging
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorpusConfig {
    pub train_path: PathBuf,
    /// Held-out corpus scored after training (optional)
    pub test_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of principal components retained by the projector
    pub components: usize,
    pub classifier: ClassifierKind,
    pub svm: SvmParams,
    pub knn: KnnParams,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierKind {
    /// Linear margin classifier trained by SGD
    Svm,
    /// Majority-vote nearest neighbors
    Knn,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SvmParams {
    /// Maximum passes over the training set
    pub max_iter: usize,
    /// Minimum loss improvement per epoch
    pub tol: f64,
    /// L2 regularization strength
    pub alpha: f64,
    /// Initial learning rate
    pub eta0: f64,
    /// Epochs without improvement before stopping
    pub n_iter_no_change: usize,
    /// Shuffle seed
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnnParams {
    pub k: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertsConfig {
    /// Confidence at or above this is high severity (0.0–1.0)
    pub high_threshold: f64,
    /// Confidence at or above this is medium severity
    pub medium_threshold: f64,
    /// Per-request timeout for outbound transports
    pub timeout_secs: u64,
    pub email: EmailConfig,
    pub sms: SmsConfig,
    pub audit: AuditConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub enabled: bool,
    /// HTTP mail relay accepting a JSON message
    pub relay_endpoint: Option<String>,
    pub from: Option<String>,
    pub password: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmsConfig {
    pub enabled: bool,
    pub api_base: String,
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub enabled: bool,
    /// Store path relative to `data_dir` unless absolute
    pub path: PathBuf,
    pub secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for IdsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".ids"),
            model_path: PathBuf::from(".ids/model.bundle"),
            corpus: CorpusConfig::default(),
            pipeline: PipelineConfig::default(),
            alerts: AlertsConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            train_path: PathBuf::from("kddcup.data_10_percent_corrected"),
            test_path: Some(PathBuf::from("corrected")),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            components: 27,
            classifier: ClassifierKind::Svm,
            svm: SvmParams::default(),
            knn: KnnParams::default(),
        }
    }
}

impl Default for SvmParams {
    fn default() -> Self {
        Self {
            max_iter: 1000,
            tol: 1e-3,
            alpha: 1e-4,
            eta0: 0.01,
            n_iter_no_change: 5,
            seed: 42,
        }
    }
}

impl Default for KnnParams {
    fn default() -> Self {
        Self { k: 5 }
    }
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            high_threshold: 0.9,
            medium_threshold: 0.7,
            timeout_secs: 10,
            email: EmailConfig::default(),
            sms: SmsConfig::default(),
            audit: AuditConfig::default(),
        }
    }
}

impl Default for SmsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_base: "https://api.twilio.com".to_string(),
            account_sid: None,
            auth_token: None,
            from: None,
            to: None,
        }
    }
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: PathBuf::from("audit.db"),
            secret: None,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl IdsConfig {
    /// Read a JSON config file. A missing file is the default config; an unreadable or
    /// malformed one is an error.
    pub fn try_load(path: &Path) -> crate::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    /// Like [`IdsConfig::try_load`], but falls back to the default config with a warning.
    pub fn load(path: &Path) -> Self {
        Self::try_load(path).unwrap_or_else(|e| {
            warn!(path = %path.display(), error = %e, "config file rejected; using defaults");
            Self::default()
        })
    }

    /// Overlay transport credentials from the process environment. Call
    /// `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn apply_env(&mut self) {
        self.apply_vars(env_nonempty);
    }

    fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let sms = &mut self.alerts.sms;
        if let Some(v) = lookup("TWILIO_SID") {
            sms.account_sid = Some(v);
        }
        if let Some(v) = lookup("TWILIO_AUTH_TOKEN") {
            sms.auth_token = Some(v);
        }
        if let Some(v) = lookup("TWILIO_PHONE_NUMBER") {
            sms.from = Some(v);
        }
        if let Some(v) = lookup("TO_PHONE_NUMBER") {
            sms.to = Some(v);
        }

        let email = &mut self.alerts.email;
        if let Some(v) = lookup("EMAIL_ADDRESS") {
            email.from = Some(v);
        }
        if let Some(v) = lookup("EMAIL_PASSWORD") {
            email.password = Some(v);
        }
        if let Some(v) = lookup("TO_EMAIL") {
            email.to = Some(v);
        }

        if let Some(v) = lookup("IDS_AUDIT_SECRET") {
            self.alerts.audit.secret = Some(v);
        }
    }

    pub fn audit_path(&self) -> PathBuf {
        if self.alerts.audit.path.is_absolute() {
            self.alerts.audit.path.clone()
        } else {
            self.data_dir.join(&self.alerts.audit.path)
        }
    }
}
