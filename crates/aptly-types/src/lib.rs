//! Core domain types for aptly-publish.
//!
//! This crate provides the types shared by every stage of an Aptly publish
//! pipeline: the server endpoint, the upload/register/publish targets, the
//! signing configuration, and the [`Reporter`] side channel used for
//! human-readable progress lines.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default whole-request timeout. Package uploads can be large.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 300;

/// Sink for progress and diagnostic lines.
///
/// Operations receive a `&mut dyn Reporter` per call; nothing is written to
/// stdout or stderr directly.
pub trait Reporter {
    fn info(&mut self, msg: &str);
    fn warn(&mut self, msg: &str);
    fn error(&mut self, msg: &str);
}

/// Reporter that discards every line.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn info(&mut self, _msg: &str) {}
    fn warn(&mut self, _msg: &str) {}
    fn error(&mut self, _msg: &str) {}
}

/// Connect and request timeouts, fixed when the client is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub connect: Duration,
    pub request: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            request: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

/// One Aptly server instance.
#[derive(Clone, PartialEq, Eq)]
pub struct ServerEndpoint {
    base_url: String,
    username: String,
    password: Option<String>,
    trust_self_signed: bool,
    timeouts: Timeouts,
}

impl ServerEndpoint {
    /// Create an endpoint for `base_url` with no credentials.
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            username: String::new(),
            password: None,
            trust_self_signed: false,
            timeouts: Timeouts::default(),
        }
    }

    /// Attach Basic Auth credentials.
    pub fn with_credentials(mut self, username: &str, password: Option<&str>) -> Self {
        self.username = username.to_string();
        self.password = password.map(str::to_string);
        self
    }

    /// Accept certificates that do not validate against the system roots.
    pub fn with_trust_self_signed(mut self, trust: bool) -> Self {
        self.trust_self_signed = trust;
        self
    }

    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Whether Basic Auth should be sent. Only the username has to be set.
    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty()
    }

    /// Whether a non-empty login password is configured.
    pub fn has_password(&self) -> bool {
        self.password.as_deref().is_some_and(|p| !p.is_empty())
    }

    pub fn trust_self_signed(&self) -> bool {
        self.trust_self_signed
    }

    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }
}

impl fmt::Debug for ServerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerEndpoint")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("trust_self_signed", &self.trust_self_signed)
            .field("timeouts", &self.timeouts)
            .finish()
    }
}

/// Files staged together in one server-side upload directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadBatch {
    /// Server-side staging folder name
    pub directory: String,
    /// Local files, uploaded in order
    pub files: Vec<PathBuf>,
}

impl UploadBatch {
    /// Batch with a caller-supplied directory name.
    pub fn new(directory: impl Into<String>, files: Vec<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            files,
        }
    }

    /// Batch with a generated directory name, `upload-<timestamp>-<random>`.
    pub fn generated(files: Vec<PathBuf>) -> Self {
        Self::new(generate_upload_directory(), files)
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Generate a fresh upload directory name.
pub fn generate_upload_directory() -> String {
    format!(
        "upload-{}-{:016x}",
        Utc::now().format("%Y%m%dT%H%M%S"),
        rand::random::<u64>()
    )
}

/// Target of the add-to-repo step.
///
/// `upload_directory` has to name a directory filled by an earlier upload;
/// the client does not check this.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoTarget {
    pub repository: String,
    pub upload_directory: String,
    pub force_replace: bool,
}

impl RepoTarget {
    pub fn new(repository: impl Into<String>, upload_directory: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            upload_directory: upload_directory.into(),
            force_replace: false,
        }
    }

    pub fn with_force_replace(mut self, force: bool) -> Self {
        self.force_replace = force;
        self
    }
}

/// Where the GPG passphrase comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassphraseSource {
    /// No passphrase is sent; the server's agent must already have the key unlocked
    #[default]
    None,
    /// Send the passphrase itself
    Passphrase,
    /// Send a path to a file on the server that holds the passphrase
    PassphraseFile,
}

impl fmt::Display for PassphraseSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassphraseSource::None => write!(f, "none"),
            PassphraseSource::Passphrase => write!(f, "passphrase"),
            PassphraseSource::PassphraseFile => write!(f, "passphrase_file"),
        }
    }
}

/// Repository signing configuration as the operator writes it.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SigningConfig {
    /// Sign published metadata
    #[serde(default)]
    pub enabled: bool,
    /// GPG key id or name
    #[serde(default)]
    pub gpg_key: String,
    /// Public keyring path on the server
    #[serde(default)]
    pub keyring: String,
    /// Secret keyring path on the server
    #[serde(default)]
    pub secret_keyring: String,
    #[serde(default, rename = "passphrase_type")]
    pub passphrase_source: PassphraseSource,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub passphrase: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub passphrase_file: String,
}

impl SigningConfig {
    pub fn disabled() -> Self {
        Self::default()
    }
}

impl fmt::Debug for SigningConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningConfig")
            .field("enabled", &self.enabled)
            .field("gpg_key", &self.gpg_key)
            .field("keyring", &self.keyring)
            .field("secret_keyring", &self.secret_keyring)
            .field("passphrase_source", &self.passphrase_source)
            .field(
                "passphrase",
                &if self.passphrase.is_empty() { "" } else { "<redacted>" },
            )
            .field("passphrase_file", &self.passphrase_file)
            .finish()
    }
}

/// Target of the publish step, `prefix/distribution`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishTarget {
    pub prefix: String,
    pub distribution: String,
    pub force_overwrite: bool,
    pub signing: SigningConfig,
}

impl PublishTarget {
    pub fn new(prefix: impl Into<String>, distribution: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            distribution: distribution.into(),
            force_overwrite: false,
            signing: SigningConfig::disabled(),
        }
    }

    pub fn with_force_overwrite(mut self, force: bool) -> Self {
        self.force_overwrite = force;
        self
    }

    pub fn with_signing(mut self, signing: SigningConfig) -> Self {
        self.signing = signing;
        self
    }
}

/// Furthest point a publish pipeline run has reached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    #[default]
    Idle,
    VersionChecked,
    Uploaded,
    Registered,
    Published,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineStage::Idle => write!(f, "idle"),
            PipelineStage::VersionChecked => write!(f, "version_checked"),
            PipelineStage::Uploaded => write!(f, "uploaded"),
            PipelineStage::Registered => write!(f, "registered"),
            PipelineStage::Published => write!(f, "published"),
        }
    }
}
