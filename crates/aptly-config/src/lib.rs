//! Configuration file handling for aptly-publish.
//!
//! Settings live in `.aptly.toml`, found by walking up from the working
//! directory. The server password may also come from the `APTLY_PASSWORD`
//! environment variable, which wins over the file.
//!
//! # Example
//!
//! ```
//! use aptly_config::{Config, load_config};
//! use std::path::Path;
//!
//! let config = load_config(Path::new(".")).expect("load config");
//! if let Some(url) = config.url() {
//!     println!("Aptly server: {}", url);
//! }
//! ```

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use aptly_types::{
    DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_REQUEST_TIMEOUT_SECS, ServerEndpoint, SigningConfig,
    Timeouts,
};
use serde::{Deserialize, Serialize};

/// Default configuration file name
pub const CONFIG_FILE: &str = ".aptly.toml";

/// Environment variable holding the server password
pub const APTLY_PASSWORD_ENV: &str = "APTLY_PASSWORD";

/// Get the config file path for a directory
pub fn config_path(dir: &Path) -> PathBuf {
    dir.join(CONFIG_FILE)
}

/// Complete aptly-publish configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Server connection
    #[serde(default)]
    pub server: ServerConfig,
    /// GPG signing of published metadata
    #[serde(default)]
    pub signing: SigningConfig,
    /// Repository and publish targets
    #[serde(default)]
    pub publish: PublishConfig,
}

impl Config {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the server base URL
    pub fn url(&self) -> Option<&str> {
        self.server.url.as_deref().filter(|u| !u.trim().is_empty())
    }

    /// Get the API user name, empty when unset
    pub fn username(&self) -> &str {
        self.server.username.as_deref().unwrap_or_default()
    }

    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            connect: Duration::from_secs(self.server.connect_timeout_secs),
            request: Duration::from_secs(self.server.timeout_secs),
        }
    }

    /// Build the server endpoint, resolving the password.
    ///
    /// Fails when no server URL is configured.
    pub fn server_endpoint(&self) -> Result<ServerEndpoint> {
        let Some(url) = self.url() else {
            bail!(
                "no Aptly server URL configured (set [server] url in {CONFIG_FILE} or pass --url)"
            );
        };

        let password = resolve_password(self);
        Ok(ServerEndpoint::new(url)
            .with_credentials(self.username(), password.password.as_deref())
            .with_trust_self_signed(self.server.trust_self_signed)
            .with_timeouts(self.timeouts()))
    }

    /// Signing configuration for the publish step
    pub fn signing(&self) -> SigningConfig {
        self.signing.clone()
    }

    /// Copy with every secret replaced by its masked form, for display.
    pub fn masked(&self) -> Config {
        let mut config = self.clone();
        if let Some(password) = config.server.password.as_mut() {
            *password = mask_secret(password);
        }
        if !config.signing.passphrase.is_empty() {
            config.signing.passphrase = mask_secret(&config.signing.passphrase);
        }
        config
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize config to TOML")
    }
}

/// Server connection configuration
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the Aptly API server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// HTTP basic auth user; no auth is sent when empty
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Accept any TLS certificate
    #[serde(default)]
    pub trust_self_signed: bool,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

fn default_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: None,
            username: None,
            password: None,
            trust_self_signed: false,
            connect_timeout_secs: default_connect_timeout(),
            timeout_secs: default_timeout(),
        }
    }
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("trust_self_signed", &self.trust_self_signed)
            .field("connect_timeout_secs", &self.connect_timeout_secs)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Repository and publish targets
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Local repository the uploaded files are added to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    /// Publish prefix; `.` or empty is the root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution: Option<String>,
    /// Replace packages that already exist in the repository
    #[serde(default)]
    pub force_replace: bool,
    /// Overwrite files in the published pool
    #[serde(default)]
    pub force_overwrite: bool,
}

/// Where the server password came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordSource {
    None,
    /// From `APTLY_PASSWORD`
    Env,
    /// From `[server] password`
    ConfigFile,
}

impl fmt::Display for PasswordSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PasswordSource::None => write!(f, "none"),
            PasswordSource::Env => write!(f, "{APTLY_PASSWORD_ENV}"),
            PasswordSource::ConfigFile => write!(f, "config file"),
        }
    }
}

/// Resolved server password
#[derive(Clone)]
pub struct PasswordInfo {
    pub password: Option<String>,
    pub source: PasswordSource,
}

impl fmt::Debug for PasswordInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordInfo")
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("source", &self.source)
            .finish()
    }
}

/// Resolve the server password.
///
/// This checks in order:
/// 1. `APTLY_PASSWORD` environment variable
/// 2. `[server] password` in the config file
///
/// Empty values are skipped.
pub fn resolve_password(config: &Config) -> PasswordInfo {
    if let Ok(password) = env::var(APTLY_PASSWORD_ENV)
        && !password.is_empty()
    {
        return PasswordInfo {
            password: Some(password),
            source: PasswordSource::Env,
        };
    }

    if let Some(password) = config.server.password.as_ref().filter(|p| !p.is_empty()) {
        return PasswordInfo {
            password: Some(password.clone()),
            source: PasswordSource::ConfigFile,
        };
    }

    PasswordInfo {
        password: None,
        source: PasswordSource::None,
    }
}

/// Mask a secret for safe display (show first 2 and last 2 chars).
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 8 {
        return "*".repeat(chars.len());
    }
    let head: String = chars[..2].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{head}****{tail}")
}

/// Load configuration from a directory; a missing file yields defaults.
pub fn load_config(dir: &Path) -> Result<Config> {
    let path = config_path(dir);
    if !path.exists() {
        return Ok(Config::default());
    }
    load_config_from_file(&path)
}

/// Load configuration from a specific file path.
///
/// Unlike [`load_config`], the file must exist.
pub fn load_config_from_file(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    parse_config(&content)
        .with_context(|| format!("failed to parse config file: {}", path.display()))
}

/// Parse configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content)?;
    Ok(config)
}

/// Save configuration to a file
pub fn save_config(dir: &Path, config: &Config) -> Result<()> {
    let path = config_path(dir);
    let content = config.to_toml()?;

    std::fs::write(&path, content)
        .with_context(|| format!("failed to write config file: {}", path.display()))?;

    Ok(())
}

/// Find configuration file by walking up the directory tree
pub fn find_config(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir;

    loop {
        let config_file = current.join(CONFIG_FILE);
        if config_file.exists() {
            return Some(config_file);
        }

        match current.parent() {
            Some(parent) => current = parent,
            None => return None,
        }
    }
}
