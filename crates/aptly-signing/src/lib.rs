//! Signing options for the Aptly publish endpoint.
//!
//! [`build`] maps an operator-facing [`SigningConfig`] onto the `Signing`
//! object that `PUT /api/publish/{prefix}/{distribution}` expects:
//!
//! ```
//! use aptly_signing::build;
//! use aptly_types::SigningConfig;
//!
//! let options = build(&SigningConfig::disabled(), false);
//! assert!(options.skip);
//! assert_eq!(serde_json::to_string(&options).unwrap(), r#"{"Skip":true}"#);
//! ```

use aptly_types::{PassphraseSource, SigningConfig};
use serde::Serialize;

/// The `Signing` payload of a publish request.
///
/// When `skip` is set every other field is left at its default and is not
/// serialized, so the payload is exactly `{"Skip":true}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SigningOptions {
    #[serde(rename = "Skip")]
    pub skip: bool,
    /// Non-interactive GPG
    #[serde(rename = "Batch", skip_serializing_if = "std::ops::Not::not")]
    pub batch: bool,
    #[serde(rename = "GpgKey", skip_serializing_if = "Option::is_none")]
    pub gpg_key: Option<String>,
    #[serde(rename = "Keyring", skip_serializing_if = "Option::is_none")]
    pub keyring: Option<String>,
    #[serde(rename = "SecretKeyring", skip_serializing_if = "Option::is_none")]
    pub secret_keyring: Option<String>,
    #[serde(flatten)]
    pub passphrase: Option<Passphrase>,
}

/// Passphrase sent to the server. Only one form can ever be present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Passphrase {
    #[serde(rename = "Passphrase")]
    Inline(String),
    #[serde(rename = "PassphraseFile")]
    File(String),
}

impl SigningOptions {
    /// Options that tell the server not to sign.
    pub fn skipped() -> Self {
        Self {
            skip: true,
            ..Default::default()
        }
    }
}

/// Build the publish signing payload from configuration.
///
/// `password_configured` says whether the server endpoint carries a login
/// password. When it does and signing is enabled, GPG runs in batch mode.
pub fn build(config: &SigningConfig, password_configured: bool) -> SigningOptions {
    if !config.enabled {
        return SigningOptions::skipped();
    }

    SigningOptions {
        skip: false,
        batch: password_configured,
        gpg_key: non_empty(&config.gpg_key),
        keyring: non_empty(&config.keyring),
        secret_keyring: non_empty(&config.secret_keyring),
        passphrase: select_passphrase(config),
    }
}

fn select_passphrase(config: &SigningConfig) -> Option<Passphrase> {
    match config.passphrase_source {
        PassphraseSource::None => None,
        PassphraseSource::Passphrase => non_empty(&config.passphrase).map(Passphrase::Inline),
        PassphraseSource::PassphraseFile => {
            non_empty(&config.passphrase_file).map(Passphrase::File)
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_string())
}
