//! Static settings consulted by the rules.
//!
//! Settings come from `NODCMS_*` environment variables, optionally seeded
//! from a `.env` file:
//!
//! ```ignore
//! use nodcms_validate::config::{load_dotenv, ValidationSettings};
//!
//! load_dotenv();
//! let settings = ValidationSettings::from_env()?;
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "NODCMS_";

/// Google's verification endpoint.
pub const DEFAULT_RECAPTCHA_VERIFY_URL: &str = "https://www.google.com/recaptcha/api/siteverify";

/// Error type for configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Env(#[from] envy::Error),
}

/// Settings shared by every submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationSettings {
    /// Host the site is served from; compared against the hostname a
    /// reCaptcha solve was issued for. Reads from `NODCMS_BASE_HOST`.
    pub base_host: String,

    /// reCaptcha secret. Missing or empty means the captcha rule cannot run.
    #[serde(default)]
    pub captcha_secret_key: Option<String>,

    /// Session key holding the one-time captcha challenge.
    #[serde(default = "default_captcha_session_key")]
    pub captcha_session_key: String,

    #[serde(default = "default_recaptcha_verify_url")]
    pub recaptcha_verify_url: String,

    /// Timeout for the verification request, in milliseconds.
    #[serde(default = "default_recaptcha_timeout_ms")]
    pub recaptcha_timeout_ms: u64,
}

fn default_captcha_session_key() -> String {
    "captcha".to_string()
}

fn default_recaptcha_verify_url() -> String {
    DEFAULT_RECAPTCHA_VERIFY_URL.to_string()
}

fn default_recaptcha_timeout_ms() -> u64 {
    10_000
}

impl ValidationSettings {
    /// Settings for `base_host` with every other value at its default.
    pub fn new(base_host: impl Into<String>) -> Self {
        Self {
            base_host: base_host.into(),
            captcha_secret_key: None,
            captcha_session_key: default_captcha_session_key(),
            recaptcha_verify_url: default_recaptcha_verify_url(),
            recaptcha_timeout_ms: default_recaptcha_timeout_ms(),
        }
    }

    /// Load from `NODCMS_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(envy::prefixed(ENV_PREFIX).from_env::<Self>()?)
    }

    /// Load from an explicit list of `NODCMS_*` pairs.
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Ok(envy::prefixed(ENV_PREFIX).from_iter::<_, Self>(vars)?)
    }

    pub fn with_captcha_secret(mut self, secret: impl Into<String>) -> Self {
        self.captcha_secret_key = Some(secret.into());
        self
    }

    pub fn with_captcha_session_key(mut self, key: impl Into<String>) -> Self {
        self.captcha_session_key = key.into();
        self
    }

    pub fn with_recaptcha_verify_url(mut self, url: impl Into<String>) -> Self {
        self.recaptcha_verify_url = url.into();
        self
    }

    pub fn with_recaptcha_timeout(mut self, timeout: Duration) -> Self {
        self.recaptcha_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// The secret, if one is set and non-empty.
    pub fn captcha_secret(&self) -> Option<&str> {
        self.captcha_secret_key
            .as_deref()
            .filter(|secret| !secret.is_empty())
    }

    pub fn recaptcha_timeout(&self) -> Duration {
        Duration::from_millis(self.recaptcha_timeout_ms)
    }
}

/// Load environment variables from a `.env` file, if one exists.
///
/// Existing environment variables take precedence.
pub fn load_dotenv() {
    match dotenvy::dotenv() {
        Ok(path) => tracing::debug!(path = %path.display(), "Loaded .env file"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "Failed to load .env file"),
    }
}

/// Load environment variables from a specific file.
pub fn load_dotenv_from<P: AsRef<std::path::Path>>(path: P) {
    if let Err(e) = dotenvy::from_path(path.as_ref()) {
        tracing::warn!(path = %path.as_ref().display(), error = %e, "Failed to load env file");
    }
}
