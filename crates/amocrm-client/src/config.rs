//! Client configuration from TOML files or the environment.
//!
//! ```toml
//! client_id = "..."
//! client_secret = "..."
//! redirect_url = "https://example.com/amocrm/callback"
//! domain = "example.amocrm.ru"
//! token_file = "/var/lib/app/amocrm_token.json"
//! timeout_secs = 30
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::client::{DEFAULT_REFRESH_SKEW, DEFAULT_TIMEOUT};
use crate::error::ConfigError;

pub const ENV_CLIENT_ID: &str = "AMOCRM_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "AMOCRM_CLIENT_SECRET";
pub const ENV_REDIRECT_URL: &str = "AMOCRM_REDIRECT_URL";
pub const ENV_DOMAIN: &str = "AMOCRM_DOMAIN";
pub const ENV_TOKEN_FILE: &str = "AMOCRM_TOKEN_FILE";
pub const ENV_TIMEOUT_SECS: &str = "AMOCRM_TIMEOUT_SECS";

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

fn default_refresh_skew_secs() -> u64 {
    DEFAULT_REFRESH_SKEW.as_secs()
}

/// Settings for one [`AmoCrmClient`](crate::AmoCrmClient).
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,

    /// Account domain, e.g. `example.amocrm.ru`. May be bound later.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    /// JSON token file; tokens are kept in memory only when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_file: Option<PathBuf>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_refresh_skew_secs")]
    pub refresh_skew_secs: u64,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_url", &self.redirect_url)
            .field("domain", &self.domain)
            .field("token_file", &self.token_file)
            .field("timeout_secs", &self.timeout_secs)
            .field("refresh_skew_secs", &self.refresh_skew_secs)
            .finish()
    }
}

impl ClientConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Load from `AMOCRM_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |key: &'static str, field: &'static str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::MissingField(field))
        };

        let timeout_secs = match lookup(ENV_TIMEOUT_SECS) {
            Some(raw) => raw.trim().parse::<u64>().map_err(|e: std::num::ParseIntError| {
                ConfigError::Invalid {
                    field: "timeout_secs",
                    reason: format!("{ENV_TIMEOUT_SECS}={raw:?}: {e}"),
                }
            })?,
            None => default_timeout_secs(),
        };

        let config = Self {
            client_id: required(ENV_CLIENT_ID, "client_id")?,
            client_secret: required(ENV_CLIENT_SECRET, "client_secret")?,
            redirect_url: required(ENV_REDIRECT_URL, "redirect_url")?,
            domain: lookup(ENV_DOMAIN).filter(|v| !v.is_empty()),
            token_file: lookup(ENV_TOKEN_FILE)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            timeout_secs,
            refresh_skew_secs: default_refresh_skew_secs(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check values a client cannot be built from.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client_id.is_empty() {
            return Err(ConfigError::MissingField("client_id"));
        }
        if self.client_secret.is_empty() {
            return Err(ConfigError::MissingField("client_secret"));
        }
        if self.redirect_url.is_empty() {
            return Err(ConfigError::MissingField("redirect_url"));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "timeout_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn refresh_skew(&self) -> Duration {
        Duration::from_secs(self.refresh_skew_secs)
    }
}
