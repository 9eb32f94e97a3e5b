//! Runtime configuration
//!
//! Layered with figment: built-in defaults, then an optional TOML file, then
//! `NFC_ACCESS_`-prefixed environment variables (`__` separates nested keys,
//! e.g. `NFC_ACCESS_API__BASE_URL`).

use std::path::Path;

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use crate::AccessError;
use crate::auth::AuthPolicy;

/// File read from the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "nfc-access.toml";

/// Prefix of configuration environment variables
pub const ENV_PREFIX: &str = "NFC_ACCESS_";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Reader to use; the first listed reader when unset
    pub reader: Option<String>,
    /// Remote authorization service
    pub api: ApiConfig,
    /// Authentication and authorization behaviour
    pub auth: AuthConfig,
}

/// Remote authorization service settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Whether to talk to the service at all
    pub enabled: bool,
    /// Service base URL
    pub base_url: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "http://192.168.20.152:3000".to_string(),
            timeout_secs: 5,
        }
    }
}

/// Authentication and authorization settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// What to do when no default key opens a block
    pub policy: AuthPolicy,
    /// Ask the remote service about cards missing from the registry
    pub remote_check: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            policy: AuthPolicy::FailOpen,
            remote_check: true,
        }
    }
}

impl AccessConfig {
    /// Provider stack for `path`, or [`DEFAULT_CONFIG_FILE`] when `None`
    pub fn figment(path: Option<&Path>) -> Figment {
        let file = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load the configuration
    ///
    /// An explicitly given file must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, AccessError> {
        if let Some(path) = path {
            if !path.is_file() {
                return Err(figment::Error::from(format!(
                    "config file {} not found",
                    path.display()
                ))
                .into());
            }
        }
        Ok(Self::figment(path).extract()?)
    }
}
