//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};

use crate::CURRENT_CONFIG_VERSION;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Listener and runtime mode
    #[serde(default)]
    pub service: RawServiceConfig,

    /// Remote key-value backend
    #[serde(default)]
    pub kv: RawKvConfig,

    /// Login rate limiting
    #[serde(default)]
    pub login: RawLoginConfig,

    /// Admin session cookies
    #[serde(default)]
    pub session: RawSessionConfig,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            config_version: CURRENT_CONFIG_VERSION,
            service: RawServiceConfig::default(),
            kv: RawKvConfig::default(),
            login: RawLoginConfig::default(),
            session: RawSessionConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// Socket address to bind (default: 0.0.0.0:3000)
    pub listen: Option<String>,

    /// "development" or "production"
    pub mode: Option<String>,
}

/// Upstash-compatible Redis REST endpoint. Both fields are needed for the
/// remote backend to be used.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawKvConfig {
    pub rest_url: Option<String>,
    pub rest_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawLoginConfig {
    pub max_attempts: Option<u32>,
    pub window_secs: Option<u64>,
    pub lockout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawSessionConfig {
    /// Session token lifetime (default: 7 days)
    pub expiry_secs: Option<u64>,
}
