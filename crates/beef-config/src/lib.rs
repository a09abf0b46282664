//! Configuration parsing and validation for beefd
//!
//! Configuration comes from two places:
//! - An optional, versioned TOML file (listener, KV endpoint, login limits,
//!   session lifetime)
//! - Environment variables, which override the file
//!
//! The admin password is only ever read from the environment.

mod schema;
mod service;
mod validation;

pub use schema::*;
pub use service::*;
pub use validation::*;

use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::{info, warn};

/// Bind address override
pub const ENV_LISTEN: &str = "BEEF_LISTEN";
/// Runtime mode override ("development" / "production")
pub const ENV_MODE: &str = "BEEF_ENV";
/// Admin password
pub const ENV_ADMIN_PASSWORD: &str = "ADMIN_PASSWORD";
/// Remote KV endpoint
pub const ENV_KV_URL: &str = "KV_REST_API_URL";
/// Remote KV bearer token
pub const ENV_KV_TOKEN: &str = "KV_REST_API_TOKEN";
/// Fallback names used by Upstash integrations
pub const ENV_UPSTASH_URL: &str = "UPSTASH_REDIS_REST_URL";
pub const ENV_UPSTASH_TOKEN: &str = "UPSTASH_REDIS_REST_TOKEN";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation failed: {errors:?}")]
    ValidationFailed { errors: Vec<ValidationError> },

    #[error("Unsupported config version: {0}")]
    UnsupportedVersion(u32),

    #[error("ADMIN_PASSWORD environment variable is required in production")]
    MissingAdminPassword,
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Current supported config version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

/// Source of environment variables
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;

    /// Like `var`, treating empty values as unset
    fn non_empty(&self, key: &str) -> Option<String> {
        self.var(key).filter(|v| !v.trim().is_empty())
    }
}

/// The real process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

/// Load configuration from an optional TOML file plus the process environment
pub fn load_config(path: Option<&Path>) -> ConfigResult<ServiceConfig> {
    let raw = match path {
        Some(path) => {
            let content = std::fs::read_to_string(path)?;
            info!(config_path = %path.display(), "Reading config file");
            parse_raw(&content)?
        }
        None => RawConfig::default(),
    };
    resolve_config(raw, &ProcessEnv)
}

/// Parse and version-check a TOML config file
pub fn parse_raw(content: &str) -> ConfigResult<RawConfig> {
    let raw: RawConfig = toml::from_str(content)?;

    if raw.config_version != CURRENT_CONFIG_VERSION {
        return Err(ConfigError::UnsupportedVersion(raw.config_version));
    }

    Ok(raw)
}

/// Parse TOML and resolve it against `env`
pub fn parse_config(content: &str, env: &dyn EnvSource) -> ConfigResult<ServiceConfig> {
    resolve_config(parse_raw(content)?, env)
}

/// Apply environment overrides, validate, and resolve the admin secret
pub fn resolve_config(mut raw: RawConfig, env: &dyn EnvSource) -> ConfigResult<ServiceConfig> {
    apply_env_overrides(&mut raw, env);

    let errors = validate_config(&raw);
    if !errors.is_empty() {
        return Err(ConfigError::ValidationFailed { errors });
    }

    let mode = raw
        .service
        .mode
        .as_deref()
        .and_then(RuntimeMode::parse)
        .unwrap_or_default();
    let admin_password = resolve_admin_secret(mode, env)?;

    Ok(ServiceConfig::from_raw(raw, admin_password))
}

fn apply_env_overrides(raw: &mut RawConfig, env: &dyn EnvSource) {
    if let Some(listen) = env.non_empty(ENV_LISTEN) {
        raw.service.listen = Some(listen);
    }
    if let Some(mode) = env.non_empty(ENV_MODE) {
        raw.service.mode = Some(mode);
    }

    let url = env.non_empty(ENV_KV_URL).or_else(|| env.non_empty(ENV_UPSTASH_URL));
    let token = env
        .non_empty(ENV_KV_TOKEN)
        .or_else(|| env.non_empty(ENV_UPSTASH_TOKEN));
    if url.is_some() {
        raw.kv.rest_url = url;
    }
    if token.is_some() {
        raw.kv.rest_token = token;
    }
}

/// Admin password from the environment; a fixed default outside production
pub fn resolve_admin_secret(mode: RuntimeMode, env: &dyn EnvSource) -> ConfigResult<AdminSecret> {
    match env.non_empty(ENV_ADMIN_PASSWORD) {
        Some(password) => Ok(AdminSecret::new(password)),
        None if mode.is_production() => Err(ConfigError::MissingAdminPassword),
        None => {
            warn!("ADMIN_PASSWORD not set, using development default");
            Ok(AdminSecret::new(DEV_ADMIN_PASSWORD))
        }
    }
}
