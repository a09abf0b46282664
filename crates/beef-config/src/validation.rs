//! Configuration validation

use crate::schema::RawConfig;
use std::net::SocketAddr;
use thiserror::Error;

/// Upper bound for any configured duration: one year
pub const MAX_DURATION_SECS: u64 = 365 * 24 * 60 * 60;

/// Validation error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid listen address '{value}': {message}")]
    InvalidListen { value: String, message: String },

    #[error("Unknown mode '{0}' (expected \"development\" or \"production\")")]
    UnknownMode(String),

    #[error("Remote KV is half configured: {missing} is not set")]
    IncompleteKv { missing: &'static str },

    #[error("Remote KV URL '{0}' must start with http:// or https://")]
    InvalidKvUrl(String),

    #[error("{field} must be greater than zero")]
    ZeroValue { field: &'static str },

    #[error("{field} must be at most {max_secs} seconds")]
    TooLarge { field: &'static str, max_secs: u64 },

    #[error("Lockout ({lockout_secs}s) is shorter than the attempt window ({window_secs}s)")]
    LockoutShorterThanWindow { lockout_secs: u64, window_secs: u64 },
}

/// Validate a raw configuration, after environment overrides are applied
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(listen) = &config.service.listen
        && let Err(e) = listen.parse::<SocketAddr>()
    {
        errors.push(ValidationError::InvalidListen {
            value: listen.clone(),
            message: e.to_string(),
        });
    }

    if let Some(mode) = &config.service.mode
        && crate::RuntimeMode::parse(mode).is_none()
    {
        errors.push(ValidationError::UnknownMode(mode.clone()));
    }

    errors.extend(validate_kv(config));
    errors.extend(validate_login(config));

    if config.session.expiry_secs == Some(0) {
        errors.push(ValidationError::ZeroValue {
            field: "session.expiry_secs",
        });
    }
    errors.extend(check_max("session.expiry_secs", config.session.expiry_secs));

    errors
}

fn validate_kv(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let url = config.kv.rest_url.as_deref().filter(|s| !s.is_empty());
    let token = config.kv.rest_token.as_deref().filter(|s| !s.is_empty());

    match (url, token) {
        (Some(_), None) => errors.push(ValidationError::IncompleteKv {
            missing: "kv.rest_token",
        }),
        (None, Some(_)) => errors.push(ValidationError::IncompleteKv {
            missing: "kv.rest_url",
        }),
        _ => {}
    }

    if let Some(url) = url
        && !(url.starts_with("http://") || url.starts_with("https://"))
    {
        errors.push(ValidationError::InvalidKvUrl(url.to_string()));
    }

    errors
}

fn validate_login(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let login = &config.login;

    if login.max_attempts == Some(0) {
        errors.push(ValidationError::ZeroValue {
            field: "login.max_attempts",
        });
    }
    if login.window_secs == Some(0) {
        errors.push(ValidationError::ZeroValue {
            field: "login.window_secs",
        });
    }

    errors.extend(check_max("login.window_secs", login.window_secs));
    errors.extend(check_max("login.lockout_secs", login.lockout_secs));

    let defaults = beef_util::LoginLimits::default();
    let window_secs = login.window_secs.unwrap_or(defaults.window.as_secs());
    let lockout_secs = login.lockout_secs.unwrap_or(defaults.lockout.as_secs());
    if lockout_secs < window_secs {
        errors.push(ValidationError::LockoutShorterThanWindow {
            lockout_secs,
            window_secs,
        });
    }

    errors
}

fn check_max(field: &'static str, secs: Option<u64>) -> Option<ValidationError> {
    secs.filter(|&s| s > MAX_DURATION_SECS)
        .map(|_| ValidationError::TooLarge {
            field,
            max_secs: MAX_DURATION_SECS,
        })
}
