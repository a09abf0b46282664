//! Validated service configuration

use beef_core::DEFAULT_SESSION_TTL;
use beef_util::LoginLimits;
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use crate::schema::RawConfig;

/// Default bind address
pub const DEFAULT_LISTEN: &str = "0.0.0.0:3000";

/// Admin password used when none is configured outside production
pub const DEV_ADMIN_PASSWORD: &str = "bezos123";

/// Whether the service runs as a production deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RuntimeMode {
    #[default]
    Development,
    Production,
}

impl RuntimeMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Some(Self::Production),
            "development" | "dev" | "test" => Some(Self::Development),
            _ => None,
        }
    }

    pub fn is_production(self) -> bool {
        self == Self::Production
    }
}

impl fmt::Display for RuntimeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Development => write!(f, "development"),
            Self::Production => write!(f, "production"),
        }
    }
}

/// Admin password. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct AdminSecret(String);

impl AdminSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AdminSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AdminSecret(<redacted>)")
    }
}

/// Connection details for the remote key-value service
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteKvConfig {
    pub url: String,
    pub token: String,
}

impl fmt::Debug for RemoteKvConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteKvConfig")
            .field("url", &self.url)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Validated configuration ready for use by the daemon
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub listen: SocketAddr,
    pub mode: RuntimeMode,
    /// `None` selects the in-memory backend
    pub kv: Option<RemoteKvConfig>,
    pub login: LoginLimits,
    pub session_expiry: Duration,
    pub admin_password: AdminSecret,
}

impl ServiceConfig {
    /// Convert from raw config (after validation)
    pub(crate) fn from_raw(raw: RawConfig, admin_password: AdminSecret) -> Self {
        let listen = raw
            .service
            .listen
            .as_deref()
            .unwrap_or(DEFAULT_LISTEN)
            .parse()
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 3000)));

        let mode = raw
            .service
            .mode
            .as_deref()
            .and_then(RuntimeMode::parse)
            .unwrap_or_default();

        let kv = match (raw.kv.rest_url, raw.kv.rest_token) {
            (Some(url), Some(token)) if !url.is_empty() && !token.is_empty() => {
                Some(RemoteKvConfig { url, token })
            }
            _ => None,
        };

        let defaults = LoginLimits::default();
        let login = LoginLimits {
            max_attempts: raw.login.max_attempts.unwrap_or(defaults.max_attempts),
            window: raw
                .login
                .window_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.window),
            lockout: raw
                .login
                .lockout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.lockout),
        };

        let session_expiry = raw
            .session
            .expiry_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_SESSION_TTL);

        Self {
            listen,
            mode,
            kv,
            login,
            session_expiry,
            admin_password,
        }
    }

    /// Whether cookies must carry the `Secure` attribute
    pub fn secure_cookies(&self) -> bool {
        self.mode.is_production()
    }
}
