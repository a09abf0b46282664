//! Shared types for the beefd API

use beef_util::MissId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A recorded missed delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissedDelivery {
    pub id: MissId,
    /// Calendar date, `YYYY-MM-DD`
    pub date: String,
    /// Sanitized, HTML-escaped note (may be empty)
    pub note: String,
    /// Unix epoch milliseconds
    pub created_at: i64,
}

/// Body of `POST /admin/login`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

/// Body of `POST /admin/delete`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteMissRequest {
    pub id: String,
}

/// Generic success acknowledgement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// Response of `POST /admin/add`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddMissResponse {
    pub success: bool,
    pub miss: MissedDelivery,
}

/// Response of `GET /admin/check`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthStatus {
    pub authenticated: bool,
}

/// Response of `GET /misses`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissesResponse {
    pub misses: Vec<MissedDelivery>,
    pub count: usize,
}

/// Body returned by every failing endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    /// Login attempts left before lockout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u32>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            remaining: None,
        }
    }
}

/// Overall service health
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Healthy,
    Unhealthy,
}

/// Storage backend reachability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseState {
    Connected,
    Error,
}

/// Result of probing the storage backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseCheck {
    pub status: DatabaseState,
    /// Health check round trip, e.g. `"3ms"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub records: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DatabaseCheck {
    pub fn connected(latency_ms: u128, records: usize) -> Self {
        Self {
            status: DatabaseState::Connected,
            latency: Some(format!("{latency_ms}ms")),
            records: Some(records),
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: DatabaseState::Error,
            latency: None,
            records: None,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthChecks {
    pub database: DatabaseCheck,
}

/// Response of `GET /health`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthState,
    pub timestamp: DateTime<Utc>,
    pub checks: HealthChecks,
}
