//! Mapping of handler failures to HTTP responses

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use beef_api::{ErrorBody, ValidationError};
use thiserror::Error;

/// Every way a request can fail, as seen by the client
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{message}")]
    Unauthorized {
        message: String,
        remaining: Option<u32>,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("Too many login attempts. Try again in {} minutes.", .retry_after_secs.div_ceil(60))]
    RateLimited { retry_after_secs: u64 },

    /// Infrastructure failure. Carries only a generic message; details are
    /// logged where the failure happened.
    #[error("{0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn unauthorized() -> Self {
        ApiError::Unauthorized {
            message: "Unauthorized".into(),
            remaining: None,
        }
    }

    pub fn invalid_password(remaining: Option<u32>) -> Self {
        ApiError::Unauthorized {
            message: "Invalid password".into(),
            remaining,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let remaining = match &self {
            ApiError::Unauthorized { remaining, .. } => *remaining,
            _ => None,
        };
        let body = ErrorBody {
            error: self.to_string(),
            remaining,
        };

        let mut response = (status, Json(body)).into_response();
        if let ApiError::RateLimited { retry_after_secs } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::bad_request("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::unauthorized().status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::RateLimited { retry_after_secs: 1 }.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ApiError::internal("x").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_rate_limit_message_rounds_minutes_up() {
        let err = ApiError::RateLimited { retry_after_secs: 1800 };
        assert_eq!(err.to_string(), "Too many login attempts. Try again in 30 minutes.");

        let err = ApiError::RateLimited { retry_after_secs: 61 };
        assert_eq!(err.to_string(), "Too many login attempts. Try again in 2 minutes.");
    }

    #[test]
    fn test_retry_after_header() {
        let response = ApiError::RateLimited { retry_after_secs: 1799 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "1799");
    }

    #[test]
    fn test_validation_errors_are_bad_requests() {
        let err: ApiError = ValidationError::FutureDate.into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Date cannot be in the future");
    }
}
