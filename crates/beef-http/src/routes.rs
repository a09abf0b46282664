//! Request handlers

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use beef_api::{
    AddMissResponse, AuthStatus, DatabaseCheck, DeleteMissRequest, HealthChecks, HealthResponse,
    HealthState, LoginRequest, MAX_PASSWORD_LENGTH, MissesResponse, SuccessResponse, is_valid_id,
    validate_miss_input,
};
use beef_store::StoreError;
use beef_util::MonotonicInstant;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::{
    ApiError, ApiResult, AppState, clear_session_cookie, client_identifier, is_authenticated,
    require_session, session_cookie,
};

fn parse_body(body: &Bytes) -> ApiResult<Value> {
    serde_json::from_slice(body).map_err(|_| ApiError::bad_request("Invalid request body"))
}

fn with_cookie(cookie: String, body: impl IntoResponse) -> Response {
    ([(header::SET_COOKIE, cookie)], body).into_response()
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    let client = client_identifier(&headers);

    let decision = state.limiter.lock().await.check_and_consume(&client);
    if !decision.allowed {
        warn!(client = %client, retry_after_secs = decision.reset_in_secs, "Login rate limited");
        return Err(ApiError::RateLimited {
            retry_after_secs: decision.reset_in_secs,
        });
    }

    let request: LoginRequest = serde_json::from_value(parse_body(&body)?)
        .map_err(|_| ApiError::bad_request("Password is required"))?;
    if request.password.is_empty() {
        return Err(ApiError::bad_request("Password is required"));
    }

    if request.password.chars().count() > MAX_PASSWORD_LENGTH {
        return Err(ApiError::invalid_password(None));
    }

    if !state.auth.verify_password(&request.password) {
        info!(client = %client, remaining = decision.remaining, "Login failed");
        return Err(ApiError::invalid_password(Some(decision.remaining)));
    }

    state.limiter.lock().await.reset(&client);
    let token = state.auth.issue_session();
    info!(client = %client, "Admin logged in");

    let cookie = session_cookie(&token, state.auth.session_ttl(), state.secure_cookies);
    Ok(with_cookie(cookie, Json(SuccessResponse::ok())))
}

pub async fn logout(State(state): State<Arc<AppState>>) -> Response {
    with_cookie(
        clear_session_cookie(state.secure_cookies),
        Json(SuccessResponse::ok()),
    )
}

pub async fn check(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Json<AuthStatus> {
    Json(AuthStatus {
        authenticated: is_authenticated(&state, &headers),
    })
}

pub async fn add_miss(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<AddMissResponse>> {
    require_session(&state, &headers)?;
    let input = validate_miss_input(&parse_body(&body)?)?;

    let miss = state
        .store
        .add(&input.date, &input.note)
        .await
        .map_err(|e| match e {
            StoreError::RecordLimit { .. } => ApiError::bad_request(e.to_string()),
            other => {
                error!(error = %other, "Failed to add miss");
                ApiError::internal("Failed to add missed delivery")
            }
        })?;

    Ok(Json(AddMissResponse {
        success: true,
        miss,
    }))
}

pub async fn delete_miss(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<SuccessResponse>> {
    require_session(&state, &headers)?;
    let request: DeleteMissRequest = serde_json::from_value(parse_body(&body)?)
        .map_err(|_| ApiError::bad_request("ID is required"))?;
    if request.id.is_empty() {
        return Err(ApiError::bad_request("ID is required"));
    }
    if !is_valid_id(&request.id) {
        return Err(ApiError::bad_request("Invalid ID format"));
    }

    let deleted = state.store.delete(&request.id).await.map_err(|e| {
        error!(error = %e, id = %request.id, "Failed to delete miss");
        ApiError::internal("Failed to delete missed delivery")
    })?;

    if !deleted {
        return Err(ApiError::NotFound("Miss not found".into()));
    }
    Ok(Json(SuccessResponse::ok()))
}

pub async fn list_misses(State(state): State<Arc<AppState>>) -> Json<MissesResponse> {
    let misses = state.store.list().await;
    Json(MissesResponse {
        count: misses.len(),
        misses,
    })
}

pub async fn health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let started = MonotonicInstant::now();

    match state.store.try_count().await {
        Ok(records) => {
            let latency = MonotonicInstant::now().saturating_duration_until(started);
            (
                StatusCode::OK,
                Json(HealthResponse {
                    status: HealthState::Healthy,
                    timestamp: beef_util::now(),
                    checks: HealthChecks {
                        database: DatabaseCheck::connected(latency.as_millis(), records),
                    },
                }),
            )
        }
        Err(e) => {
            error!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: HealthState::Unhealthy,
                    timestamp: beef_util::now(),
                    checks: HealthChecks {
                        database: DatabaseCheck::failed("Database connection failed"),
                    },
                }),
            )
        }
    }
}
