//! Session cookie and client identification

use axum::http::{HeaderMap, header};
use std::time::Duration;
use tracing::debug;

use crate::{ApiError, ApiResult, AppState};

/// Cookie carrying the admin session token
pub const SESSION_COOKIE: &str = "beef-auth";

/// Identifier used when a client cannot be traced through proxy headers
pub const UNKNOWN_CLIENT: &str = "localhost";

/// `Set-Cookie` value storing `token` for `max_age`
pub fn session_cookie(token: &str, max_age: Duration, secure: bool) -> String {
    let mut cookie = format!(
        "{SESSION_COOKIE}={token}; HttpOnly; SameSite=Lax; Path=/; Max-Age={}",
        max_age.as_secs()
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that removes the session cookie
pub fn clear_session_cookie(secure: bool) -> String {
    session_cookie("", Duration::ZERO, secure)
}

/// Value of the session cookie in the request, if any
pub fn session_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim())
}

/// Rate limiting key for the client behind `headers`
pub fn client_identifier(headers: &HeaderMap) -> String {
    if let Some(forwarded) = header_str(headers, "x-forwarded-for")
        && let Some(first) = forwarded.split(',').next()
        && !first.trim().is_empty()
    {
        return first.trim().to_string();
    }

    if let Some(real_ip) = header_str(headers, "x-real-ip")
        && !real_ip.trim().is_empty()
    {
        return real_ip.trim().to_string();
    }

    UNKNOWN_CLIENT.to_string()
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// Whether the request carries a valid admin session
pub fn is_authenticated(state: &AppState, headers: &HeaderMap) -> bool {
    session_token(headers).is_some_and(|token| state.auth.verify_session(token))
}

/// Reject requests without a valid admin session
pub fn require_session(state: &AppState, headers: &HeaderMap) -> ApiResult<()> {
    if is_authenticated(state, headers) {
        Ok(())
    } else {
        debug!("Rejected request without a valid session");
        Err(ApiError::unauthorized())
    }
}
