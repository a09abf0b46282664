//! HTTP surface for beefd
//!
//! JSON-only endpoints:
//! - `POST /admin/login`, `POST /admin/logout`, `GET /admin/check`
//! - `POST /admin/add`, `POST /admin/delete` (admin session required)
//! - `GET /misses`, `GET /health` (public)

mod error;
mod routes;
mod session;
mod state;

pub use error::*;
pub use session::*;
pub use state::*;

use axum::Router;
use axum::routing::{get, post};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Build the service router over `state`
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/admin/login", post(routes::login))
        .route("/admin/logout", post(routes::logout))
        .route("/admin/check", get(routes::check))
        .route("/admin/add", post(routes::add_miss))
        .route("/admin/delete", post(routes::delete_miss))
        .route("/misses", get(routes::list_misses))
        .route("/health", get(routes::health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
