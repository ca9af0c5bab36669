//! Route handlers for the gateway.

pub mod auth;
pub mod health;
pub mod oauth;
pub mod settings;

use axum::http::StatusCode;
use axum::response::IntoResponse;

/// Fallback for unmatched paths; registered before layering so the session
/// gate also covers routes the gateway does not serve itself.
pub(crate) async fn not_found() -> impl IntoResponse {
    StatusCode::NOT_FOUND
}
