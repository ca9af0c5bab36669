//! Session gate: path classification and the request filter in front of
//! every route.
//!
//! Classification is a pure function of the path prefix and runs before any
//! I/O. Static assets are filtered out first so they never pay for a
//! credential check. Cookie mutation happens only when a presented
//! credential fails verification; plain absence leaves cookies untouched.

use axum::{
    extract::{Extension, Request},
    http::{header::SET_COOKIE, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use std::sync::Arc;
use tracing::warn;
use url::form_urlencoded;

use super::{
    config::GatewayConfig,
    handlers::auth::types::ErrorResponse,
    session::{self, SessionError},
};

const ASSET_PREFIX: &str = "/assets/";
const IMAGE_EXTENSIONS: [&str; 7] = [".png", ".jpg", ".jpeg", ".gif", ".svg", ".ico", ".webp"];
const PUBLIC_PREFIXES: [&str; 4] = ["/login", "/signup", "/api/auth", "/api/cron"];

pub(crate) const CODE_SESSION_EXPIRED: &str = "SESSION_EXPIRED";
pub(crate) const CODE_INVALID_SESSION: &str = "INVALID_SESSION";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RouteClass {
    /// Static assets, excluded from evaluation entirely.
    Asset,
    /// Reachable without a session.
    Public,
    /// Pages that redirect to `/login` when unauthenticated.
    ProtectedPage,
    /// API routes that answer 401 with a stable code when unauthenticated.
    ProtectedApi,
    /// Everything else passes through untouched.
    Passthrough,
}

pub(crate) fn classify(path: &str) -> RouteClass {
    if path.starts_with(ASSET_PREFIX)
        || path == "/favicon.ico"
        || IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
    {
        return RouteClass::Asset;
    }

    if path == "/" || PUBLIC_PREFIXES.iter().any(|prefix| path.starts_with(prefix)) {
        return RouteClass::Public;
    }

    if path.starts_with("/dashboard") {
        return RouteClass::ProtectedPage;
    }

    if path.starts_with("/api/") {
        return RouteClass::ProtectedApi;
    }

    RouteClass::Passthrough
}

/// Gate middleware applied to the whole router, including the fallback.
pub(crate) async fn session_gate(
    Extension(config): Extension<Arc<GatewayConfig>>,
    request: Request,
    next: Next,
) -> Response {
    let class = classify(request.uri().path());
    if !matches!(class, RouteClass::ProtectedPage | RouteClass::ProtectedApi) {
        return next.run(request).await;
    }

    match session::session_from_headers(config.session_secret(), request.headers()) {
        Ok(_) => next.run(request).await,
        Err(SessionError::Missing | SessionError::Expired) => {
            reject_unauthenticated(class, request.uri().path())
        }
        Err(SessionError::Invalid) => {
            // A credential that fails verification is purged; absence is not.
            warn!(path = request.uri().path(), "rejecting invalid session credential");
            reject_invalid(class)
        }
    }
}

fn reject_unauthenticated(class: RouteClass, path: &str) -> Response {
    if class == RouteClass::ProtectedApi {
        return (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::with_code(
                "Authentication required",
                CODE_SESSION_EXPIRED,
            )),
        )
            .into_response();
    }

    let query: String = form_urlencoded::Serializer::new(String::new())
        .append_pair("callbackUrl", path)
        .finish();
    Redirect::temporary(&format!("/login?{query}")).into_response()
}

fn reject_invalid(class: RouteClass) -> Response {
    let mut response = if class == RouteClass::ProtectedApi {
        (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse::with_code(
                "Invalid session",
                CODE_INVALID_SESSION,
            )),
        )
            .into_response()
    } else {
        Redirect::temporary("/login?error=SessionExpired").into_response()
    };

    for cookie in session::clear_session_cookies() {
        response.headers_mut().append(SET_COOKIE, cookie);
    }

    response
}
