//! Development-only operational endpoints.

use axum::{
    extract::Extension,
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info};

use crate::api::{config::GatewayConfig, gate::CODE_SESSION_EXPIRED, session};

use super::auth::types::{ErrorResponse, RestartResponse};

/// Sender half of the server's shutdown channel; a restart request is a
/// graceful shutdown that the process supervisor answers with a fresh start.
#[derive(Clone)]
pub struct RestartHandle(pub(crate) UnboundedSender<()>);

#[utoipa::path(
    post,
    path = "/settings/restart",
    responses(
        (status = 200, description = "Restart signalled; returned before the listener drains", body = RestartResponse),
        (status = 401, description = "No valid session", body = ErrorResponse)
    ),
    tag = "gateway"
)]
pub async fn restart(
    headers: HeaderMap,
    config: Extension<Arc<GatewayConfig>>,
    Extension(restart): Extension<RestartHandle>,
) -> Response {
    if let Err(status) = session::require_session(&headers, config.session_secret()) {
        return (
            status,
            Json(ErrorResponse::with_code(
                "Authentication required",
                CODE_SESSION_EXPIRED,
            )),
        )
            .into_response();
    }

    info!("Restart requested, signalling graceful shutdown");
    if restart.0.send(()).is_err() {
        error!("Restart channel closed; shutdown already in progress");
    }

    Json(RestartResponse { restarting: true }).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::COOKIE;
    use axum::http::{HeaderValue, StatusCode};
    use secrecy::SecretString;
    use tokio::sync::mpsc;

    fn secret() -> SecretString {
        SecretString::from("settings-test-secret")
    }

    fn config() -> Extension<Arc<GatewayConfig>> {
        Extension(Arc::new(GatewayConfig::new(
            "http://localhost:3000".to_string(),
            secret(),
        )))
    }

    #[tokio::test]
    async fn restart_requires_session() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let response = restart(HeaderMap::new(), config(), Extension(RestartHandle(tx))).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn restart_signals_shutdown_channel() {
        let token =
            session::sign_session(&secret(), "user-1", "a@example.com", 3600).expect("sign");
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("pordisto_session={token}")).expect("header"),
        );

        let (tx, mut rx) = mpsc::unbounded_channel();
        let response = restart(headers, config(), Extension(RestartHandle(tx))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(rx.try_recv().is_ok());
    }
}
