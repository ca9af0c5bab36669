//! Provider OAuth entry point: session-gated redirect to the authorize URL.
//!
//! The gateway only constructs the redirect; code exchange and token storage
//! belong to the provider callback flow in the application.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use std::sync::Arc;
use tracing::error;
use url::Url;

use crate::api::{config::GatewayConfig, gate::CODE_SESSION_EXPIRED, session};

use super::auth::types::ErrorResponse;

const WHOOP_AUTHORIZE_URL: &str = "https://api.prod.whoop.com/oauth/oauth2/auth";
const WHOOP_SCOPES: &str = "read:recovery read:sleep read:workout read:cycles read:profile offline";

#[utoipa::path(
    get,
    path = "/oauth/whoop",
    responses(
        (status = 307, description = "Redirect to the provider authorize endpoint"),
        (status = 401, description = "No valid session", body = ErrorResponse),
        (status = 500, description = "Provider not configured", body = ErrorResponse)
    ),
    tag = "oauth"
)]
pub async fn whoop_authorize(
    headers: HeaderMap,
    config: Extension<Arc<GatewayConfig>>,
) -> Response {
    let claims = match session::require_session(&headers, config.session_secret()) {
        Ok(claims) => claims,
        Err(status) => {
            return (
                status,
                Json(ErrorResponse::with_code(
                    "Authentication required",
                    CODE_SESSION_EXPIRED,
                )),
            )
                .into_response()
        }
    };

    let (Some(client_id), Some(redirect_uri)) =
        (config.whoop_client_id(), config.whoop_redirect_uri())
    else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new("Whoop provider is not configured")),
        )
            .into_response();
    };

    // `state` carries the user id so the callback can attribute the grant.
    let url = match Url::parse_with_params(
        WHOOP_AUTHORIZE_URL,
        &[
            ("response_type", "code"),
            ("client_id", client_id),
            ("redirect_uri", redirect_uri),
            ("scope", WHOOP_SCOPES),
            ("state", claims.sub.as_str()),
        ],
    ) {
        Ok(url) => url,
        Err(err) => {
            error!("Failed to build Whoop authorize URL: {err}");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse::new("Failed to build authorize URL")),
            )
                .into_response();
        }
    };

    Redirect::temporary(url.as_str()).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::{COOKIE, LOCATION};
    use axum::http::HeaderValue;
    use secrecy::SecretString;

    fn secret() -> SecretString {
        SecretString::from("oauth-test-secret")
    }

    fn config(whoop: bool) -> Extension<Arc<GatewayConfig>> {
        let mut config = GatewayConfig::new("http://localhost:3000".to_string(), secret());
        if whoop {
            config = config.with_whoop_provider(
                "client-1".to_string(),
                "http://localhost:3000/oauth/whoop/callback".to_string(),
            );
        }
        Extension(Arc::new(config))
    }

    fn session_headers() -> HeaderMap {
        let token =
            session::sign_session(&secret(), "user-1", "a@example.com", 3600).expect("sign");
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(&format!("pordisto_session={token}")).expect("header"),
        );
        headers
    }

    #[tokio::test]
    async fn whoop_requires_session() {
        let response = whoop_authorize(HeaderMap::new(), config(true)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn whoop_unconfigured_is_500() {
        let response = whoop_authorize(session_headers(), config(false)).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn whoop_redirects_with_state() {
        let response = whoop_authorize(session_headers(), config(true)).await;
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        assert!(location.starts_with("https://api.prod.whoop.com/oauth/oauth2/auth?"));
        assert!(location.contains("response_type=code"));
        assert!(location.contains("client_id=client-1"));
        assert!(location.contains("state=user-1"));
    }
}
