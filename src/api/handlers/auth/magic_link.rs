//! Magic-link endpoints: request, validate (redirect), and exchange.

use axum::{
    extract::{Extension, Query},
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{error, instrument};
use url::form_urlencoded;

use crate::api::{
    config::GatewayConfig,
    email::{EmailMessage, EmailSender},
    session,
};

use super::storage;
use super::types::{
    ErrorResponse, ExchangeRequest, MagicLinkRequest, MessageResponse, UserResponse,
    ValidateTokenQuery,
};
use super::utils::{build_magic_link_url, generate_magic_token, hash_magic_token};

/// Constant acknowledgement, identical whether or not the address resolves.
const MAGIC_LINK_MESSAGE: &str = "If that email exists, a magic link has been sent.";

#[utoipa::path(
    post,
    path = "/auth/request-magic-link",
    request_body = MagicLinkRequest,
    responses(
        (status = 200, description = "Acknowledged; same body for registered and unknown addresses", body = MessageResponse),
        (status = 400, description = "Missing email", body = ErrorResponse)
    ),
    tag = "auth"
)]
#[instrument(skip(pool, config, sender, payload))]
pub async fn request_magic_link(
    pool: Extension<PgPool>,
    config: Extension<Arc<GatewayConfig>>,
    sender: Extension<Arc<dyn EmailSender>>,
    payload: Option<Json<MagicLinkRequest>>,
) -> impl IntoResponse {
    let request: MagicLinkRequest = match payload {
        Some(Json(payload)) => payload,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("Missing email")),
            )
                .into_response()
        }
    };

    let email = request.email.trim().to_string();
    if email.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Missing email")),
        )
            .into_response();
    }

    // Everything below is anti-enumeration territory: failures are logged
    // and the acknowledgement goes out unchanged.
    match storage::find_user_by_email(&pool, &email).await {
        Ok(Some(user)) => {
            if let Err(err) = issue_magic_link(&pool, &config, &sender.0, &user.email).await {
                error!("Failed to issue magic link: {err:?}");
            }
        }
        Ok(None) => {}
        Err(err) => {
            error!("Failed to look up user for magic link: {err:?}");
        }
    }

    (
        StatusCode::OK,
        Json(MessageResponse {
            message: MAGIC_LINK_MESSAGE.to_string(),
        }),
    )
        .into_response()
}

/// Generate, persist, and dispatch one magic link. Earlier live tokens for
/// the same address stay valid.
async fn issue_magic_link(
    pool: &PgPool,
    config: &GatewayConfig,
    sender: &Arc<dyn EmailSender>,
    email: &str,
) -> anyhow::Result<()> {
    let token = generate_magic_token()?;
    let token_hash = hash_magic_token(&token);

    storage::insert_magic_link_token(pool, email, &token_hash, config.magic_link_ttl_seconds())
        .await?;

    let link = build_magic_link_url(config.base_url(), &token);
    let minutes = config.magic_link_ttl_seconds() / 60;
    let message = EmailMessage {
        to_email: email.to_string(),
        subject: "Your sign-in link".to_string(),
        body: format!(
            "Sign in by opening this link: {link}\n\
             The link expires in {minutes} minutes and can be used once."
        ),
    };

    sender.send(&message).await
}

#[utoipa::path(
    get,
    path = "/auth/validate-magic-token",
    params(ValidateTokenQuery),
    responses(
        (status = 307, description = "Redirect to /login carrying the token, or an InvalidToken error marker")
    ),
    tag = "auth"
)]
pub async fn validate_magic_token(Query(query): Query<ValidateTokenQuery>) -> Redirect {
    // The raw token is only forwarded for the client-side exchange; it is
    // never logged here.
    match query.token {
        Some(token) if !token.is_empty() => {
            let query: String = form_urlencoded::Serializer::new(String::new())
                .append_pair("magic-token", &token)
                .finish();
            Redirect::temporary(&format!("/login?{query}"))
        }
        _ => Redirect::temporary("/login?error=InvalidToken"),
    }
}

#[utoipa::path(
    post,
    path = "/auth/exchange-magic-token",
    request_body = ExchangeRequest,
    responses(
        (status = 200, description = "Token accepted; session cookie set", body = UserResponse),
        (status = 400, description = "Missing fields", body = ErrorResponse),
        (status = 401, description = "Unknown, expired, or already-used link", body = ErrorResponse)
    ),
    tag = "auth"
)]
#[instrument(skip(pool, config, payload))]
pub async fn exchange_magic_token(
    pool: Extension<PgPool>,
    config: Extension<Arc<GatewayConfig>>,
    payload: Option<Json<ExchangeRequest>>,
) -> impl IntoResponse {
    let request: ExchangeRequest = match payload {
        Some(Json(payload)) => payload,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("Missing email or token")),
            )
                .into_response()
        }
    };

    let email = request.email.trim();
    let token = request.token.trim();
    if email.is_empty() || token.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Missing email or token")),
        )
            .into_response();
    }

    // One generic rejection for unknown, expired, and replayed links.
    let token_hash = hash_magic_token(token);
    match storage::consume_magic_link_token(&pool, email, &token_hash).await {
        Ok(true) => {}
        Ok(false) => return rejected(),
        Err(err) => {
            error!("Failed to consume magic-link token: {err:?}");
            return exchange_failed();
        }
    }

    let user = match storage::find_user_by_email(&pool, email).await {
        Ok(Some(user)) => user,
        Ok(None) => return rejected(),
        Err(err) => {
            error!("Failed to look up user for exchange: {err:?}");
            return exchange_failed();
        }
    };

    // Possession of the link proves mailbox ownership; not fatal if the
    // stamp fails, the session is still established.
    if let Err(err) = storage::mark_email_verified(&pool, user.id).await {
        error!("Failed to mark email verified: {err:?}");
    }

    let credential = match session::sign_session(
        config.session_secret(),
        &user.id.to_string(),
        &user.email,
        config.session_ttl_seconds(),
    ) {
        Ok(credential) => credential,
        Err(err) => {
            error!("Failed to sign session credential: {err:?}");
            return exchange_failed();
        }
    };

    let mut headers = HeaderMap::new();
    if let Ok(cookie) = session::session_cookie(
        &credential,
        config.session_ttl_seconds(),
        config.secure_cookies(),
    ) {
        headers.insert(SET_COOKIE, cookie);
    }

    (
        StatusCode::OK,
        headers,
        Json(UserResponse {
            id: user.id.to_string(),
            email: user.email,
        }),
    )
        .into_response()
}

fn rejected() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse::new("Invalid or expired link")),
    )
        .into_response()
}

fn exchange_failed() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new("Login failed")),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::email::LogEmailSender;
    use anyhow::Result;
    use axum::http::header::LOCATION;
    use secrecy::SecretString;
    use sqlx::postgres::PgPoolOptions;

    fn config() -> Arc<GatewayConfig> {
        Arc::new(GatewayConfig::new(
            "http://localhost:3000".to_string(),
            SecretString::from("secret"),
        ))
    }

    fn sender() -> Arc<dyn EmailSender> {
        Arc::new(LogEmailSender)
    }

    #[tokio::test]
    async fn request_magic_link_missing_payload() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = request_magic_link(
            Extension(pool),
            Extension(config()),
            Extension(sender()),
            None,
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn request_magic_link_empty_email() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = request_magic_link(
            Extension(pool),
            Extension(config()),
            Extension(sender()),
            Some(Json(MagicLinkRequest {
                email: " ".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn validate_magic_token_without_token_redirects_with_error() {
        let response = validate_magic_token(Query(ValidateTokenQuery { token: None }))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok()),
            Some("/login?error=InvalidToken")
        );
    }

    #[tokio::test]
    async fn validate_magic_token_forwards_token() {
        let response = validate_magic_token(Query(ValidateTokenQuery {
            token: Some("opaque-token".to_string()),
        }))
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok()),
            Some("/login?magic-token=opaque-token")
        );
    }

    #[tokio::test]
    async fn exchange_magic_token_missing_payload() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = exchange_magic_token(Extension(pool), Extension(config()), None)
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }

    #[tokio::test]
    async fn exchange_magic_token_empty_token() -> Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/postgres")?;
        let response = exchange_magic_token(
            Extension(pool),
            Extension(config()),
            Some(Json(ExchangeRequest {
                email: "a@example.com".to_string(),
                token: "".to_string(),
            })),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        Ok(())
    }
}
