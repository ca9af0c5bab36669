//! Server assembly: database pool, router, middleware stack, and the
//! background token sweep.

use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{header::CONTENT_TYPE, HeaderName, HeaderValue, Method, Request},
    middleware,
    routing::{get, post},
    Extension, Router,
};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{sync::Arc, time::Duration};
use tokio::{net::TcpListener, sync::mpsc, time::sleep};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{error, info, info_span, Span};
use ulid::Ulid;
use url::Url;
use utoipa_swagger_ui::SwaggerUi;

pub(crate) mod backend;
pub mod config;
pub(crate) mod email;
pub(crate) mod gate;
pub mod handlers;
mod openapi;
pub(crate) mod session;

pub use openapi::openapi;

use config::GatewayConfig;
use email::EmailSender;
use handlers::settings::RestartHandle;

/// Start the server.
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, dsn: String, config: GatewayConfig) -> Result<()> {
    // Connect to database
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(5)
        .max_lifetime(Duration::from_secs(60 * 2))
        .test_before_acquire(true)
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    // Restart requests trigger a graceful shutdown; the supervisor restarts
    // the process.
    let (tx, mut rx) = mpsc::unbounded_channel();

    spawn_token_sweep(pool.clone(), config.token_sweep_seconds());

    // The logging sender is wired only when no API key is configured, so the
    // fallback is unreachable in a delivering deployment.
    let sender: Arc<dyn EmailSender> = match config.email_api_key() {
        Some(key) => Arc::new(email::ApiEmailSender::new(
            key.clone(),
            config.email_from().to_string(),
        )?),
        None => Arc::new(email::LogEmailSender),
    };

    let origin = frontend_origin(config.base_url())?;
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE])
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(AllowOrigin::exact(origin))
        .allow_credentials(true);

    let config = Arc::new(config);

    let app = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/auth/signup", post(handlers::auth::signup))
        .route(
            "/auth/request-magic-link",
            post(handlers::auth::request_magic_link),
        )
        .route(
            "/auth/validate-magic-token",
            get(handlers::auth::validate_magic_token),
        )
        .route(
            "/auth/exchange-magic-token",
            post(handlers::auth::exchange_magic_token),
        )
        .route("/oauth/whoop", get(handlers::oauth::whoop_authorize))
        .route("/settings/restart", post(handlers::settings::restart))
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi()))
        .fallback(handlers::not_found)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(config))
                .layer(Extension(sender))
                .layer(Extension(RestartHandle(tx)))
                .layer(Extension(pool))
                .layer(middleware::from_fn(gate::session_gate)),
        );

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            rx.recv().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

/// Periodically delete expired magic-link tokens; exchange-time checks make
/// expired rows inert, the sweep just keeps the table bounded.
fn spawn_token_sweep(pool: PgPool, interval_seconds: u64) {
    tokio::spawn(async move {
        loop {
            sleep(Duration::from_secs(interval_seconds.max(1))).await;
            match handlers::auth::storage::purge_expired_tokens(&pool).await {
                Ok(0) => {}
                Ok(purged) => info!(purged, "purged expired magic-link tokens"),
                Err(err) => error!("Failed to purge expired magic-link tokens: {err:?}"),
            }
        }
    });
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn frontend_origin(base_url: &str) -> Result<HeaderValue> {
    let parsed =
        Url::parse(base_url).with_context(|| format!("Invalid base URL: {base_url}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("Base URL must include a valid host: {base_url}"))?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build frontend origin header")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frontend_origin_strips_path() {
        let origin = frontend_origin("https://app.example.com/some/path").expect("origin");
        assert_eq!(origin, HeaderValue::from_static("https://app.example.com"));
    }

    #[test]
    fn frontend_origin_keeps_explicit_port() {
        let origin = frontend_origin("http://localhost:3000").expect("origin");
        assert_eq!(origin, HeaderValue::from_static("http://localhost:3000"));
    }

    #[test]
    fn frontend_origin_rejects_invalid_url() {
        assert!(frontend_origin("not a url").is_err());
    }
}
