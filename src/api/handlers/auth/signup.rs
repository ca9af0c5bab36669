//! Signup endpoint: local commit first, backend mirror second.

use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::{debug, error, instrument};

use crate::api::{backend, config::GatewayConfig};

use super::storage::{self, InsertOutcome};
use super::types::{ErrorResponse, SignupRequest, UserResponse};
use super::utils::valid_email;

#[utoipa::path(
    post,
    path = "/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 201, description = "User available under this email", body = UserResponse),
        (status = 400, description = "Missing or invalid fields", body = ErrorResponse),
        (status = 500, description = "Signup failed", body = ErrorResponse)
    ),
    tag = "auth"
)]
#[instrument(skip(pool, config, payload))]
pub async fn signup(
    pool: Extension<PgPool>,
    config: Extension<Arc<GatewayConfig>>,
    payload: Option<Json<SignupRequest>>,
) -> impl IntoResponse {
    let request: SignupRequest = match payload {
        Some(Json(payload)) => payload,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new("Missing email or password")),
            )
                .into_response()
        }
    };

    let email = request.email.trim();
    if email.is_empty() || request.password.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Missing email or password")),
        )
            .into_response();
    }
    if !valid_email(email) {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("Invalid email")),
        )
            .into_response();
    }

    // Existing accounts get the same status and shape as fresh ones, and the
    // submitted password is ignored; nothing here reveals prior existence.
    match storage::find_user_by_email(&pool, email).await {
        Ok(Some(user)) => {
            return (StatusCode::CREATED, Json(user_response(&user))).into_response();
        }
        Ok(None) => {}
        Err(err) => {
            error!("Failed to look up user during signup: {err:?}");
            return signup_failed();
        }
    }

    let password_hash = match bcrypt::hash(&request.password, bcrypt::DEFAULT_COST) {
        Ok(hash) => hash,
        Err(err) => {
            error!("Failed to hash password: {err:?}");
            return signup_failed();
        }
    };

    let user = match storage::insert_user(&pool, email, &password_hash, request.name.as_deref())
        .await
    {
        Ok(InsertOutcome::Created(user)) => {
            debug!(user_id = %user.id, "created local user");
            // Phase two: mirror into the backend identity system. The 201 is
            // already decided and never waits on this.
            if let Some(backend_url) = config.backend_url() {
                backend::spawn_web_register(
                    pool.0.clone(),
                    backend_url.to_string(),
                    user.id,
                    user.email.clone(),
                    request.name.clone(),
                );
            }
            user
        }
        Ok(InsertOutcome::Exists) => {
            // A concurrent signup won the unique constraint; answer with the
            // winner's row, same as the fast path above.
            match storage::find_user_by_email(&pool, email).await {
                Ok(Some(user)) => user,
                Ok(None) => {
                    error!("User vanished after unique violation for signup");
                    return signup_failed();
                }
                Err(err) => {
                    error!("Failed to re-read user after unique violation: {err:?}");
                    return signup_failed();
                }
            }
        }
        Err(err) => {
            error!("Failed to insert user: {err:?}");
            return signup_failed();
        }
    };

    (StatusCode::CREATED, Json(user_response(&user))).into_response()
}

fn user_response(user: &storage::UserRecord) -> UserResponse {
    UserResponse {
        id: user.id.to_string(),
        email: user.email.clone(),
    }
}

fn signup_failed() -> axum::response::Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse::new("Signup failed")),
    )
        .into_response()
}
