//! Best-effort mirroring of locally created users into the backend identity
//! system.
//!
//! The local commit is authoritative for the signup response; this module is
//! the second phase, running on a detached task with its own error channel.
//! A user existing locally with `backend_user_id` NULL is a tolerated state,
//! reconciled later out of band.

use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use tracing::{error, info};
use uuid::Uuid;

use super::handlers::auth::storage;

#[derive(Deserialize)]
struct WebRegisterResponse {
    id: String,
}

/// Fire-and-forget registration with the backend. The caller's response
/// never waits on this, and loss of the `backend_user_id` update on process
/// termination is tolerated.
pub(crate) fn spawn_web_register(
    pool: PgPool,
    backend_url: String,
    user_id: Uuid,
    email: String,
    name: Option<String>,
) {
    tokio::spawn(async move {
        if let Err(err) = web_register(&pool, &backend_url, user_id, &email, name.as_deref()).await
        {
            error!(%user_id, "Backend registration failed: {err:?}");
        }
    });
}

async fn web_register(
    pool: &PgPool,
    backend_url: &str,
    user_id: Uuid,
    email: &str,
    name: Option<&str>,
) -> Result<()> {
    let client = Client::builder()
        .user_agent(crate::APP_USER_AGENT)
        .build()
        .context("failed to build backend client")?;

    // The backend treats web-register as retry-tolerant; at-most-once
    // delivery is not guaranteed here.
    let response = client
        .post(format!("{backend_url}/users/web-register"))
        .json(&json!({
            "email": email,
            "display_name": name,
            "web_user_id": user_id.to_string(),
        }))
        .send()
        .await
        .context("failed to reach backend identity system")?;

    if !response.status().is_success() {
        bail!("backend returned {}", response.status());
    }

    let body: WebRegisterResponse = response
        .json()
        .await
        .context("invalid backend registration response")?;

    storage::set_backend_user_id(pool, user_id, &body.id).await?;

    info!(%user_id, backend_user_id = %body.id, "mirrored user into backend");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::WebRegisterResponse;
    use anyhow::Result;

    #[test]
    fn web_register_response_tolerates_extra_fields() -> Result<()> {
        let body: WebRegisterResponse = serde_json::from_value(serde_json::json!({
            "id": "b2c3",
            "email": "a@example.com",
            "created_at": "2026-01-01T00:00:00Z",
        }))?;
        assert_eq!(body.id, "b2c3");
        Ok(())
    }
}
