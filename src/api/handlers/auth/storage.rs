//! Database helpers for users and magic-link tokens.
//!
//! All expiry arithmetic happens in SQL so the gateway never compares
//! wall-clock values itself; the store's unique constraints are the only
//! concurrency control.

use anyhow::{Context, Result};
use sqlx::{PgPool, Row};
use tracing::Instrument;
use uuid::Uuid;

use super::utils::is_unique_violation;

/// Minimal user fields the auth endpoints work with.
#[derive(Debug, Clone)]
pub(crate) struct UserRecord {
    pub(crate) id: Uuid,
    pub(crate) email: String,
}

/// Outcome when attempting to create a new user row.
#[derive(Debug)]
pub(crate) enum InsertOutcome {
    Created(UserRecord),
    /// Lost the race to a concurrent signup for the same email.
    Exists,
}

pub(crate) async fn find_user_by_email(pool: &PgPool, email: &str) -> Result<Option<UserRecord>> {
    let query = "SELECT id, email FROM users WHERE email = $1";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to look up user by email")?;

    Ok(row.map(|row| UserRecord {
        id: row.get("id"),
        email: row.get("email"),
    }))
}

/// Insert a locally signed-up user. Local signup implies immediate trust, so
/// `email_verified_at` is stamped at creation time.
pub(crate) async fn insert_user(
    pool: &PgPool,
    email: &str,
    password_hash: &str,
    name: Option<&str>,
) -> Result<InsertOutcome> {
    let query = r"
        INSERT INTO users (email, password, name, email_verified_at)
        VALUES ($1, $2, $3, NOW())
        RETURNING id, email
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .bind(password_hash)
        .bind(name)
        .fetch_one(pool)
        .instrument(span)
        .await;

    match row {
        Ok(row) => Ok(InsertOutcome::Created(UserRecord {
            id: row.get("id"),
            email: row.get("email"),
        })),
        Err(err) if is_unique_violation(&err) => Ok(InsertOutcome::Exists),
        Err(err) => Err(err).context("failed to insert user"),
    }
}

/// Persist the backend identifier once the mirror call has succeeded.
pub(crate) async fn set_backend_user_id(
    pool: &PgPool,
    user_id: Uuid,
    backend_user_id: &str,
) -> Result<()> {
    let query = r"
        UPDATE users
        SET backend_user_id = $2,
            updated_at = NOW()
        WHERE id = $1
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .bind(backend_user_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to set backend user id")?;
    Ok(())
}

/// A successful magic-link exchange proves mailbox ownership.
pub(crate) async fn mark_email_verified(pool: &PgPool, user_id: Uuid) -> Result<()> {
    let query = r"
        UPDATE users
        SET email_verified_at = NOW(),
            updated_at = NOW()
        WHERE id = $1
          AND email_verified_at IS NULL
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );
    sqlx::query(query)
        .bind(user_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to mark email verified")?;
    Ok(())
}

/// Insert a new magic-link token row. Earlier unexpired tokens for the same
/// identifier stay live; issuing never invalidates them.
pub(crate) async fn insert_magic_link_token(
    pool: &PgPool,
    identifier: &str,
    token_hash: &[u8],
    ttl_seconds: i64,
) -> Result<()> {
    let query = r"
        INSERT INTO magic_link_tokens (identifier, token_hash, expires_at)
        VALUES ($1, $2, NOW() + ($3 * INTERVAL '1 second'))
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    sqlx::query(query)
        .bind(identifier)
        .bind(token_hash)
        .bind(ttl_seconds)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to insert magic-link token")?;
    Ok(())
}

/// Consume a magic-link token: the delete succeeds at most once and only
/// strictly before expiry, which enforces single use without extra locking.
pub(crate) async fn consume_magic_link_token(
    pool: &PgPool,
    identifier: &str,
    token_hash: &[u8],
) -> Result<bool> {
    let query = r"
        DELETE FROM magic_link_tokens
        WHERE token_hash = $1
          AND identifier = $2
          AND expires_at > NOW()
        RETURNING identifier
    ";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(token_hash)
        .bind(identifier)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to consume magic-link token")?;

    Ok(row.is_some())
}

/// Remove expired token rows; called by the background sweep.
pub(crate) async fn purge_expired_tokens(pool: &PgPool) -> Result<u64> {
    let query = "DELETE FROM magic_link_tokens WHERE expires_at <= NOW()";
    let span = tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );
    let result = sqlx::query(query)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to purge expired magic-link tokens")?;
    Ok(result.rows_affected())
}
