//! Session credential verification and cookie handling.
//!
//! The session is an opaque signed value carried in a cookie. The gate only
//! verifies it against the shared secret; signing happens in the magic-token
//! exchange once a login credential has been accepted.

use anyhow::{Context, Result};
use axum::http::{
    header::{InvalidHeaderValue, COOKIE},
    HeaderMap, HeaderValue, StatusCode,
};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

pub(crate) const SESSION_COOKIE_NAME: &str = "pordisto_session";
pub(crate) const SECURE_SESSION_COOKIE_NAME: &str = "__Secure-pordisto_session";

/// Claims carried by the signed session credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (user id)
    pub sub: String,
    /// Email the session was established for
    pub email: String,
    /// Issued at (unix seconds)
    pub iat: u64,
    /// Expiration time (unix seconds)
    pub exp: u64,
}

/// How a session credential failed to verify. Absence and expiry are the
/// normal unauthenticated states; `Invalid` means the credential could not
/// be parsed or its signature did not check out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionError {
    Missing,
    Expired,
    Invalid,
}

fn unix_now() -> Result<u64> {
    Ok(SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock is before the unix epoch")?
        .as_secs())
}

/// Sign a new session credential for a verified login.
///
/// # Errors
/// Returns an error if the claims cannot be encoded.
pub(crate) fn sign_session(
    secret: &SecretString,
    user_id: &str,
    email: &str,
    ttl_seconds: i64,
) -> Result<String> {
    let now = unix_now()?;
    let claims = SessionClaims {
        sub: user_id.to_string(),
        email: email.to_string(),
        iat: now,
        exp: now + u64::try_from(ttl_seconds).unwrap_or(0),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.expose_secret().as_bytes()),
    )
    .context("failed to sign session credential")
}

/// Verify a raw session credential against the shared secret.
pub(crate) fn verify_session(
    secret: &SecretString,
    token: &str,
) -> std::result::Result<SessionClaims, SessionError> {
    decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.expose_secret().as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|err| match err.kind() {
        ErrorKind::ExpiredSignature => SessionError::Expired,
        _ => SessionError::Invalid,
    })
}

/// Resolve the session cookie from request headers into verified claims.
pub(crate) fn session_from_headers(
    secret: &SecretString,
    headers: &HeaderMap,
) -> std::result::Result<SessionClaims, SessionError> {
    let Some(token) = extract_session_token(headers) else {
        return Err(SessionError::Missing);
    };
    verify_session(secret, &token)
}

/// Resolve the session cookie into claims, or return 401 for handlers that
/// require authentication regardless of path classification.
pub(crate) fn require_session(
    headers: &HeaderMap,
    secret: &SecretString,
) -> std::result::Result<SessionClaims, StatusCode> {
    session_from_headers(secret, headers).map_err(|_| StatusCode::UNAUTHORIZED)
}

fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == SECURE_SESSION_COOKIE_NAME || key == SESSION_COOKIE_NAME {
            return Some(val.to_string());
        }
    }
    None
}

/// Build the `Set-Cookie` value for a freshly signed session credential.
pub(crate) fn session_cookie(
    token: &str,
    ttl_seconds: i64,
    secure: bool,
) -> std::result::Result<HeaderValue, InvalidHeaderValue> {
    let name = if secure {
        SECURE_SESSION_COOKIE_NAME
    } else {
        SESSION_COOKIE_NAME
    };
    let mut cookie =
        format!("{name}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_seconds}");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Build the `Set-Cookie` values that purge both session cookies.
///
/// Used only when a presented credential fails verification; plain absence
/// never mutates cookies.
pub(crate) fn clear_session_cookies() -> Vec<HeaderValue> {
    [
        format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"),
        format!(
            "{SECURE_SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0; Secure"
        ),
    ]
    .iter()
    .filter_map(|cookie| HeaderValue::from_str(cookie).ok())
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::COOKIE;

    fn secret() -> SecretString {
        SecretString::from("test-session-secret")
    }

    fn expired_token(secret: &SecretString) -> String {
        // Two minutes past expiry clears the default validation leeway.
        let now = unix_now().expect("clock");
        let claims = SessionClaims {
            sub: "user".to_string(),
            email: "a@example.com".to_string(),
            iat: now.saturating_sub(300),
            exp: now.saturating_sub(120),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.expose_secret().as_bytes()),
        )
        .expect("encode")
    }

    #[test]
    fn sign_and_verify_round_trip() {
        let secret = secret();
        let token = sign_session(&secret, "user-1", "a@example.com", 3600).expect("sign");
        let claims = verify_session(&secret, &token).expect("verify");
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.email, "a@example.com");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn expired_credential_is_expired_not_invalid() {
        let secret = secret();
        let token = expired_token(&secret);
        assert_eq!(
            verify_session(&secret, &token),
            Err(SessionError::Expired)
        );
    }

    #[test]
    fn wrong_secret_is_invalid() {
        let token = sign_session(&secret(), "user-1", "a@example.com", 3600).expect("sign");
        let other = SecretString::from("other-secret");
        assert_eq!(verify_session(&other, &token), Err(SessionError::Invalid));
    }

    #[test]
    fn garbage_credential_is_invalid() {
        assert_eq!(
            verify_session(&secret(), "not.a.token"),
            Err(SessionError::Invalid)
        );
    }

    #[test]
    fn session_from_headers_missing_cookie() {
        let headers = HeaderMap::new();
        assert_eq!(
            session_from_headers(&secret(), &headers),
            Err(SessionError::Missing)
        );
    }

    #[test]
    fn session_from_headers_reads_both_cookie_names() {
        let secret = secret();
        let token = sign_session(&secret, "user-1", "a@example.com", 3600).expect("sign");

        for name in [SESSION_COOKIE_NAME, SECURE_SESSION_COOKIE_NAME] {
            let mut headers = HeaderMap::new();
            headers.insert(
                COOKIE,
                HeaderValue::from_str(&format!("other=1; {name}={token}")).expect("header"),
            );
            let claims = session_from_headers(&secret, &headers).expect("claims");
            assert_eq!(claims.sub, "user-1");
        }
    }

    #[test]
    fn session_cookie_attributes() {
        let plain = session_cookie("tok", 60, false).expect("cookie");
        let plain = plain.to_str().expect("str");
        assert!(plain.starts_with("pordisto_session=tok"));
        assert!(plain.contains("Max-Age=60"));
        assert!(!plain.contains("Secure"));

        let secure = session_cookie("tok", 60, true).expect("cookie");
        let secure = secure.to_str().expect("str");
        assert!(secure.starts_with("__Secure-pordisto_session=tok"));
        assert!(secure.ends_with("; Secure"));
    }

    #[test]
    fn clear_session_cookies_purges_both_names() {
        let cookies = clear_session_cookies();
        assert_eq!(cookies.len(), 2);
        for cookie in &cookies {
            let value = cookie.to_str().expect("str");
            assert!(value.contains("Max-Age=0"));
            assert!(value.contains("=;"));
        }
    }
}
