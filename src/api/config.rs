//! Immutable gateway configuration, injected once at process start.

use secrecy::SecretString;

const DEFAULT_SESSION_TTL_SECONDS: i64 = 30 * 24 * 60 * 60;
const DEFAULT_MAGIC_LINK_TTL_SECONDS: i64 = 15 * 60;
const DEFAULT_TOKEN_SWEEP_SECONDS: u64 = 60 * 60;
const DEFAULT_EMAIL_FROM: &str = "login@pordisto.dev";

#[derive(Clone, Debug)]
pub struct GatewayConfig {
    base_url: String,
    session_secret: SecretString,
    session_ttl_seconds: i64,
    magic_link_ttl_seconds: i64,
    token_sweep_seconds: u64,
    email_api_key: Option<SecretString>,
    email_from: String,
    backend_url: Option<String>,
    whoop_client_id: Option<String>,
    whoop_redirect_uri: Option<String>,
}

impl GatewayConfig {
    #[must_use]
    pub fn new(base_url: String, session_secret: SecretString) -> Self {
        // Ensure the base URL does not carry a trailing slash; link and
        // origin construction relies on it.
        let base_url = base_url.trim_end_matches('/').to_string();

        Self {
            base_url,
            session_secret,
            session_ttl_seconds: DEFAULT_SESSION_TTL_SECONDS,
            magic_link_ttl_seconds: DEFAULT_MAGIC_LINK_TTL_SECONDS,
            token_sweep_seconds: DEFAULT_TOKEN_SWEEP_SECONDS,
            email_api_key: None,
            email_from: DEFAULT_EMAIL_FROM.to_string(),
            backend_url: None,
            whoop_client_id: None,
            whoop_redirect_uri: None,
        }
    }

    #[must_use]
    pub fn with_session_ttl_seconds(mut self, seconds: i64) -> Self {
        self.session_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_magic_link_ttl_seconds(mut self, seconds: i64) -> Self {
        self.magic_link_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_token_sweep_seconds(mut self, seconds: u64) -> Self {
        self.token_sweep_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_email_api_key(mut self, key: SecretString) -> Self {
        self.email_api_key = Some(key);
        self
    }

    #[must_use]
    pub fn with_email_from(mut self, from: String) -> Self {
        self.email_from = from;
        self
    }

    #[must_use]
    pub fn with_backend_url(mut self, url: String) -> Self {
        self.backend_url = Some(url.trim_end_matches('/').to_string());
        self
    }

    #[must_use]
    pub fn with_whoop_provider(mut self, client_id: String, redirect_uri: String) -> Self {
        self.whoop_client_id = Some(client_id);
        self.whoop_redirect_uri = Some(redirect_uri);
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn session_secret(&self) -> &SecretString {
        &self.session_secret
    }

    pub(crate) fn session_ttl_seconds(&self) -> i64 {
        self.session_ttl_seconds
    }

    pub(crate) fn magic_link_ttl_seconds(&self) -> i64 {
        self.magic_link_ttl_seconds
    }

    pub(crate) fn token_sweep_seconds(&self) -> u64 {
        self.token_sweep_seconds
    }

    pub(crate) fn email_api_key(&self) -> Option<&SecretString> {
        self.email_api_key.as_ref()
    }

    pub(crate) fn email_from(&self) -> &str {
        &self.email_from
    }

    pub(crate) fn backend_url(&self) -> Option<&str> {
        self.backend_url.as_deref()
    }

    pub(crate) fn whoop_client_id(&self) -> Option<&str> {
        self.whoop_client_id.as_deref()
    }

    pub(crate) fn whoop_redirect_uri(&self) -> Option<&str> {
        self.whoop_redirect_uri.as_deref()
    }

    /// Session cookies carry the `Secure` attribute only when the
    /// application is served over HTTPS.
    pub(crate) fn secure_cookies(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}
