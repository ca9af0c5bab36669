use crate::api::{self, config::GatewayConfig};
use anyhow::Result;
use secrecy::SecretString;

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub base_url: String,
    pub session_secret: SecretString,
    pub session_ttl_seconds: i64,
    pub magic_link_ttl_seconds: i64,
    pub token_sweep_seconds: u64,
    pub email_api_key: Option<SecretString>,
    pub email_from: String,
    pub backend_url: Option<String>,
    pub whoop_client_id: Option<String>,
    pub whoop_redirect_uri: Option<String>,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the configuration is invalid or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let mut config = GatewayConfig::new(args.base_url, args.session_secret)
        .with_session_ttl_seconds(args.session_ttl_seconds)
        .with_magic_link_ttl_seconds(args.magic_link_ttl_seconds)
        .with_token_sweep_seconds(args.token_sweep_seconds)
        .with_email_from(args.email_from);

    if let Some(key) = args.email_api_key {
        config = config.with_email_api_key(key);
    }
    if let Some(url) = args.backend_url {
        config = config.with_backend_url(url);
    }
    if let (Some(client_id), Some(redirect_uri)) = (args.whoop_client_id, args.whoop_redirect_uri) {
        config = config.with_whoop_provider(client_id, redirect_uri);
    }

    api::new(args.port, args.dsn, config).await
}
