//! Outbound email delivery for magic-link messages.
//!
//! The issuer talks to an `EmailSender`; which implementation is wired in
//! depends on configuration. With an API key the HTTP sender delivers for
//! real; without one the logging sender prints the message body (which
//! carries the link) so local logins stay possible. Selection happens once
//! at startup, so the logging fallback is unreachable when a key is set.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tracing::info;

const EMAIL_API_URL: &str = "https://api.resend.com/emails";

#[derive(Clone, Debug)]
pub struct EmailMessage {
    pub to_email: String,
    pub subject: String,
    pub body: String,
}

/// Email delivery abstraction used by the magic-link issuer.
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Deliver a message or return an error; the caller logs failures and
    /// keeps its response unchanged.
    async fn send(&self, message: &EmailMessage) -> Result<()>;
}

/// Local dev sender that logs the message instead of sending real email.
#[derive(Clone, Debug)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        info!(
            to_email = %message.to_email,
            subject = %message.subject,
            body = %message.body,
            "email delivery not configured, logging message"
        );
        Ok(())
    }
}

/// Sender backed by the email provider's HTTP API.
pub struct ApiEmailSender {
    client: Client,
    api_key: SecretString,
    from: String,
}

impl ApiEmailSender {
    /// # Errors
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(api_key: SecretString, from: String) -> Result<Self> {
        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .build()
            .context("failed to build email client")?;
        Ok(Self {
            client,
            api_key,
            from,
        })
    }
}

#[async_trait]
impl EmailSender for ApiEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<()> {
        let response = self
            .client
            .post(EMAIL_API_URL)
            .bearer_auth(self.api_key.expose_secret())
            .json(&json!({
                "from": self.from,
                "to": [message.to_email],
                "subject": message.subject,
                "text": message.body,
            }))
            .send()
            .await
            .context("failed to reach email API")?;

        if !response.status().is_success() {
            bail!("email API returned {}", response.status());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_sender_always_succeeds() {
        let message = EmailMessage {
            to_email: "a@example.com".to_string(),
            subject: "Your sign-in link".to_string(),
            body: "link".to_string(),
        };
        assert!(LogEmailSender.send(&message).await.is_ok());
    }

    #[test]
    fn api_sender_constructs() {
        let sender = ApiEmailSender::new(
            SecretString::from("re_test"),
            "login@pordisto.dev".to_string(),
        );
        assert!(sender.is_ok());
    }
}
