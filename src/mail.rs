use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;

use crate::config::AppConfig;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail transport not configured")]
    NotConfigured,
    #[error("mail relay request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("mail relay rejected message with status {0}")]
    Rejected(u16),
}

#[derive(Debug, Clone, Serialize)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub html: String,
}

impl OutgoingMail {
    pub fn credentials(to: &str, username: &str, password: &str) -> Self {
        let html = format!(
            "<html><body>\
             <h2>Welcome to Casebook</h2>\
             <p>Your account has been created. Here are your credentials:</p>\
             <p><strong>Username:</strong> {username}</p>\
             <p><strong>Password:</strong> {password}</p>\
             <p>Please log in and change your password immediately.</p>\
             <p>This is an automated message, please do not reply.</p>\
             </body></html>"
        );
        Self {
            to: to.to_string(),
            subject: "Your new account credentials".to_string(),
            html,
        }
    }
}

#[async_trait]
pub trait Mailer: Send + Sync + 'static {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError>;
}

/// Posts messages as JSON to an HTTP mail relay.
pub struct RelayMailer {
    client: Client,
    endpoint: String,
    token: Option<String>,
    sender: String,
}

#[derive(Serialize)]
struct RelayPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    html: &'a str,
}

impl RelayMailer {
    pub fn new(endpoint: impl Into<String>, token: Option<String>, sender: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            token,
            sender: sender.into(),
        }
    }
}

#[async_trait]
impl Mailer for RelayMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), MailError> {
        let mut request = self.client.post(&self.endpoint).json(&RelayPayload {
            from: &self.sender,
            to: &mail.to,
            subject: &mail.subject,
            html: &mail.html,
        });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(MailError::Rejected(response.status().as_u16()));
        }
        Ok(())
    }
}

/// Used when no relay is configured. Every send fails, which callers treat
/// as a non-fatal warning.
pub struct DisabledMailer;

#[async_trait]
impl Mailer for DisabledMailer {
    async fn send(&self, _mail: &OutgoingMail) -> Result<(), MailError> {
        Err(MailError::NotConfigured)
    }
}

pub fn mailer_from_config(config: &AppConfig) -> Arc<dyn Mailer> {
    match &config.mail_relay_url {
        Some(endpoint) => Arc::new(RelayMailer::new(
            endpoint.clone(),
            config.mail_relay_token.clone(),
            config.mail_sender.clone(),
        )),
        None => Arc::new(DisabledMailer),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credentials_mail_contains_login_details() {
        let mail = OutgoingMail::credentials("clerk@example.com", "clerk", "Xy7!abc#");
        assert_eq!(mail.to, "clerk@example.com");
        assert!(mail.html.contains("<strong>Username:</strong> clerk"));
        assert!(mail.html.contains("Xy7!abc#"));
    }

    #[tokio::test]
    async fn disabled_mailer_reports_not_configured() {
        let err = DisabledMailer
            .send(&OutgoingMail::credentials("a@b.co", "a", "p"))
            .await
            .expect_err("disabled mailer never sends");
        assert!(matches!(err, MailError::NotConfigured));
    }
}
