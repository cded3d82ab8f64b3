use crate::{config::AppConfig, errors::ServiceError};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};

/// Transactional email delivery seam. The production implementation talks
/// to Brevo; dev and tests get a logging no-op.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(
        &self,
        to_email: &str,
        to_name: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<(), ServiceError>;
}

/// Brevo transactional email client
pub struct BrevoMailer {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    from_email: String,
    from_name: String,
}

#[derive(Serialize)]
struct BrevoParty {
    email: String,
    name: String,
}

#[derive(Serialize)]
struct BrevoSendRequest {
    sender: BrevoParty,
    to: Vec<BrevoParty>,
    subject: String,
    #[serde(rename = "htmlContent")]
    html_content: String,
}

impl BrevoMailer {
    pub fn new(api_key: String, base_url: String, from_email: String, from_name: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            from_email,
            from_name,
        }
    }
}

#[async_trait]
impl EmailSender for BrevoMailer {
    #[instrument(skip(self, html_body))]
    async fn send(
        &self,
        to_email: &str,
        to_name: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<(), ServiceError> {
        let body = BrevoSendRequest {
            sender: BrevoParty {
                email: self.from_email.clone(),
                name: self.from_name.clone(),
            },
            to: vec![BrevoParty {
                email: to_email.to_string(),
                name: to_name.to_string(),
            }],
            subject: subject.to_string(),
            html_content: html_body.to_string(),
        };

        let response = self
            .client
            .post(format!("{}/v3/smtp/email", self.base_url))
            .header("api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::EmailError(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ServiceError::EmailError(format!(
                "Email API returned {}",
                response.status()
            )));
        }

        info!("Sent email to {}: {}", to_email, subject);
        Ok(())
    }
}

/// Logs instead of sending. Used when no email API key is configured.
pub struct NoopMailer;

#[async_trait]
impl EmailSender for NoopMailer {
    async fn send(
        &self,
        to_email: &str,
        _to_name: &str,
        subject: &str,
        _html_body: &str,
    ) -> Result<(), ServiceError> {
        info!("Email delivery disabled; would send to {}: {}", to_email, subject);
        Ok(())
    }
}

/// Picks the mailer implementation from configuration.
pub fn mailer_from_config(config: &AppConfig) -> Arc<dyn EmailSender> {
    match &config.email_api_key {
        Some(api_key) => Arc::new(BrevoMailer::new(
            api_key.clone(),
            config.email_base_url.clone(),
            config.email_from.clone(),
            config.email_from_name.clone(),
        )),
        None => Arc::new(NoopMailer),
    }
}
