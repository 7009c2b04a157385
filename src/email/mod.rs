//! Email collaborator boundary.
//!
//! Delivery itself (SendGrid or whatever the deployment uses) lives behind
//! [`Mailer`]. The from-address is injected at construction through
//! [`EmailConfig`] instead of process-wide mutable state.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub from_email: String,
}

#[derive(Debug, Clone)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail delivery failed: {0}")]
    Delivery(String),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), MailError>;
}

/// Default mailer: records sends through `tracing` instead of delivering.
/// Used in development and by the test suite.
pub struct LogMailer {
    config: EmailConfig,
}

impl LogMailer {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        if email.to.is_empty() || email.subject.is_empty() || email.message.is_empty() {
            tracing::error!(to = %email.to, subject = %email.subject, "missing data to send email");
            return Ok(());
        }

        tracing::info!(
            from = %self.config.from_email,
            to = %email.to,
            subject = %email.subject,
            "email send recorded"
        );
        Ok(())
    }
}
