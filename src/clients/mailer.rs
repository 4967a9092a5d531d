use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::{Mailbox, header::ContentType};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{info, instrument};

use crate::env::{AppConfig, SmtpSettings};
use crate::error::AppError;

/// Outbound email capability.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_mail(&self, to: &str, subject: &str, html_body: &str) -> Result<(), AppError>;
}

pub type MailService = Arc<dyn Mailer>;

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(settings: &SmtpSettings) -> Result<Self, AppError> {
        let from: Mailbox = settings
            .from
            .parse()
            .map_err(|e| AppError::Internal(format!("Invalid SMTP_FROM address: {}", e)))?;

        let mut builder =
            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)?.port(settings.port);

        if let (Some(username), Some(password)) = (&settings.username, &settings.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    #[instrument(skip(self, html_body))]
    async fn send_mail(&self, to: &str, subject: &str, html_body: &str) -> Result<(), AppError> {
        let to: Mailbox = to
            .parse()
            .map_err(|e| AppError::Validation(format!("Invalid recipient address: {}", e)))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html_body.to_string())?;

        self.transport.send(message).await?;
        info!("Email sent");

        Ok(())
    }
}

/// Used when no SMTP relay is configured. Mail is written to the log.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    #[instrument(skip(self, html_body))]
    async fn send_mail(&self, to: &str, subject: &str, html_body: &str) -> Result<(), AppError> {
        info!(body_len = html_body.len(), "SMTP not configured, email logged instead of sent");
        tracing::debug!(body = %html_body, "Email body");
        Ok(())
    }
}

pub fn mailer_from_config(config: &AppConfig) -> Result<MailService, AppError> {
    match &config.smtp {
        Some(settings) => {
            info!(host = %settings.host, port = settings.port, "Using SMTP mailer");
            Ok(Arc::new(SmtpMailer::new(settings)?))
        }
        None => {
            info!("SMTP_HOST not set, using log mailer");
            Ok(Arc::new(LogMailer))
        }
    }
}
