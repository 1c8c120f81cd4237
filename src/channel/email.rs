//! Email adapter delivering over SMTP via lettre.

use std::sync::Arc;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;
use crate::notification::{Channel, NotificationJob};
use crate::repository::TemplateRepository;
use crate::template::substitute;

use super::{ChannelAdapter, SendError};

/// SMTP-backed email adapter.
///
/// Renders the job body (or a referenced template's content) with
/// `{{key}}` substitution, wraps it in a fixed HTML envelope, and
/// delivers it through an async SMTP transport.
pub struct EmailAdapter {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    config: SmtpConfig,
    templates: Arc<dyn TemplateRepository>,
}

impl EmailAdapter {
    pub fn new(config: SmtpConfig, templates: Arc<dyn TemplateRepository>) -> Result<Self, SendError> {
        let transport = Self::build_transport(&config)?;
        Ok(Self {
            transport,
            config,
            templates,
        })
    }

    fn build_transport(
        config: &SmtpConfig,
    ) -> Result<AsyncSmtpTransport<Tokio1Executor>, SendError> {
        let mut builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| SendError::Configuration(format!("Invalid SMTP relay: {}", e)))?
                .port(config.port)
        } else {
            // Plaintext transport for local dev servers (Mailpit and co).
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host).port(config.port)
        };

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(builder.build())
    }

    /// Resolve the body and subject for a job: a referenced template wins
    /// over the inline message, and a job-level subject wins over the
    /// template's.
    async fn resolve_content(&self, job: &NotificationJob) -> (String, String) {
        let mut body = job.message.clone();
        let mut subject = job.subject.clone();

        if let Some(name) = &job.template {
            match self.templates.find_by_name(&job.tenant_id, name).await {
                Ok(Some(template)) => {
                    body = template.content;
                    if subject.is_none() {
                        subject = template.subject;
                    }
                }
                Ok(None) => {
                    // Unknown template name falls back to the inline message.
                    tracing::warn!(template = %name, job_id = %job.id, "Template not found, using inline message");
                }
                Err(e) => {
                    tracing::warn!(template = %name, error = %e, "Template lookup failed, using inline message");
                }
            }
        }

        let subject = subject.unwrap_or_else(|| "Notification".to_string());
        (subject, substitute(&body, &job.data))
    }

    /// Wrap the rendered body in the fixed HTML envelope with header and
    /// footer.
    fn wrap_html(subject: &str, body: &str) -> String {
        format!(
            r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="utf-8">
    <title>{subject}</title>
    <style>
      body {{ font-family: Arial, sans-serif; line-height: 1.6; color: #333; }}
      .container {{ max-width: 600px; margin: 0 auto; padding: 20px; }}
      .header {{ background: #007bff; color: white; padding: 20px; text-align: center; }}
      .content {{ padding: 20px; background: #f9f9f9; }}
      .footer {{ text-align: center; padding: 20px; font-size: 12px; color: #666; }}
    </style>
  </head>
  <body>
    <div class="container">
      <div class="header">
        <h1>Courier Platform</h1>
      </div>
      <div class="content">
        {body}
      </div>
      <div class="footer">
        <p>This email was sent by the Courier notification service. Please do not reply to this message.</p>
      </div>
    </div>
  </body>
</html>"#
        )
    }
}

#[async_trait]
impl ChannelAdapter for EmailAdapter {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    async fn send(&self, job: &NotificationJob) -> Result<(), SendError> {
        let from: Mailbox = self
            .config
            .from
            .parse()
            .map_err(|e| SendError::Configuration(format!("Invalid from address: {}", e)))?;
        let to: Mailbox = job
            .recipient
            .parse()
            .map_err(|e| SendError::Transport(format!("Invalid recipient address: {}", e)))?;

        let (subject, body) = self.resolve_content(job).await;
        let html = Self::wrap_html(&subject, &body);

        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(&subject)
            .header(ContentType::TEXT_HTML)
            .body(html)
            .map_err(|e| SendError::Transport(format!("Failed to build message: {}", e)))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| SendError::Transport(format!("SMTP send failed: {}", e)))?;

        tracing::info!(
            job_id = %job.id,
            recipient = %job.recipient,
            "Email sent"
        );
        Ok(())
    }
}
