use askama::Template;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;
use crate::models::{ChangeType, Item};
use crate::plugins::traits::EmailTransport;
use crate::utils::error::Result;

/// HTML price report letter, rendered from `templates/report.html`.
#[derive(Template)]
#[template(path = "report.html")]
pub struct ReportEmail<'a> {
    pub title: &'a str,
    pub items: &'a [Item],
    pub generated_at: String,
}

impl<'a> ReportEmail<'a> {
    pub fn new(title: &'a str, items: &'a [Item], now: DateTime<Utc>) -> Self {
        Self {
            title,
            items,
            generated_at: now.format("%Y-%m-%d %H:%M UTC").to_string(),
        }
    }
}

pub struct SmtpEmailSender {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpEmailSender {
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        }
        .port(config.port);

        let builder = match (&config.username, &config.password) {
            (Some(username), Some(password)) => {
                builder.credentials(Credentials::new(username.clone(), password.clone()))
            }
            _ => builder,
        };

        let from = format!("{} <{}>", config.from_name, config.from_address).parse::<Mailbox>()?;

        Ok(Self {
            mailer: builder.build(),
            from,
        })
    }

    fn build_message(&self, subject: &str, html: &str, recipients: &[String]) -> Result<Message> {
        let mut builder = Message::builder().from(self.from.clone()).subject(subject);
        for recipient in recipients {
            builder = builder.bcc(recipient.parse::<Mailbox>()?);
        }

        Ok(builder.header(ContentType::TEXT_HTML).body(html.to_string())?)
    }
}

#[async_trait]
impl EmailTransport for SmtpEmailSender {
    async fn send_batch(&self, subject: &str, html: &str, recipients: &[String]) -> Result<()> {
        if recipients.is_empty() {
            return Ok(());
        }

        let message = self.build_message(subject, html, recipients)?;
        self.mailer.send(message).await?;

        tracing::debug!(recipients = recipients.len(), "Report email sent");
        Ok(())
    }
}
