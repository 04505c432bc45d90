use askama::Template;
use chrono::Utc;
use metrics::counter;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::timeout;

use crate::models::{Item, Recipient};
use crate::plugins::notifiers::{ReportEmail, ReportFormatter};
use crate::plugins::traits::{ChatTransport, EmailTransport};
use crate::storage::RecipientDirectory;
use crate::utils::error::{AppError, Result};

/// Split recipients into email addresses and chat ids. One recipient may land in both.
pub fn partition_recipients(recipients: &[Recipient]) -> (Vec<String>, Vec<i64>) {
    let emails = recipients
        .iter()
        .filter_map(|r| r.usable_email().map(str::to_string))
        .collect();
    let chats = recipients.iter().filter_map(|r| r.chat_id).collect();
    (emails, chats)
}

pub struct ReportDispatcher {
    recipients: Arc<dyn RecipientDirectory>,
    email: Arc<dyn EmailTransport>,
    chat: Arc<dyn ChatTransport>,
    formatter: ReportFormatter,
    subject: String,
    timeout: Duration,
}

impl ReportDispatcher {
    const OP: &'static str = "ReportDispatcher::send_report";

    pub fn new(
        recipients: Arc<dyn RecipientDirectory>,
        email: Arc<dyn EmailTransport>,
        chat: Arc<dyn ChatTransport>,
        formatter: ReportFormatter,
        subject: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            recipients,
            email,
            chat,
            formatter,
            subject: subject.into(),
            timeout,
        }
    }

    /// Send the report to every recipient over both channels.
    ///
    /// Both channels always run to completion. If anything failed, the first
    /// failure observed is returned and the rest are only logged.
    pub async fn send_report(&self, items: &[Item]) -> Result<()> {
        let recipients = match timeout(self.timeout, self.recipients.list_recipients()).await {
            Ok(result) => result.map_err(|e| AppError::dispatch(Self::OP, e))?,
            Err(_) => {
                return Err(AppError::dispatch(
                    Self::OP,
                    AppError::Store("recipient lookup timed out".to_string()),
                ));
            }
        };

        if recipients.is_empty() {
            tracing::info!("No recipients registered, skipping report");
            return Ok(());
        }

        let (emails, chats) = partition_recipients(&recipients);
        let email_channels = usize::from(!emails.is_empty());
        let mut errors: Vec<AppError> = Vec::with_capacity(email_channels + chats.len());
        let mut tasks = JoinSet::new();

        if !emails.is_empty() {
            match ReportEmail::new(&self.subject, items, Utc::now()).render() {
                Ok(html) => {
                    let email = Arc::clone(&self.email);
                    let subject = self.subject.clone();
                    let limit = self.timeout;
                    tasks.spawn(async move {
                        match timeout(limit, email.send_batch(&subject, &html, &emails)).await {
                            Ok(result) => result,
                            Err(_) => Err(AppError::Email("report batch timed out".to_string())),
                        }
                    });
                }
                Err(e) => errors.push(e.into()),
            }
        }

        if !chats.is_empty() {
            let text: Arc<str> = self.formatter.format(items).into();
            for chat_id in chats {
                let chat = Arc::clone(&self.chat);
                let text = Arc::clone(&text);
                let limit = self.timeout;
                tasks.spawn(async move {
                    match timeout(limit, chat.send_to_handle(chat_id, &text)).await {
                        Ok(result) => result,
                        Err(_) => Err(AppError::Chat(format!("send to chat {} timed out", chat_id))),
                    }
                });
            }
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => errors.push(e),
                Err(e) => errors.push(AppError::Internal(format!("delivery task failed: {}", e))),
            }
        }

        let mut errors = errors.into_iter();
        match errors.next() {
            None => Ok(()),
            Some(first) => {
                for other in errors {
                    tracing::warn!(error = %other, "Additional report delivery failure");
                }
                counter!("ifall_dispatch_failures_total").increment(1);
                Err(AppError::dispatch(Self::OP, first))
            }
        }
    }
}
