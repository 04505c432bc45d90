use async_trait::async_trait;

use crate::utils::error::Result;

/// Delivers one HTML letter to a batch of addresses.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send_batch(&self, subject: &str, html: &str, recipients: &[String]) -> Result<()>;
}

/// Delivers a plain-text message to a single chat.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send_to_handle(&self, chat_id: i64, text: &str) -> Result<()>;
}
