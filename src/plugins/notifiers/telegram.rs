use async_trait::async_trait;
use std::collections::HashMap;
use teloxide::prelude::*;

use crate::models::{ChangeType, Item};
use crate::plugins::traits::ChatTransport;
use crate::utils::error::{AppError, Result};

const DEFAULT_GLYPH: &str = "⬜";

pub struct TelegramNotifier {
    bot: Bot,
}

impl TelegramNotifier {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl ChatTransport for TelegramNotifier {
    async fn send_to_handle(&self, chat_id: i64, text: &str) -> Result<()> {
        self.bot
            .send_message(ChatId(chat_id), text)
            .await
            .map_err(|e| AppError::Chat(format!("chat {}: {}", chat_id, e)))?;
        Ok(())
    }
}

/// Renders the chat version of the price report.
#[derive(Debug, Clone)]
pub struct ReportFormatter {
    variant_glyphs: HashMap<String, String>,
}

impl ReportFormatter {
    /// Variant codes match case-insensitively; config sources lowercase map keys.
    pub fn new(variant_glyphs: HashMap<String, String>) -> Self {
        let variant_glyphs = variant_glyphs
            .into_iter()
            .map(|(variant, glyph)| (variant.to_ascii_uppercase(), glyph))
            .collect();
        Self { variant_glyphs }
    }

    fn glyph(&self, variant: &str) -> &str {
        self.variant_glyphs
            .get(&variant.to_ascii_uppercase())
            .map(String::as_str)
            .unwrap_or(DEFAULT_GLYPH)
    }

    pub fn format_item(&self, item: &Item) -> String {
        let (trend, sign) = match item.change_type() {
            ChangeType::Increased => ("📈", "+"),
            ChangeType::Decreased => ("📉", ""),
            ChangeType::Unchanged => ("0️⃣", ""),
        };

        format!(
            "{} {}:\n 💰 price: {:.2} | {} change: {}{:.2}\n",
            item.name,
            self.glyph(&item.variant),
            item.price,
            trend,
            sign,
            item.delta
        )
    }

    pub fn format(&self, items: &[Item]) -> String {
        items
            .iter()
            .map(|item| self.format_item(item))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
