use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use scraper::{ElementRef, Html, Node, Selector};
use std::str::FromStr;
use std::sync::LazyLock;
use std::time::Duration;

use crate::config::FetcherConfig;
use crate::models::FetchedItem;
use crate::utils::error::{AppError, Result};

static NON_DIGIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\D").expect("static pattern"));

/// Source of current market prices.
///
/// Every error is treated as transient by the caller: the page being down,
/// a 5xx and a layout the parser does not understand all look the same here.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ItemFetcher: Send + Sync {
    async fn fetch(&self, id: &str) -> Result<FetchedItem>;
}

pub struct HttpItemFetcher {
    client: Client,
    base_url: String,
    name_selector: Selector,
    price_selector: Selector,
}

impl HttpItemFetcher {
    pub fn new(config: &FetcherConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            name_selector: parse_selector(&config.name_selector)?,
            price_selector: parse_selector(&config.price_selector)?,
        })
    }

    fn item_url(&self, id: &str) -> String {
        format!("{}/{}", self.base_url, id)
    }

    fn parse_page(&self, body: &str) -> Result<FetchedItem> {
        let document = Html::parse_document(body);

        let name = document
            .select(&self.name_selector)
            .next()
            .map(|el| el.text().collect::<String>().trim().to_string())
            .unwrap_or_default();

        let price_element = document
            .select(&self.price_selector)
            .next()
            .ok_or_else(|| AppError::Parse {
                message: "price element not found".to_string(),
            })?;
        let price = parse_major_price(text_without_icons(price_element).trim())?;

        Ok(FetchedItem { name, price })
    }
}

#[async_trait]
impl ItemFetcher for HttpItemFetcher {
    async fn fetch(&self, id: &str) -> Result<FetchedItem> {
        let url = self.item_url(id);
        tracing::debug!(url = %url, "Fetching item page");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(AppError::Fetch(format!("unexpected status {} from {}", status, url)));
        }

        let body = response.text().await?;
        self.parse_page(&body)
    }
}

fn parse_selector(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| AppError::Validation(format!("Invalid CSS selector '{}': {}", selector, e)))
}

/// Text of an element minus anything inside `<i>` descendants (currency icons).
fn text_without_icons(element: ElementRef<'_>) -> String {
    let mut text = String::new();
    for child in element.children() {
        match child.value() {
            Node::Text(t) => text.push_str(t),
            Node::Element(e) if e.name() == "i" => {}
            Node::Element(_) => {
                if let Some(el) = ElementRef::wrap(child) {
                    text.push_str(&text_without_icons(el));
                }
            }
            _ => {}
        }
    }
    text
}

/// Parse a whole-unit price such as `"89 990 ₽"` by keeping only its digits.
pub fn parse_major_price(raw: &str) -> Result<Decimal> {
    let cleaned = raw.replace('\u{a0}', " ");
    let digits = NON_DIGIT.replace_all(&cleaned, "");
    if digits.is_empty() {
        return Err(AppError::Parse {
            message: format!("no digits in price {:?}", raw),
        });
    }
    Decimal::from_str(&digits).map_err(|e| AppError::Parse {
        message: format!("price {:?} out of range: {}", raw, e),
    })
}
