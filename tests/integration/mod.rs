// Shared fixtures for the integration suite: in-memory storage plus
// scripted fetchers and recording transports.

pub mod api_tests;
pub mod dispatch_tests;

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ifall::config::default_variant_glyphs;
use ifall::core::{CatalogUpdater, RefreshCycle, ReportDispatcher, RetryPolicy, UpdateUnit};
use ifall::models::{FetchedItem, Item, Recipient};
use ifall::plugins::notifiers::ReportFormatter;
use ifall::plugins::traits::{ChatTransport, EmailTransport};
use ifall::scraper::ItemFetcher;
use ifall::storage::{self, ItemRepository, PriceStore, RecipientDirectory};
use ifall::{AppError, Result};

pub const REPORT_SUBJECT: &str = "Daily price report";

pub fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

/// Answers each fetch from a per-item script; the last entry repeats once the script runs out.
#[derive(Default)]
pub struct ScriptedFetcher {
    scripts: Mutex<HashMap<String, VecDeque<std::result::Result<FetchedItem, String>>>>,
    calls: Mutex<HashMap<String, u32>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn succeed(self, id: &str, name: &str, price: &str) -> Self {
        self.push(id, Ok(FetchedItem {
            name: name.to_string(),
            price: dec(price),
        }))
    }

    pub fn fail(self, id: &str, times: usize) -> Self {
        (0..times).fold(self, |fetcher, _| {
            fetcher.push(id, Err(format!("{} temporarily unavailable", id)))
        })
    }

    fn push(self, id: &str, outcome: std::result::Result<FetchedItem, String>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry(id.to_string())
            .or_default()
            .push_back(outcome);
        self
    }

    pub fn calls(&self, id: &str) -> u32 {
        self.calls.lock().unwrap().get(id).copied().unwrap_or(0)
    }
}

#[async_trait]
impl ItemFetcher for ScriptedFetcher {
    async fn fetch(&self, id: &str) -> Result<FetchedItem> {
        *self.calls.lock().unwrap().entry(id.to_string()).or_default() += 1;

        let mut scripts = self.scripts.lock().unwrap();
        let script = scripts
            .get_mut(id)
            .ok_or_else(|| AppError::Fetch(format!("no page for {}", id)))?;
        let outcome = if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().cloned()
        };

        match outcome {
            Some(Ok(item)) => Ok(item),
            Some(Err(message)) => Err(AppError::Fetch(message)),
            None => Err(AppError::Fetch(format!("no page for {}", id))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentEmail {
    pub subject: String,
    pub html: String,
    pub recipients: Vec<String>,
}

#[derive(Default)]
pub struct RecordingEmail {
    pub sent: Mutex<Vec<SentEmail>>,
    pub fail: bool,
}

impl RecordingEmail {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn batches(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailTransport for RecordingEmail {
    async fn send_batch(&self, subject: &str, html: &str, recipients: &[String]) -> Result<()> {
        if self.fail {
            return Err(AppError::Email("relay refused connection".to_string()));
        }
        self.sent.lock().unwrap().push(SentEmail {
            subject: subject.to_string(),
            html: html.to_string(),
            recipients: recipients.to_vec(),
        });
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingChat {
    pub sent: Mutex<Vec<(i64, String)>>,
    pub failing_chats: HashSet<i64>,
}

impl RecordingChat {
    pub fn failing_for(chats: &[i64]) -> Self {
        Self {
            failing_chats: chats.iter().copied().collect(),
            ..Self::default()
        }
    }

    pub fn messages(&self) -> Vec<(i64, String)> {
        let mut sent = self.sent.lock().unwrap().clone();
        sent.sort_by_key(|(chat_id, _)| *chat_id);
        sent
    }
}

#[async_trait]
impl ChatTransport for RecordingChat {
    async fn send_to_handle(&self, chat_id: i64, text: &str) -> Result<()> {
        if self.failing_chats.contains(&chat_id) {
            return Err(AppError::Chat(format!("chat {}: bot was blocked by the user", chat_id)));
        }
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        Ok(())
    }
}

/// Price store without I/O, for tests that run on a paused clock.
#[derive(Default)]
pub struct MemoryStore {
    items: Mutex<HashMap<String, Item>>,
}

impl MemoryStore {
    pub fn with_prices(rows: &[(&str, &str, &str)]) -> Self {
        let items = rows
            .iter()
            .map(|(id, name, price)| {
                let item = Item {
                    id: id.to_string(),
                    name: name.to_string(),
                    price: dec(price),
                    delta: Decimal::ZERO,
                    variant: String::new(),
                };
                (id.to_string(), item)
            })
            .collect();
        Self {
            items: Mutex::new(items),
        }
    }

    pub fn get(&self, id: &str) -> Item {
        self.items.lock().unwrap()[id].clone()
    }
}

#[async_trait]
impl PriceStore for MemoryStore {
    async fn update_price(&self, id: &str, price: Decimal) -> Result<Item> {
        let mut items = self.items.lock().unwrap();
        let item = items
            .get_mut(id)
            .ok_or_else(|| AppError::not_found(format!("item {}", id)))?;
        item.delta = price - item.price;
        item.price = price;
        Ok(item.clone())
    }
}

pub struct StaticRecipients(pub Vec<Recipient>);

#[async_trait]
impl RecipientDirectory for StaticRecipients {
    async fn list_recipients(&self) -> Result<Vec<Recipient>> {
        Ok(self.0.clone())
    }
}

/// Catalog store with `(id, name, variant, starting price)` rows already in place.
pub async fn seeded_items(rows: &[(&str, &str, &str, &str)]) -> anyhow::Result<Arc<ItemRepository>> {
    let repo = ItemRepository::new(storage::connect_in_memory().await?);
    for (id, name, variant, price) in rows {
        repo.insert_item(id, name, variant).await?;
        repo.update_price(id, dec(price)).await?;
    }
    Ok(Arc::new(repo))
}

/// Fast policy for tests that are not about the backoff itself.
pub fn quick_retry(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        base_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
    }
}

pub fn updater(
    fetcher: Arc<dyn ItemFetcher>,
    store: Arc<dyn PriceStore>,
    retry: RetryPolicy,
    items: &[&str],
) -> CatalogUpdater {
    let unit = UpdateUnit::new(
        fetcher,
        store,
        Arc::new(tokio::sync::Mutex::new(())),
        retry,
        Duration::from_secs(30),
    );
    CatalogUpdater::new(Arc::new(unit), items.iter().map(|id| id.to_string()).collect())
}

pub fn dispatcher(
    recipients: Vec<Recipient>,
    email: Arc<dyn EmailTransport>,
    chat: Arc<dyn ChatTransport>,
) -> ReportDispatcher {
    ReportDispatcher::new(
        Arc::new(StaticRecipients(recipients)),
        email,
        chat,
        ReportFormatter::new(default_variant_glyphs()),
        REPORT_SUBJECT,
        Duration::from_secs(15),
    )
}

pub fn cycle(updater: CatalogUpdater, dispatcher: ReportDispatcher) -> RefreshCycle {
    RefreshCycle::new(updater, dispatcher)
}
