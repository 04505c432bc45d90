use metrics::counter;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio::time::{Instant, timeout_at};
use tokio_retry::Retry;

use crate::config::RetryConfig;
use crate::models::{FetchedItem, Item};
use crate::scraper::ItemFetcher;
use crate::storage::PriceStore;
use crate::utils::error::{AppError, Result};

/// Capped exponential backoff: `min(base * 2^attempt, max)` between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: config.base_delay(),
            max_delay: config.max_delay(),
        }
    }
}

impl RetryPolicy {
    /// Sleep after the failed attempt number `attempt` (zero-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// One delay per retry, so `max_attempts - 1` in total.
    pub fn delays(&self) -> impl Iterator<Item = Duration> {
        let policy = *self;
        (0..policy.max_attempts.saturating_sub(1)).map(move |attempt| policy.delay_for(attempt))
    }

    pub fn total_delay(&self) -> Duration {
        self.delays().sum()
    }
}

/// Fetches one item with retries and persists its new price.
pub struct UpdateUnit {
    fetcher: Arc<dyn ItemFetcher>,
    store: Arc<dyn PriceStore>,
    write_lock: Arc<Mutex<()>>,
    retry: RetryPolicy,
    item_timeout: Duration,
}

impl UpdateUnit {
    const OP: &'static str = "UpdateUnit::update";

    /// `write_lock` is shared by every unit in the process so store writes never overlap.
    pub fn new(
        fetcher: Arc<dyn ItemFetcher>,
        store: Arc<dyn PriceStore>,
        write_lock: Arc<Mutex<()>>,
        retry: RetryPolicy,
        item_timeout: Duration,
    ) -> Self {
        Self {
            fetcher,
            store,
            write_lock,
            retry,
            item_timeout,
        }
    }

    /// One `item_timeout` deadline covers every fetch attempt, the backoff
    /// between them and the store write.
    pub async fn update(&self, id: &str) -> Result<Item> {
        let deadline = Instant::now() + self.item_timeout;

        let fetched = match timeout_at(deadline, self.fetch_with_retry(id, deadline)).await {
            Ok(result) => result.map_err(|e| AppError::at(Self::OP, e))?,
            Err(_) => {
                return Err(AppError::at(
                    Self::OP,
                    AppError::Fetch(format!("fetch of {} timed out", id)),
                ));
            }
        };

        let write = async {
            let _guard = self.write_lock.lock().await;
            self.store.update_price(id, fetched.price).await
        };
        match timeout_at(deadline, write).await {
            Ok(Ok(item)) => {
                counter!("ifall_items_updated_total").increment(1);
                tracing::debug!(item_id = %id, price = %item.price, delta = %item.delta, "Stored new price");
                Ok(item)
            }
            Ok(Err(e)) => Err(AppError::at(Self::OP, e)),
            Err(_) => Err(AppError::at(
                Self::OP,
                AppError::Store(format!("price write for {} timed out", id)),
            )),
        }
    }

    async fn fetch_with_retry(&self, id: &str, deadline: Instant) -> Result<FetchedItem> {
        let attempts = AtomicU32::new(0);
        let attempts = &attempts;
        let fetcher = &self.fetcher;
        let max_attempts = self.retry.max_attempts;

        Retry::start(self.retry.delays(), move || async move {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt > 1 {
                counter!("ifall_fetch_retries_total").increment(1);
            }

            let result = match timeout_at(deadline, fetcher.fetch(id)).await {
                Ok(result) => result,
                Err(_) => Err(AppError::Fetch(format!("fetch of {} timed out", id))),
            };
            if let Err(e) = &result {
                tracing::warn!(item_id = %id, attempt, max_attempts, error = %e, "Fetch attempt failed");
            }
            result
        })
        .await
    }
}

/// Refreshes the whole catalog, all-or-nothing.
pub struct CatalogUpdater {
    unit: Arc<UpdateUnit>,
    items: Vec<String>,
}

impl CatalogUpdater {
    const OP: &'static str = "CatalogUpdater::update_all";

    pub fn new(unit: Arc<UpdateUnit>, items: Vec<String>) -> Self {
        Self { unit, items }
    }

    pub fn configured_items(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|id| id.trim()).filter(|id| !id.is_empty())
    }

    /// Update every configured item concurrently. Any failure discards the whole batch.
    pub async fn update_all(&self) -> Result<Vec<Item>> {
        let ids: Vec<String> = self.configured_items().map(str::to_string).collect();
        if ids.is_empty() {
            tracing::info!("No catalog items configured");
            return Ok(Vec::new());
        }

        let mut tasks = JoinSet::new();
        for id in ids {
            let unit = Arc::clone(&self.unit);
            tasks.spawn(async move { unit.update(&id).await });
        }

        let mut updated = Vec::with_capacity(tasks.len());
        let mut first_error: Option<AppError> = None;
        while let Some(joined) = tasks.join_next().await {
            let outcome = joined
                .map_err(|e| AppError::Internal(format!("update task failed: {}", e)))
                .and_then(|result| result);
            match outcome {
                Ok(item) => updated.push(item),
                Err(e) if first_error.is_none() => first_error = Some(e),
                Err(e) => tracing::warn!(error = %e, "Additional catalog update failure"),
            }
        }

        if let Some(e) = first_error {
            tracing::warn!(discarded = updated.len(), "Catalog refresh failed, discarding updated items");
            return Err(AppError::at(Self::OP, e));
        }

        Ok(updated)
    }
}
