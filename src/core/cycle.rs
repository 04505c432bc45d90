use async_trait::async_trait;
use metrics::counter;
use serde::Serialize;
use std::time::Instant;

use crate::core::report::ReportDispatcher;
use crate::core::updater::CatalogUpdater;
use crate::utils::error::Result;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CycleSummary {
    pub items_updated: usize,
    pub report_sent: bool,
}

/// A unit of scheduled work.
#[async_trait]
pub trait CycleRunner: Send + Sync {
    async fn run(&self) -> Result<CycleSummary>;
}

/// Refresh every price, then report the new prices if the refresh succeeded.
pub struct RefreshCycle {
    updater: CatalogUpdater,
    dispatcher: ReportDispatcher,
}

impl RefreshCycle {
    pub fn new(updater: CatalogUpdater, dispatcher: ReportDispatcher) -> Self {
        Self { updater, dispatcher }
    }
}

#[async_trait]
impl CycleRunner for RefreshCycle {
    async fn run(&self) -> Result<CycleSummary> {
        let started = Instant::now();
        tracing::info!("Starting price refresh");

        let items = match self.updater.update_all().await {
            Ok(items) => items,
            Err(e) => {
                counter!("ifall_refresh_failures_total").increment(1);
                tracing::error!(error = %e, "Price refresh failed, no report will be sent");
                return Err(e);
            }
        };

        if items.is_empty() {
            tracing::info!("Nothing refreshed, skipping report");
            return Ok(CycleSummary::default());
        }

        if let Err(e) = self.dispatcher.send_report(&items).await {
            // Prices are already stored at this point
            tracing::error!(error = %e, items = items.len(), "Price report delivery failed");
            return Err(e);
        }

        counter!("ifall_reports_sent_total").increment(1);
        tracing::info!(
            items = items.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Refresh cycle finished"
        );

        Ok(CycleSummary {
            items_updated: items.len(),
            report_sent: true,
        })
    }
}
