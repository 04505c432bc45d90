use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::config::SchedulerConfig;
use crate::core::{CycleRunner, CycleSummary};
use crate::utils::error::Result;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchedulerStats {
    pub completed_runs: u64,
    pub failed_runs: u64,
    pub skipped_runs: u64,
    pub last_run: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Marks a refresh as in flight. Holding the guard is what "running" means.
#[derive(Clone, Default)]
pub struct RunGuard {
    lock: Arc<Mutex<()>>,
}

impl RunGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the guard, or `None` when a run is already in progress.
    pub fn try_begin(&self) -> Option<OwnedMutexGuard<()>> {
        Arc::clone(&self.lock).try_lock_owned().ok()
    }

    pub fn is_running(&self) -> bool {
        self.lock.try_lock().is_err()
    }

    /// Resolve once no run holds the guard.
    pub async fn wait_idle(&self) {
        let _idle = self.lock.lock().await;
    }
}

/// Fires the refresh cycle once a day, never overlapping itself.
pub struct RefreshScheduler {
    scheduler: JobScheduler,
    runner: Arc<dyn CycleRunner>,
    guard: RunGuard,
    stats: Arc<RwLock<SchedulerStats>>,
    config: SchedulerConfig,
}

impl RefreshScheduler {
    pub async fn new(runner: Arc<dyn CycleRunner>, config: SchedulerConfig) -> Result<Self> {
        let scheduler = JobScheduler::new().await?;

        Ok(Self {
            scheduler,
            runner,
            guard: RunGuard::new(),
            stats: Arc::new(RwLock::new(SchedulerStats::default())),
            config,
        })
    }

    pub async fn start(&mut self) -> Result<()> {
        let expression = self.config.cron_expression();
        let runner = Arc::clone(&self.runner);
        let guard = self.guard.clone();
        let stats = Arc::clone(&self.stats);

        let job = Job::new_async(expression.as_str(), move |_uuid, _l| {
            let runner = Arc::clone(&runner);
            let guard = guard.clone();
            let stats = Arc::clone(&stats);

            Box::pin(async move {
                Self::execute(runner, guard, stats).await;
            })
        })?;

        self.scheduler.add(job).await?;
        self.scheduler.start().await?;

        tracing::info!(
            "Refresh scheduler started, daily at {:02}:{:02} UTC",
            self.config.hour,
            self.config.minute
        );
        Ok(())
    }

    /// Run a cycle now. Returns `None` if one is already running.
    pub async fn trigger(&self) -> Option<Result<CycleSummary>> {
        Self::execute(
            Arc::clone(&self.runner),
            self.guard.clone(),
            Arc::clone(&self.stats),
        )
        .await
    }

    async fn execute(
        runner: Arc<dyn CycleRunner>,
        guard: RunGuard,
        stats: Arc<RwLock<SchedulerStats>>,
    ) -> Option<Result<CycleSummary>> {
        let Some(_running) = guard.try_begin() else {
            tracing::warn!("Previous refresh still running, skipping this trigger");
            counter!("ifall_refresh_skipped_total").increment(1);
            stats.write().await.skipped_runs += 1;
            return None;
        };

        let outcome = runner.run().await;

        let mut stats = stats.write().await;
        stats.last_run = Some(Utc::now());
        match &outcome {
            Ok(_) => {
                stats.completed_runs += 1;
                stats.last_error = None;
            }
            Err(e) => {
                stats.failed_runs += 1;
                stats.last_error = Some(e.to_string());
            }
        }

        Some(outcome)
    }

    pub async fn stats(&self) -> SchedulerStats {
        self.stats.read().await.clone()
    }

    pub fn guard(&self) -> RunGuard {
        self.guard.clone()
    }

    pub fn stats_handle(&self) -> Arc<RwLock<SchedulerStats>> {
        Arc::clone(&self.stats)
    }

    /// Stop firing new runs, then wait for a run in flight to complete.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.scheduler.shutdown().await?;

        if self.guard.is_running() {
            tracing::info!("Waiting for the in-flight refresh to finish");
        }
        self.guard.wait_idle().await;

        tracing::info!("Refresh scheduler shutdown");
        Ok(())
    }
}
