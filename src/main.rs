use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use sqlx::SqlitePool;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use teloxide::Bot;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use ifall::bot::SubscriptionBot;
use ifall::cli::{Args, Command};
use ifall::config::AppConfig;
use ifall::core::{CatalogUpdater, CycleRunner, RefreshCycle, ReportDispatcher, RetryPolicy, UpdateUnit};
use ifall::plugins::notifiers::{ReportFormatter, SmtpEmailSender, TelegramNotifier};
use ifall::scheduler::RefreshScheduler;
use ifall::scraper::HttpItemFetcher;
use ifall::storage::{self, ItemRepository, UserRepository};
use ifall::utils::logging;
use ifall::web::{create_router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let config = AppConfig::load(&args.config_dir)
        .with_context(|| format!("Failed to load configuration from {}", args.config_dir.display()))?;
    let _log_guard = logging::init(&config.logging)?;

    info!("Starting ifall v{}", env!("CARGO_PKG_VERSION"));

    if config.metrics.enabled {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics.port));
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!("Metrics exporter listening on {}", addr);
    }

    let pool = storage::connect(&config.database)
        .await
        .context("Failed to open database")?;
    let items = ItemRepository::new(pool.clone());
    let users = Arc::new(UserRepository::new(pool.clone()));

    match args.command() {
        Command::AddItem { id, name, variant } => {
            if items.insert_item(&id, &name, &variant).await? {
                info!(item_id = %id, "Catalog item added");
            } else {
                warn!(item_id = %id, "Catalog item already exists, left unchanged");
            }
        }
        Command::ListItems => {
            let catalog = items.list().await?;
            if catalog.is_empty() {
                warn!("No items stored, add them with add-item");
            }
            for item in catalog {
                info!(
                    item_id = %item.id,
                    name = %item.name,
                    variant = %item.variant,
                    price = %item.price.round_dp(2),
                    delta = %item.delta.round_dp(2),
                    "Catalog item"
                );
            }
        }
        Command::Refresh => {
            let bot = Bot::new(&config.notifications.telegram.token);
            let cycle = build_cycle(&config, items, users, bot)?;
            let summary = cycle.run().await?;
            info!(
                items = summary.items_updated,
                report_sent = summary.report_sent,
                "Manual refresh finished"
            );
        }
        Command::Serve => serve(config, pool, items, users).await?,
    }

    Ok(())
}

fn build_cycle(
    config: &AppConfig,
    items: ItemRepository,
    users: Arc<UserRepository>,
    bot: Bot,
) -> Result<RefreshCycle> {
    let fetcher = Arc::new(HttpItemFetcher::new(&config.fetcher)?);
    let unit = UpdateUnit::new(
        fetcher,
        Arc::new(items),
        Arc::new(Mutex::new(())),
        RetryPolicy::from(&config.retry),
        config.catalog.item_timeout(),
    );
    let updater = CatalogUpdater::new(Arc::new(unit), config.catalog.items.clone());

    let dispatcher = ReportDispatcher::new(
        users,
        Arc::new(SmtpEmailSender::new(&config.notifications.smtp)?),
        Arc::new(TelegramNotifier::new(bot)),
        ReportFormatter::new(config.report.variant_glyphs.clone()),
        config.report.subject.clone(),
        config.report.timeout(),
    );

    Ok(RefreshCycle::new(updater, dispatcher))
}

async fn serve(
    config: AppConfig,
    pool: SqlitePool,
    items: ItemRepository,
    users: Arc<UserRepository>,
) -> Result<()> {
    let bot = Bot::new(&config.notifications.telegram.token);
    let cycle = Arc::new(build_cycle(&config, items, Arc::clone(&users), bot.clone())?);

    let mut scheduler = RefreshScheduler::new(cycle, config.scheduler.clone()).await?;
    scheduler.start().await?;

    let subscription_bot = SubscriptionBot::spawn(bot, Arc::clone(&users));

    let state = AppState {
        users,
        pool,
        refresh_guard: scheduler.guard(),
        scheduler_stats: scheduler.stats_handle(),
    };
    let app = create_router(state, Duration::from_secs(config.server.request_timeout));

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Registration API listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down...");
    let bot_grace = Duration::from_secs(config.server.shutdown_timeout);
    if tokio::time::timeout(bot_grace, subscription_bot.stop()).await.is_err() {
        warn!("Subscription bot did not stop within {:?}", bot_grace);
    }
    // Waits for a refresh in flight; never cut short
    scheduler.shutdown().await?;

    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
