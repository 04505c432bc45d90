use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub fetcher: FetcherConfig,
    pub catalog: CatalogConfig,
    pub retry: RetryConfig,
    pub scheduler: SchedulerConfig,
    pub report: ReportConfig,
    pub notifications: NotificationsConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout: u64,
    pub shutdown_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub directory: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    pub base_url: String,
    pub request_timeout: u64,
    pub user_agent: String,
    pub name_selector: String,
    pub price_selector: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Catalog ids to refresh. Empty entries are unconfigured slots and skipped.
    pub items: Vec<String>,
    /// Seconds allowed for each fetch attempt and for each store write.
    pub item_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub hour: u32,
    pub minute: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub subject: String,
    pub timeout: u64,
    #[serde(default = "default_variant_glyphs")]
    pub variant_glyphs: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    pub smtp: SmtpConfig,
    pub telegram: TelegramConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: String,
    pub from_name: String,
    pub use_tls: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub port: u16,
}

pub fn default_variant_glyphs() -> HashMap<String, String> {
    [
        ("F5F5F5", "⬜"),
        ("353839", "⬛"),
        ("96AED1", "🟦"),
        ("A9B689", "🟩"),
        ("DFCEEA", "🟪"),
    ]
    .into_iter()
    .map(|(variant, glyph)| (variant.to_string(), glyph.to_string()))
    .collect()
}

impl CatalogConfig {
    pub fn item_timeout(&self) -> Duration {
        Duration::from_secs(self.item_timeout)
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl ReportConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

impl SchedulerConfig {
    /// Six-field cron expression (seconds first) firing once a day.
    pub fn cron_expression(&self) -> String {
        format!("0 {} {} * * *", self.minute, self.hour)
    }
}

impl AppConfig {
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            // Start with default configuration
            .add_source(File::from(config_dir.join("default")))
            // Add environment-specific config
            .add_source(File::from(config_dir.join(&run_mode)).required(false))
            // Add local config (ignored by git)
            .add_source(File::from(config_dir.join("local")).required(false))
            // Add environment variables with prefix "IFALL_"
            .add_source(Environment::with_prefix("IFALL").separator("__"))
            .build()?;

        let config: AppConfig = s.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Message("Server port must be greater than 0".into()));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Message("Database max_connections must be greater than 0".into()));
        }

        if Url::parse(&self.fetcher.base_url).is_err() {
            return Err(ConfigError::Message("Invalid fetcher base_url format".into()));
        }

        if self.fetcher.request_timeout == 0 {
            return Err(ConfigError::Message("Fetcher request_timeout must be greater than 0".into()));
        }

        if self.catalog.item_timeout == 0 {
            return Err(ConfigError::Message("Catalog item_timeout must be greater than 0".into()));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Message("Retry max_attempts must be greater than 0".into()));
        }

        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::Message("Retry base_delay_ms cannot exceed max_delay_ms".into()));
        }

        if self.scheduler.hour > 23 || self.scheduler.minute > 59 {
            return Err(ConfigError::Message("Scheduler time must be a valid hour (0-23) and minute (0-59)".into()));
        }

        if self.report.timeout == 0 {
            return Err(ConfigError::Message("Report timeout must be greater than 0".into()));
        }

        if self.notifications.smtp.host.trim().is_empty() {
            return Err(ConfigError::Message("SMTP host is required".into()));
        }

        if self.notifications.smtp.port == 0 {
            return Err(ConfigError::Message("SMTP port must be greater than 0".into()));
        }

        if self.notifications.smtp.from_address.trim().is_empty() {
            return Err(ConfigError::Message("SMTP from_address is required".into()));
        }

        if self.notifications.telegram.token.trim().is_empty() {
            return Err(ConfigError::Message("Telegram token is required".into()));
        }

        if self.metrics.enabled && self.metrics.port == 0 {
            return Err(ConfigError::Message("Metrics port must be greater than 0".into()));
        }

        Ok(())
    }
}
