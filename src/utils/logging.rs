use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::utils::error::{AppError, Result};

/// Install the global tracing subscriber.
///
/// The configured level applies to this crate, other targets follow
/// `RUST_LOG`. When a log directory is set,
/// output is also written to a daily rolling file; the returned guard must be
/// held for the lifetime of the process so buffered lines get flushed.
pub fn init(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let directive: Directive = format!("ifall={}", config.level)
        .parse()
        .map_err(|e| AppError::Validation(format!("Invalid log level '{}': {}", config.level, e)))?;
    let filter = EnvFilter::from_default_env().add_directive(directive);

    match &config.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, "ifall.log");
            let (file_writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stdout.and(file_writer))
                .try_init()
                .map_err(|e| AppError::Internal(format!("Failed to install subscriber: {}", e)))?;
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .try_init()
                .map_err(|e| AppError::Internal(format!("Failed to install subscriber: {}", e)))?;
            Ok(None)
        }
    }
}
