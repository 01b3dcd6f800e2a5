//! Logging configuration for NexusRAG

use std::path::Path;

use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::{self};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Registry;

use crate::config::AppConfig;
use crate::NexusError;
use crate::Result;

const LOG_DIR: &str = "logs";
const LOG_FILE_PREFIX: &str = "nexusrag.log";

/// Initialize logging from the `[logging]` section, `verbose` forces debug
pub fn init_logging_with_config(config: &AppConfig, verbose: bool) -> Result<()> {
    if config.logging.backtrace {
        std::env::set_var("RUST_BACKTRACE", "1");
    }

    let level = if verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    init_logging_with_level(level)
}

/// Initialize console + daily rolling file logging at the given level
pub fn init_logging_with_level(level: &str) -> Result<()> {
    let logs_dir = Path::new(LOG_DIR);
    if !logs_dir.exists() {
        std::fs::create_dir_all(logs_dir)?;
    }

    // RUST_LOG wins over the configured level when present
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{level},nexusrag={level}")));

    let file_appender = tracing_appender::rolling::daily(LOG_DIR, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let console_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr);

    let file_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(non_blocking)
        .with_ansi(false);

    Registry::default()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| NexusError::ConfigError(format!("Failed to install logger: {e}")))?;

    tracing::debug!(
        "Logging initialized with level: {} (files: {}/{}.YYYY-MM-DD)",
        level,
        LOG_DIR,
        LOG_FILE_PREFIX
    );

    // Keep the writer alive for the lifetime of the process
    std::mem::forget(guard);

    Ok(())
}
