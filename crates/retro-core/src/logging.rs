//! File logging for Retro.
//!
//! Logs go to a daily-rotated file under `${RETRO_HOME}/logs` so they never
//! interleave with the chat transcript on stdout. The filter comes from
//! `RETRO_LOG` (same syntax as `RUST_LOG`) and defaults to `warn`.

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Environment variable holding the log filter.
pub const LOG_ENV: &str = "RETRO_LOG";

const DEFAULT_FILTER: &str = "warn";
const LOG_FILE_PREFIX: &str = "retro.log";

/// Builds the filter from `RETRO_LOG`, falling back to `warn` when it is
/// unset or unparsable.
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Installs the global subscriber writing to `logs_dir`.
///
/// Keep the returned guard alive for the life of the process; dropping it
/// flushes and stops the background writer.
pub fn init(logs_dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(logs_dir)
        .with_context(|| format!("Failed to create log directory {}", logs_dir.display()))?;

    let appender = tracing_appender::rolling::daily(logs_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true),
        )
        .try_init()
        .context("Failed to install log subscriber")?;

    Ok(guard)
}
