//! File logging setup.
//!
//! Stdout is the rendering surface, so logs go to
//! `$CHATWIRE_HOME/logs/chatwire.log` instead.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a log filter directive.
pub const LOG_ENV: &str = "CHATWIRE_LOG";

const LOG_FILE_NAME: &str = "chatwire.log";

/// Installs the global subscriber writing to `dir/chatwire.log`.
///
/// `CHATWIRE_LOG` wins over `default_filter`. Keep the returned guard alive
/// for the lifetime of the process so buffered lines are flushed.
///
/// # Errors
/// Returns an error if the log directory cannot be created, the filter is
/// invalid, or a global subscriber is already installed.
pub fn init(dir: &Path, default_filter: &str) -> Result<WorkerGuard> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let filter = match std::env::var(LOG_ENV) {
        Ok(directive) if !directive.trim().is_empty() => EnvFilter::try_new(directive.trim()),
        _ => EnvFilter::try_new(default_filter),
    }
    .context("Invalid log filter")?;

    let appender = tracing_appender::rolling::never(dir, LOG_FILE_NAME);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to install log subscriber: {e}"))?;

    Ok(guard)
}
