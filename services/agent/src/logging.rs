//! Diagnostic output: console logs plus daily-rotated JSON log files.
//!
//! The subscriber is installed once by the entry point; library code only
//! emits events. Rotated files are swept on startup so the directory never
//! holds more than the configured retention window.

use anyhow::{Context, Result};
use std::path::Path;
use std::time::Duration;
use tracing::{Level, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const LOG_FILE_PREFIX: &str = "parley.log";

/// Installs the global subscriber: a human-readable console layer and a
/// JSON file layer rotated daily. The returned guard must be held for the
/// process lifetime; dropping it stops the background file writer.
pub fn init(level: Level, dir: &Path) -> Result<WorkerGuard> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create log directory {}", dir.display()))?;

    let file_appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_timer(fmt::time::ChronoLocal::rfc_3339()))
        .with(fmt::layer().json().with_ansi(false).with_writer(file_writer))
        .init();

    Ok(guard)
}

/// Removes rotated log files older than the retention window. Returns the
/// number of files removed. Individual failures are logged and skipped.
pub fn prune_old_logs(dir: &Path, retention_days: u64) -> std::io::Result<usize> {
    let retention = Duration::from_secs(retention_days * 24 * 60 * 60);
    let mut removed = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_log_file = path.is_file()
            && path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(LOG_FILE_PREFIX));
        if !is_log_file {
            continue;
        }
        let age = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| modified.elapsed().ok());
        if age.is_some_and(|age| age > retention) {
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => warn!(path = %path.display(), error = %e, "failed to prune log file"),
            }
        }
    }
    Ok(removed)
}
