//! Logging Infrastructure
//!
//! Console output plus, when a log directory is given, a daily rolling
//! application log and a separate permanent file for the `audit` target.

use anyhow::Context;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::{EnvFilter, LevelFilter, Targets};
use tracing_subscriber::{Layer, Registry, fmt, prelude::*};

/// Rolled application logs older than this are removed by `cleanup_old_logs`
pub const LOG_RETENTION_DAYS: u64 = 14;

const APP_LOG_PREFIX: &str = "order-engine.log";
const AUDIT_LOG_FILE: &str = "audit.log";

/// Keeps the non-blocking file writers alive; drop it last
#[must_use]
pub struct LoggerGuard {
    _guards: Vec<WorkerGuard>,
}

/// Console-only logger at `info`
pub fn init_logger() -> anyhow::Result<LoggerGuard> {
    init_logger_with_file(None, false, None)
}

/// Initialize the global subscriber
///
/// `RUST_LOG` overrides `log_level`. With `log_dir`, application logs roll
/// daily into `order-engine.log.YYYY-MM-DD` and `audit` events go to
/// `audit.log`, which is never rotated.
pub fn init_logger_with_file(
    log_level: Option<&str>,
    json: bool,
    log_dir: Option<&Path>,
) -> anyhow::Result<LoggerGuard> {
    let level = log_level.unwrap_or("info");
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    layers.push(if json {
        fmt::layer().json().with_target(true).boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_thread_ids(false)
            .boxed()
    });

    let mut guards = Vec::new();
    if let Some(dir) = log_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

        let app_appender = tracing_appender::rolling::daily(dir, APP_LOG_PREFIX);
        let (app_writer, app_guard) = tracing_appender::non_blocking(app_appender);
        guards.push(app_guard);
        let app_targets = Targets::new()
            .with_default(LevelFilter::TRACE)
            .with_target("audit", LevelFilter::OFF);
        layers.push(
            fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(app_writer)
                .with_filter(app_targets)
                .boxed(),
        );

        let audit_appender = tracing_appender::rolling::never(dir, AUDIT_LOG_FILE);
        let (audit_writer, audit_guard) = tracing_appender::non_blocking(audit_appender);
        guards.push(audit_guard);
        layers.push(
            fmt::layer()
                .json()
                .with_writer(audit_writer)
                .with_filter(Targets::new().with_target("audit", LevelFilter::TRACE))
                .boxed(),
        );
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(env_filter)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(LoggerGuard { _guards: guards })
}

/// Remove rolled application logs last modified more than `days` ago
///
/// The audit log is never touched. Returns the number of files removed.
pub fn cleanup_old_logs(log_dir: &Path, days: u64) -> std::io::Result<usize> {
    if !log_dir.exists() {
        return Ok(0);
    }
    let max_age = Duration::from_secs(days * 24 * 60 * 60);
    let now = SystemTime::now();

    let mut removed = 0;
    for entry in std::fs::read_dir(log_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !name.starts_with(APP_LOG_PREFIX) || name == AUDIT_LOG_FILE {
            continue;
        }

        let modified = entry.metadata()?.modified()?;
        let age = now.duration_since(modified).unwrap_or_default();
        if age >= max_age {
            std::fs::remove_file(entry.path())?;
            removed += 1;
        }
    }
    if removed > 0 {
        tracing::info!(removed, dir = %log_dir.display(), "Old log files removed");
    }
    Ok(removed)
}
