//! Logging setup
//!
//! The overlay writes to `~/.config/crosshair/crosshair.log` (or platform
//! equivalent) with 10 MB size-based rotation, plus stderr. Set
//! `DEBUG_LOGGING=1` for debug output from the crosshair crates.

use std::path::PathBuf;

use rolling_file::{BasicRollingFileAppender, RollingConditionBasic};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

const LOG_FILE: &str = "crosshair.log";
const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024;

fn filter_directive(debug_logging: bool) -> &'static str {
    if debug_logging {
        "info,crosshair=debug,crosshair_overlay=debug"
    } else {
        "info"
    }
}

fn log_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|config| config.join(crate::config_store::APP_NAME))
}

/// Initialize file + stderr logging for the overlay process.
///
/// The returned guard must live until exit so buffered lines get flushed.
/// Falls back to stderr only (and returns `None`) when the log file cannot
/// be opened.
pub fn init() -> Option<WorkerGuard> {
    let debug_logging = std::env::var("DEBUG_LOGGING").is_ok();

    let Some(log_dir) = log_dir() else {
        init_stderr_only(filter_directive(debug_logging));
        return None;
    };

    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        // Subscriber is not up yet
        eprintln!("Failed to create log directory {log_dir:?}: {e}, logging to stderr only");
        init_stderr_only(filter_directive(debug_logging));
        return None;
    }

    let log_path = log_dir.join(LOG_FILE);
    let file_appender = match BasicRollingFileAppender::new(
        &log_path,
        RollingConditionBasic::new().max_size(MAX_LOG_SIZE),
        1,
    ) {
        Ok(appender) => appender,
        Err(e) => {
            eprintln!("Failed to open log file {log_path:?}: {e}, logging to stderr only");
            init_stderr_only(filter_directive(debug_logging));
            return None;
        }
    };
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_span_events(FmtSpan::NONE);

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_span_events(FmtSpan::NONE);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .with(EnvFilter::new(filter_directive(debug_logging)))
        .init();

    tracing::info!(log_file = ?log_path, debug_logging, "crosshair logging initialized");
    Some(guard)
}

/// Quiet stderr logging for one-shot subcommands (`monitors`, `ctl`, ...),
/// which print their results to stdout.
pub fn init_cli() {
    let directive = if std::env::var("DEBUG_LOGGING").is_ok() {
        filter_directive(true)
    } else {
        "warn"
    };
    init_stderr_only(directive);
}

fn init_stderr_only(directive: &str) {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_span_events(FmtSpan::NONE);

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(EnvFilter::new(directive))
        .init();
}
