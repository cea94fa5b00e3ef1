//! Tracing subscriber for the bridge
//!
//! stdout belongs to the JSON-lines sink, so nothing here may write to it:
//! console logs go to stderr and file logs to a session file.

use anyhow::{Context, Result};
use beamsync_core::logging::LogConfig;
use std::fs::File;
use std::path::PathBuf;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{
    filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer,
};

/// Keeps the file writer thread alive; drop it last
pub struct LogGuard {
    _guard: WorkerGuard,
    pub path: PathBuf,
}

/// Configured level, overridden by RUST_LOG when set
fn level_filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(config.parse_level().into())
        .from_env_lossy()
}

/// Open this session's log file behind a non-blocking writer
fn open_log_file(config: &LogConfig) -> Result<(NonBlocking, LogGuard)> {
    if let Err(e) = config.cleanup_old_logs() {
        // The subscriber is not installed yet
        eprintln!("Warning: Failed to cleanup old log files: {}", e);
    }
    let path = config.current_log_path();
    let file =
        File::create(&path).with_context(|| format!("Failed to create log file: {:?}", path))?;
    let (writer, guard) = tracing_appender::non_blocking(file);
    Ok((
        writer,
        LogGuard {
            _guard: guard,
            path,
        },
    ))
}

/// Install the global subscriber.
///
/// Returns a guard when file output is enabled.
pub fn init(config: &LogConfig) -> Result<Option<LogGuard>> {
    config
        .ensure_log_directory()
        .context("Failed to create log directory")?;

    let console_layer = config.console_output.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_filter(level_filter(config))
    });

    let (file_layer, guard) = match config.file_output {
        true => {
            let (writer, guard) = open_log_file(config)?;
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_thread_names(true)
                .with_filter(level_filter(config));
            (Some(layer), Some(guard))
        }
        false => (None, None),
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    tracing::info!("Logging initialized at level: {}", config.level);
    if let Some(guard) = &guard {
        tracing::info!("Log file path: {:?}", guard.path);
    }

    Ok(guard)
}
