//! Structured logging for icmp-ping
//!
//! Console diagnostics go to stderr so stdout carries only progress lines.
//! A JSON copy is written to a daily-rotated file under the user's config
//! directory.

pub mod macros;

use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "icmp-ping.log";

/// Initialize the logging system
///
/// Logs are written to `<config dir>/icmp-ping/logs/icmp-ping.log.YYYY-MM-DD`.
/// Set `RUST_LOG` to change the level (default `info`), e.g. `RUST_LOG=debug`
/// to see every timed-out attempt.
pub fn init_logging() -> Result<PathBuf, Box<dyn std::error::Error>> {
    let log_dir = get_log_directory()?;
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::DAILY, &log_dir, LOG_FILE_PREFIX);

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_line_number(true)
        .compact();

    let file_layer = fmt::layer()
        .with_writer(file_appender)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .json();

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;

    let init_result = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();

    if let Err(e) = init_result {
        // A subscriber installed earlier (tests, embedding) keeps precedence.
        if e.to_string().contains("already been set") {
            return Ok(log_dir);
        }
        return Err(Box::new(e));
    }

    tracing::debug!("Logging initialized. Log directory: {}", log_dir.display());

    Ok(log_dir)
}

/// `%LOCALAPPDATA%\icmp-ping\logs` on Windows, `~/.config/icmp-ping/logs` elsewhere
fn get_log_directory() -> Result<PathBuf, Box<dyn std::error::Error>> {
    let base_dir = if cfg!(target_os = "windows") {
        dirs::data_local_dir().ok_or("Could not find local data directory")?
    } else {
        dirs::config_dir().ok_or("Could not find config directory")?
    };

    Ok(base_dir.join("icmp-ping").join("logs"))
}

/// Path of today's log file
pub fn get_current_log_file() -> Result<PathBuf, Box<dyn std::error::Error>> {
    let log_dir = get_log_directory()?;
    let today = chrono::Local::now().format("%Y-%m-%d").to_string();
    Ok(log_dir.join(format!("{}.{}", LOG_FILE_PREFIX, today)))
}
