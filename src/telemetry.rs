//! Logging setup: a console layer plus a daily-rotated file layer.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Output format of the file layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" | "jsonl" => Ok(LogFormat::Json),
            _ => Err(anyhow::anyhow!(
                "Unsupported log format: {}. Supported formats: text, json",
                s
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Base level or a full `EnvFilter` directive string
    pub level: String,
    pub directory: PathBuf,
    /// File name prefix; files are named `<prefix>.<date>.log`
    pub file_prefix: String,
    pub format: LogFormat,
    /// Number of daily files kept before the oldest is removed
    pub retention: usize,
}

/// Build the filter from the base level with noisy dependencies turned down.
pub fn build_env_filter(level: &str) -> Result<EnvFilter> {
    let mut directives = vec![level.to_string()];

    let noisy: &[(&str, &str)] = &[
        ("hyper", "warn"),
        ("hyper_util", "warn"),
        ("h2", "warn"),
        ("reqwest", "warn"),
        ("rustls", "warn"),
        ("arrow", "warn"),
        ("parquet", "warn"),
    ];
    for (target, lvl) in noisy {
        directives.push(format!("{}={}", target, lvl));
    }

    let filter_str = directives.join(",");
    EnvFilter::try_new(&filter_str)
        .map_err(|e| anyhow::anyhow!("Invalid tracing filter '{}': {}", filter_str, e))
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the life of the process.
pub fn init_logging(config: &LogConfig) -> Result<WorkerGuard> {
    std::fs::create_dir_all(&config.directory).with_context(|| {
        format!(
            "Failed to create log directory {}",
            config.directory.display()
        )
    })?;

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(&config.file_prefix)
        .filename_suffix("log")
        .max_log_files(config.retention.max(1))
        .build(&config.directory)
        .context("Failed to create rolling log file")?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_filter(build_env_filter(&config.level)?);

    let file_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(writer)
            .with_target(true)
            .with_filter(build_env_filter(&config.level)?)
            .boxed(),
        LogFormat::Text => tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(writer)
            .with_target(true)
            .with_filter(build_env_filter(&config.level)?)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    tracing::debug!(
        level = %config.level,
        directory = %config.directory.display(),
        retention = config.retention,
        "logging initialized"
    );

    Ok(guard)
}
