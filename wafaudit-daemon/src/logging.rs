//! Logging initialization for wafaudit-daemon.
//!
//! Builds the `tracing-subscriber` stack from the `[general]` section of
//! `WafAuditConfig`. Without `RUST_LOG`, the configured level applies to the
//! wafaudit crates, other targets stay at `warn` or quieter, and the
//! exporter's HTTP stack is capped at `warn`.

use std::str::FromStr;

use anyhow::Result;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use wafaudit_core::config::GeneralConfig;

/// Crate targets that follow `general.log_level`.
const WAFAUDIT_TARGETS: [&str; 3] = ["wafaudit_core", "wafaudit_log_processor", "wafaudit_daemon"];

/// Dependency targets capped at `warn` unless `RUST_LOG` says otherwise.
const QUIET_TARGETS: [&str; 3] = ["metrics_exporter_prometheus", "hyper", "hyper_util"];

/// Output format of the log stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line.
    Json,
    /// Multi-line human-readable output.
    Pretty,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => Err(anyhow::anyhow!(
                "unknown log format '{}', expected 'json' or 'pretty'",
                other
            )),
        }
    }
}

/// Filter directives derived from the configured level.
///
/// `rust_log` is the value of `RUST_LOG`, which replaces the derived
/// directives entirely when set and non-empty.
///
/// # Errors
///
/// Returns an error if `log_level` is not a valid level name.
pub fn filter_directives(config: &GeneralConfig, rust_log: Option<&str>) -> Result<String> {
    if let Some(rust_log) = rust_log.filter(|v| !v.trim().is_empty()) {
        return Ok(rust_log.to_owned());
    }

    let level = LevelFilter::from_str(&config.log_level)
        .map_err(|_| anyhow::anyhow!("invalid log level '{}'", config.log_level))?;

    let mut directives = vec![LevelFilter::WARN.min(level).to_string()];
    directives.extend(WAFAUDIT_TARGETS.iter().map(|t| format!("{t}={level}")));
    directives.extend(QUIET_TARGETS.iter().map(|t| format!("{t}=warn")));
    Ok(directives.join(",").to_lowercase())
}

/// Initialize the global tracing subscriber.
///
/// Must be called exactly once, before any tracing macros are used.
pub fn init_tracing(config: &GeneralConfig) -> Result<()> {
    let format: LogFormat = config.log_format.parse()?;
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let directives = filter_directives(config, rust_log.as_deref())?;
    let filter = EnvFilter::try_new(&directives)
        .map_err(|e| anyhow::anyhow!("invalid log filter '{}': {}", directives, e))?;

    let layer = match format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_filter(filter)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_filter(filter)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing subscriber: {}", e))?;

    tracing::debug!(format = ?format, filter = %directives, "tracing initialized");
    Ok(())
}
