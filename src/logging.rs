//! Structured logging setup.
//!
//! The library only emits `tracing` events; installing a subscriber is up to
//! the application. [`init_logging`] is the one the `igs` binary uses.
//!
//! | Variable                | Meaning                                  | Default  |
//! |-------------------------|------------------------------------------|----------|
//! | `IGS_LOG_LEVEL`         | `trace`/`debug`/`info`/`warn`/`error`    | `info`   |
//! | `IGS_LOG_FORMAT`        | `json` or `pretty`                       | `pretty` |
//! | `IGS_LOG_TARGET_FILTER` | extra comma-separated filter directives  | unset    |
//!
//! `RUST_LOG`, when set, replaces the level.

use anyhow::{Context, Result};
use std::env;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Output format of the fmt layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// trace/debug/info/warn/error
    pub log_level: String,
    pub format: LogFormat,
    /// Extra directives, comma-separated (`xsolla_igs::transport=debug`)
    pub target_filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            format: LogFormat::Pretty,
            target_filter: None,
        }
    }
}

impl LogConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            log_level: env::var("IGS_LOG_LEVEL").unwrap_or(defaults.log_level),
            format: env::var("IGS_LOG_FORMAT")
                .map(|s| LogFormat::parse(&s))
                .unwrap_or(defaults.format),
            target_filter: env::var("IGS_LOG_TARGET_FILTER").ok(),
        }
    }
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Install a global subscriber. Fails if one is already installed.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let level = parse_level(&config.log_level);
    let mut env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    if let Some(target_filter) = &config.target_filter {
        for filter in target_filter.split(',') {
            let filter = filter.trim();
            if filter.is_empty() {
                continue;
            }
            match filter.parse() {
                Ok(directive) => env_filter = env_filter.add_directive(directive),
                Err(_) => eprintln!("Warning: Invalid log filter directive: {filter}"),
            }
        }
    }

    let fmt_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_thread_names(true)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize logging")?;
    Ok(())
}

/// Mask a secret for logging: the first four characters of longer values,
/// nothing of short ones.
#[must_use]
pub fn redact(value: &str) -> String {
    if value.chars().count() > 8 {
        let prefix: String = value.chars().take(4).collect();
        format!("{prefix}***")
    } else {
        "<REDACTED>".to_string()
    }
}
