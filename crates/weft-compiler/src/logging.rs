//! Logging utilities for weft-compiler
//!
//! This module is only available with the `logging` feature.
//!
//! For library users: weft emits tracing events - install your own
//! subscriber. For application developers: use these convenience functions.

use std::sync::Once;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Log level for weft output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    /// No logging output
    Silent,
    /// Only errors
    Error,
    /// Errors and warnings
    Warn,
    /// Errors, warnings, and info (default)
    #[default]
    Info,
    /// All logs including debug
    Debug,
    /// Everything, including per-module trace events
    Trace,
}

impl LogLevel {
    fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Silent => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "silent" | "off" => Ok(LogLevel::Silent),
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!("Invalid log level: {}", other)),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_filter())
    }
}

/// Initialize weft logging with the specified level.
///
/// Installs a global subscriber; only the first call per process takes
/// effect, later calls are no-ops.
pub fn init_logging(level: LogLevel) {
    INIT.call_once(|| {
        let filter = EnvFilter::builder()
            .with_default_directive(
                level
                    .as_filter()
                    .parse()
                    .unwrap_or_else(|_| "info".parse().expect("static directive parses")),
            )
            .from_env_lossy();

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_target(false).without_time())
            .init();
    });
}

/// Initialize logging from the `RUST_LOG` environment variable, falling
/// back to `info`.
pub fn init_logging_from_env() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::builder()
                .with_default_directive("info".parse().expect("static directive parses"))
                .from_env_lossy()
        });

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact().with_target(false).without_time())
            .init();
    });
}
