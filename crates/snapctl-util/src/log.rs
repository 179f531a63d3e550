//! Logging setup.
//!
//! Logs go to stderr so the JSON printed on stdout stays machine-readable.
//! `RUST_LOG`, when set, replaces the computed filter entirely.

use std::fmt;
use tracing_subscriber::{fmt as layer, prelude::*, EnvFilter};

/// Verbosity selected on the command line or in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogLevel {
    Error,
    #[default]
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    /// Parse a level name, case-insensitively. `warning` is accepted for `warn`.
    pub fn parse(s: &str) -> Option<Self> {
        let level = match s.trim().to_ascii_lowercase().as_str() {
            "error" => Self::Error,
            "warn" | "warning" => Self::Warn,
            "info" => Self::Info,
            "debug" => Self::Debug,
            "trace" => Self::Trace,
            _ => return None,
        };
        Some(level)
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogConfig {
    pub level: LogLevel,
    /// Annotate every event with its source file and line.
    pub include_location: bool,
}

impl LogConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    ///
    /// Only snapctl's own crates log at the chosen level; dependencies such as
    /// the bus library stay at `warn` unless tracing is requested.
    pub fn directive(&self) -> String {
        let deps = if self.level == LogLevel::Trace {
            LogLevel::Trace
        } else {
            LogLevel::Warn.min(self.level)
        };
        let own = self.level;
        format!(
            "{deps},snapctl={own},snapctl_util={own},snapctl_bus={own},\
             snapctl_snapshot={own},snapctl_state={own}"
        )
    }
}

/// Install the global subscriber. Call once, before any other work.
pub fn init(config: LogConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.directive()));

    let stderr = layer::layer()
        .with_writer(std::io::stderr)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    tracing_subscriber::registry().with(filter).with(stderr).init();
}
