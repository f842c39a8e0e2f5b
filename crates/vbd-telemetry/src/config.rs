//! Telemetry configuration from environment variables.

use std::env;
use std::io::IsTerminal;

/// Default filter: quiet enough that stdout records stay the main output.
pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Configuration for log output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Service name attached to startup logs
    pub service_name: String,

    /// Log filter directive (`warn`, `vbd_sharding=debug`, ...)
    pub log_level: String,

    /// Whether to emit JSON formatted logs
    pub json_logs: bool,

    /// Whether to colorize human readable logs
    pub ansi: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "vbd-doctor".to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            json_logs: false,
            ansi: false,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `VBD_LOG_LEVEL` or `RUST_LOG`: Log filter (default: warn)
    /// - `VBD_JSON_LOGS`: Enable JSON logs (default: false)
    /// - `VBD_LOG_ANSI`: Colorize output (default: true when stderr is a terminal)
    pub fn from_env() -> Self {
        let interactive = std::io::stderr().is_terminal();
        Self::from_lookup(|key| env::var(key).ok(), interactive)
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F, interactive: bool) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        Self {
            service_name: "vbd-doctor".to_string(),

            log_level: lookup("VBD_LOG_LEVEL")
                .or_else(|| lookup("RUST_LOG"))
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),

            json_logs: lookup("VBD_JSON_LOGS")
                .map(|v| is_truthy(&v))
                .unwrap_or(false),

            ansi: lookup("VBD_LOG_ANSI")
                .map(|v| is_truthy(&v))
                .unwrap_or(interactive),
        }
    }

    /// Override the filter (e.g. from a `-v` flag).
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }
}

fn is_truthy(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value == "1"
}
