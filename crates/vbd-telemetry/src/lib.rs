//! # vbd-telemetry
//!
//! Logging setup for vbucket-doctor.
//!
//! Human-readable or JSON logs on stderr, filtered by an `EnvFilter`
//! directive. stdout is left to the tool's JSON-lines records.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vbd_telemetry::{init_logging, TelemetryConfig};
//!
//! let config = TelemetryConfig::from_env();
//! init_logging(&config)?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `VBD_LOG_LEVEL` | `warn` | Log filter, falls back to `RUST_LOG` |
//! | `VBD_JSON_LOGS` | `false` | JSON formatted logs |
//! | `VBD_LOG_ANSI` | terminal | Colorized output |

#![warn(missing_docs)]

mod config;
mod tracing_setup;

pub use config::{TelemetryConfig, DEFAULT_LOG_LEVEL};
pub use tracing_setup::{build_filter, init_logging};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// Filter directive did not parse.
    #[error("Invalid log filter {directive:?}: {reason}")]
    InvalidFilter {
        /// Offending directive
        directive: String,
        /// Parser message
        reason: String,
    },

    /// A global subscriber is already installed.
    #[error("Failed to install log subscriber: {0}")]
    SubscriberInit(String),
}

/// Log an event tagged with the component that produced it.
///
/// # Example
///
/// ```rust,ignore
/// log_event!(info, "batch", "Run finished", found = 3, not_found = 0);
/// ```
#[macro_export]
macro_rules! log_event {
    ($level:ident, $component:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            component = $component,
            $($($field)*,)?
            $msg
        )
    };
}
