//! vbd-doctor entry point.

use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use vbd_doctor::{execute, Args};
use vbd_sharding::MemcachedConnector;
use vbd_telemetry::{init_logging, TelemetryConfig};

/// Exit status for a run that finished with operational failures.
const EXIT_FAILURES: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let mut telemetry = TelemetryConfig::from_env();
    if let Some(level) = args.log_level() {
        telemetry = telemetry.with_log_level(level);
    }
    if let Err(e) = init_logging(&telemetry) {
        eprintln!("Warning: {e}");
    }

    let stdout = std::io::stdout();
    match execute(&args, &MemcachedConnector::new(), stdout.lock()).await {
        Ok(result) if result.is_clean() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(EXIT_FAILURES),
        Err(e) => {
            error!(error = %format!("{e:#}"), "[vbd] Run failed");
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
