//! One tool invocation: resolve the cluster, drive the batch, print the
//! summary, close every session.

use std::io::Write;

use anyhow::{Context, Result};
use tracing::warn;
use vbd_sharding::{
    BatchDriver, DoctorService, JsonLinesSink, NodeConnector, RunResult,
};
use vbd_telemetry::log_event;

use crate::cli::Args;
use crate::ids::load_identifiers;

/// Execute the run described by `args`, writing records to `out`.
///
/// Input problems are reported before any connection is opened. Sessions
/// are closed on every path once the cluster is resolved.
pub async fn execute<W: Write>(
    args: &Args,
    connector: &dyn NodeConnector,
    out: W,
) -> Result<RunResult> {
    let settings = args.settings().context("invalid configuration")?;
    let identifiers = load_identifiers(&args.ids, args.ids_file.as_deref())
        .context("invalid identifier input")?;

    let service = DoctorService::connect(&settings.connection, connector)
        .await
        .with_context(|| {
            format!(
                "cannot resolve cluster via {}",
                settings.connection.seed_address()
            )
        })?;

    let mut sink = JsonLinesSink::new(out);
    let driver = BatchDriver::new(&service, settings.batch.clone());
    let outcome = match args.seed_vb {
        Some(shard) => driver.seed(&identifiers, shard, &mut sink).await,
        None => driver.run(&identifiers, &mut sink).await,
    };

    if let Err(e) = service.close().await {
        warn!(error = %e, "[vbd] Failed to close cluster sessions");
    }

    let result = outcome.context("batch aborted")?;
    sink.write_line(&serde_json::json!({ "summary": &result }))
        .context("cannot write summary")?;

    log_event!(
        info,
        "vbd-doctor",
        "Run finished",
        found = result.found,
        not_found = result.not_found,
        failed = result.failed,
        clean = result.is_clean()
    );
    Ok(result)
}
