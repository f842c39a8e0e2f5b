//! # Batch Driver
//!
//! Runs the locator (and optionally the repair engine, or seed mode) over a
//! list of identifiers in input order, emitting one record per operation
//! and accumulating a [`RunResult`].
//!
//! An error on one identifier produces a `failed` record and the batch moves
//! on. Only sink failures and an out-of-range seed shard stop a batch.

use crate::domain::{
    invariant_shard_in_range, AddOutcome, LocatorError, OperationRecord, RecordAction,
    RecordOutcome, RepairAction, RepairOptions, RunResult, DEFAULT_COLLECTION,
};
use crate::ports::inbound::DocumentDoctorApi;
use crate::ports::outbound::RecordSink;
use tracing::{info, warn};

/// Per-run lookup settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchOptions {
    /// Collection path (`scope.collection`).
    pub collection: String,
    /// Query every shard instead of only the computed one.
    pub search_all_shards: bool,
    /// Include document values in found records.
    pub show_values: bool,
    /// Remediation to apply to misplaced copies.
    pub repair: RepairOptions,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            collection: DEFAULT_COLLECTION.to_string(),
            search_all_shards: false,
            show_values: false,
            repair: RepairOptions::default(),
        }
    }
}

/// Drives a batch of identifiers through a [`DocumentDoctorApi`].
pub struct BatchDriver<'a, A: DocumentDoctorApi + ?Sized> {
    api: &'a A,
    options: BatchOptions,
}

impl<'a, A: DocumentDoctorApi + ?Sized> BatchDriver<'a, A> {
    /// Create a driver.
    pub fn new(api: &'a A, options: BatchOptions) -> Self {
        Self { api, options }
    }

    /// Locate (and repair) every identifier.
    pub async fn run(
        &self,
        identifiers: &[String],
        sink: &mut dyn RecordSink,
    ) -> Result<RunResult, LocatorError> {
        let mut result = RunResult::new();
        info!(
            identifiers = identifiers.len(),
            collection = %self.options.collection,
            search_all_shards = self.options.search_all_shards,
            restore = self.options.repair.restore,
            delete = self.options.repair.delete,
            "[vbd] Starting lookup batch"
        );

        for id in identifiers {
            self.process(id, &mut result, sink).await?;
        }

        info!(
            found = result.found,
            not_found = result.not_found,
            failed = result.failed,
            "[vbd] Lookup batch complete"
        );
        Ok(result)
    }

    async fn process(
        &self,
        id: &str,
        result: &mut RunResult,
        sink: &mut dyn RecordSink,
    ) -> Result<(), LocatorError> {
        let expected = self.api.expected_shard(id);
        let locations = match self
            .api
            .locate(id, &self.options.collection, self.options.search_all_shards)
            .await
        {
            Ok(locations) => locations,
            Err(e) => {
                warn!(id, error = %e, "[vbd] Lookup failed");
                result.failed += 1;
                return sink.emit(
                    &OperationRecord::new(RecordAction::Locate, id, RecordOutcome::Failed)
                        .with_expected_shard(expected)
                        .with_detail(e.to_string()),
                );
            }
        };

        if locations.is_empty() {
            result.not_found += 1;
            return sink.emit(&OperationRecord::not_found(id, expected));
        }

        result.found += locations.len() as u64;
        for location in &locations {
            sink.emit(&OperationRecord::found(
                location,
                expected,
                self.options.show_values,
            ))?;
        }

        if !self.options.repair.any() {
            return Ok(());
        }

        let actions = self
            .api
            .repair(id, &self.options.collection, &locations, self.options.repair)
            .await;

        let mut item_failed = false;
        for action in &actions {
            match action {
                RepairAction::Restored { .. } => result.restored += 1,
                RepairAction::AlreadyPresent { .. } => result.already_present += 1,
                RepairAction::Deleted { .. } => result.deleted += 1,
                RepairAction::DeleteConflict { .. } => result.delete_conflicts += 1,
                RepairAction::DeleteMissing { .. } => {}
                RepairAction::RestoreFailed { .. }
                | RepairAction::DeleteSkipped { .. }
                | RepairAction::DeleteFailed { .. } => item_failed = true,
            }
            sink.emit(&OperationRecord::repair(id, action))?;
        }
        if item_failed {
            result.failed += 1;
        }
        Ok(())
    }

    /// Write the placeholder document for every identifier on `shard`.
    ///
    /// The shard is checked against the topology before the first write.
    pub async fn seed(
        &self,
        identifiers: &[String],
        shard: usize,
        sink: &mut dyn RecordSink,
    ) -> Result<RunResult, LocatorError> {
        let shard = invariant_shard_in_range(shard, self.api.shard_count().get())?;
        let mut result = RunResult::new();
        info!(identifiers = identifiers.len(), shard, "[vbd] Starting seed batch");

        for id in identifiers {
            match self.api.seed(id, &self.options.collection, shard).await {
                Ok(outcome) => {
                    if matches!(outcome, AddOutcome::Created { .. }) {
                        result.seeded += 1;
                    }
                    sink.emit(&OperationRecord::seed(id, shard, outcome))?;
                }
                Err(e) => {
                    warn!(id, shard, error = %e, "[vbd] Seed failed");
                    result.failed += 1;
                    sink.emit(
                        &OperationRecord::new(RecordAction::Seed, id.as_str(), RecordOutcome::Failed)
                            .with_shard(shard)
                            .with_detail(e.to_string()),
                    )?;
                }
            }
        }

        info!(seeded = result.seeded, failed = result.failed, "[vbd] Seed batch complete");
        Ok(result)
    }
}
