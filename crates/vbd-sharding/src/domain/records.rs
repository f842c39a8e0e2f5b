//! # Operation Records
//!
//! One machine-readable record per operation performed by the batch driver.

use super::errors::ShardIndex;
use super::value_objects::{AddOutcome, DocumentLocation, RepairAction};
use serde::Serialize;

/// Kind of operation a record describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordAction {
    /// Document lookup.
    Locate,
    /// Re-create on the correct shard.
    Restore,
    /// Removal of a misplaced copy.
    Delete,
    /// Placeholder written at an explicit shard.
    Seed,
}

/// Result of the operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordOutcome {
    /// Document present at `shard`.
    Found,
    /// Document present nowhere that was searched.
    NotFound,
    /// Document written.
    Created,
    /// Write skipped; a document already exists.
    AlreadyExists,
    /// Copy removed.
    Deleted,
    /// Copy changed since discovery.
    Conflict,
    /// Copy vanished before the delete.
    Missing,
    /// Step withheld.
    Skipped,
    /// Operation failed.
    Failed,
}

impl RecordOutcome {
    /// Whether the outcome is an operational failure.
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Conflict | Self::Skipped | Self::Failed)
    }
}

/// A single structured output line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OperationRecord {
    /// What was done.
    pub action: RecordAction,
    /// Document identifier.
    pub id: String,
    /// Shard the operation targeted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shard: Option<ShardIndex>,
    /// Shard the identifier hashes to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_shard: Option<ShardIndex>,
    /// How it went.
    pub outcome: RecordOutcome,
    /// Version token involved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cas: Option<u64>,
    /// Client flags.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flags: Option<u32>,
    /// Document value (lossy UTF-8), only when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Free-form context (error text, source shard).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl OperationRecord {
    /// Create a record with only the mandatory fields.
    pub fn new(action: RecordAction, id: impl Into<String>, outcome: RecordOutcome) -> Self {
        Self {
            action,
            id: id.into(),
            shard: None,
            expected_shard: None,
            outcome,
            cas: None,
            flags: None,
            value: None,
            detail: None,
        }
    }

    /// Set the targeted shard.
    #[must_use]
    pub fn with_shard(mut self, shard: ShardIndex) -> Self {
        self.shard = Some(shard);
        self
    }

    /// Set the expected shard.
    #[must_use]
    pub fn with_expected_shard(mut self, shard: ShardIndex) -> Self {
        self.expected_shard = Some(shard);
        self
    }

    /// Set the cas.
    #[must_use]
    pub fn with_cas(mut self, cas: u64) -> Self {
        self.cas = Some(cas);
        self
    }

    /// Set a detail message.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Record for a found copy.
    pub fn found(location: &DocumentLocation, expected_shard: ShardIndex, show_value: bool) -> Self {
        let mut record = Self::new(RecordAction::Locate, location.id.clone(), RecordOutcome::Found)
            .with_shard(location.shard)
            .with_expected_shard(expected_shard)
            .with_cas(location.cas);
        record.flags = Some(location.flags);
        if show_value {
            record.value = Some(String::from_utf8_lossy(&location.value).into_owned());
        }
        record
    }

    /// Record for an identifier found nowhere.
    pub fn not_found(id: &str, expected_shard: ShardIndex) -> Self {
        Self::new(RecordAction::Locate, id, RecordOutcome::NotFound)
            .with_expected_shard(expected_shard)
    }

    /// Record for a repair step.
    pub fn repair(id: &str, action: &RepairAction) -> Self {
        match action {
            RepairAction::Restored {
                from_shard,
                to_shard,
                cas,
            } => Self::new(RecordAction::Restore, id, RecordOutcome::Created)
                .with_shard(*to_shard)
                .with_cas(*cas)
                .with_detail(format!("from shard {from_shard}")),
            RepairAction::AlreadyPresent {
                from_shard,
                to_shard,
            } => Self::new(RecordAction::Restore, id, RecordOutcome::AlreadyExists)
                .with_shard(*to_shard)
                .with_detail(format!("from shard {from_shard}")),
            RepairAction::RestoreFailed {
                from_shard,
                to_shard,
                reason,
            } => Self::new(RecordAction::Restore, id, RecordOutcome::Failed)
                .with_shard(*to_shard)
                .with_detail(format!("from shard {from_shard}: {reason}")),
            RepairAction::Deleted { shard, cas } => {
                Self::new(RecordAction::Delete, id, RecordOutcome::Deleted)
                    .with_shard(*shard)
                    .with_cas(*cas)
            }
            RepairAction::DeleteConflict { shard, cas } => {
                Self::new(RecordAction::Delete, id, RecordOutcome::Conflict)
                    .with_shard(*shard)
                    .with_cas(*cas)
                    .with_detail("document changed since it was located")
            }
            RepairAction::DeleteMissing { shard } => {
                Self::new(RecordAction::Delete, id, RecordOutcome::Missing).with_shard(*shard)
            }
            RepairAction::DeleteSkipped { shard } => {
                Self::new(RecordAction::Delete, id, RecordOutcome::Skipped)
                    .with_shard(*shard)
                    .with_detail("restore did not complete; keeping the only copy")
            }
            RepairAction::DeleteFailed { shard, reason } => {
                Self::new(RecordAction::Delete, id, RecordOutcome::Failed)
                    .with_shard(*shard)
                    .with_detail(reason.clone())
            }
        }
    }

    /// Record for a seed write.
    pub fn seed(id: &str, shard: ShardIndex, outcome: AddOutcome) -> Self {
        match outcome {
            AddOutcome::Created { cas } => Self::new(RecordAction::Seed, id, RecordOutcome::Created)
                .with_shard(shard)
                .with_cas(cas),
            AddOutcome::AlreadyExists => {
                Self::new(RecordAction::Seed, id, RecordOutcome::AlreadyExists).with_shard(shard)
            }
        }
    }
}
