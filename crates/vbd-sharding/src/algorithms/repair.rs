//! # Repair Engine
//!
//! Moves misplaced copies of a document to the shard the identifier hashes
//! to, and removes the stale copies.
//!
//! ## Rules
//!
//! - A copy is misplaced when its shard differs from the computed shard
//! - Restore happens at most once per identifier: the first copy (shard
//!   order) whose add resolves wins; "already exists" resolves it too
//! - Restore of a copy always precedes its delete
//! - Deletes are guarded by the cas captured when the copy was located
//! - With restore enabled, a copy is never deleted before the restore lands

use super::shard_hasher::{is_misplaced, shard_of};
use super::topology_resolver::ClusterSession;
use crate::domain::{
    AddOutcome, DeleteOutcome, DocumentLocation, RepairAction, RepairOptions, ShardIndex,
};
use tracing::{debug, info, warn};

/// Repair the misplaced copies among `locations`.
///
/// Operational failures are returned as actions; they never abort the
/// remaining steps for this identifier.
pub async fn repair(
    session: &ClusterSession,
    id: &str,
    collection: &str,
    locations: &[DocumentLocation],
    options: RepairOptions,
) -> Vec<RepairAction> {
    let mut actions = Vec::new();
    if !options.any() {
        return actions;
    }

    let shard_count = session.shard_count();
    let expected = shard_of(id.as_bytes(), shard_count);
    let misplaced: Vec<&DocumentLocation> = locations
        .iter()
        .filter(|l| is_misplaced(id.as_bytes(), l.shard, shard_count))
        .collect();
    if misplaced.is_empty() {
        return actions;
    }

    warn_on_divergence(id, &misplaced);

    let mut restored = false;
    for location in misplaced {
        if options.restore && !restored {
            let action = restore_copy(session, id, collection, location, expected).await;
            restored = matches!(
                action,
                RepairAction::Restored { .. } | RepairAction::AlreadyPresent { .. }
            );
            actions.push(action);
        }

        if options.delete {
            if options.restore && !restored {
                warn!(id, shard = location.shard, "[vbd] Restore pending, keeping misplaced copy");
                actions.push(RepairAction::DeleteSkipped {
                    shard: location.shard,
                });
                continue;
            }
            actions.push(delete_copy(session, id, collection, location).await);
        }
    }

    actions
}

async fn restore_copy(
    session: &ClusterSession,
    id: &str,
    collection: &str,
    location: &DocumentLocation,
    expected: ShardIndex,
) -> RepairAction {
    let from_shard = location.shard;
    let result = match session.client_for(expected) {
        Ok(client) => {
            client
                .add(
                    id,
                    collection,
                    expected,
                    &location.value,
                    location.flags,
                    location.datatype,
                )
                .await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(AddOutcome::Created { cas }) => {
            info!(id, from_shard, to_shard = expected, cas, "[vbd] Restored document");
            RepairAction::Restored {
                from_shard,
                to_shard: expected,
                cas,
            }
        }
        Ok(AddOutcome::AlreadyExists) => {
            info!(id, to_shard = expected, "[vbd] Document already present on its shard");
            RepairAction::AlreadyPresent {
                from_shard,
                to_shard: expected,
            }
        }
        Err(e) => {
            warn!(id, from_shard, to_shard = expected, error = %e, "[vbd] Restore failed");
            RepairAction::RestoreFailed {
                from_shard,
                to_shard: expected,
                reason: e.to_string(),
            }
        }
    }
}

async fn delete_copy(
    session: &ClusterSession,
    id: &str,
    collection: &str,
    location: &DocumentLocation,
) -> RepairAction {
    let shard = location.shard;
    let result = match session.client_for(shard) {
        Ok(client) => client.delete(id, collection, shard, location.cas).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(DeleteOutcome::Deleted) => {
            info!(id, shard, cas = location.cas, "[vbd] Deleted misplaced copy");
            RepairAction::Deleted {
                shard,
                cas: location.cas,
            }
        }
        Ok(DeleteOutcome::Conflict) => {
            warn!(id, shard, cas = location.cas, "[vbd] Copy modified since located, not deleted");
            RepairAction::DeleteConflict {
                shard,
                cas: location.cas,
            }
        }
        Ok(DeleteOutcome::NotFound) => {
            debug!(id, shard, "[vbd] Copy already gone");
            RepairAction::DeleteMissing { shard }
        }
        Err(e) => {
            warn!(id, shard, error = %e, "[vbd] Delete failed");
            RepairAction::DeleteFailed {
                shard,
                reason: e.to_string(),
            }
        }
    }
}

/// The first copy in shard order becomes canonical; say so when the copies
/// disagree.
fn warn_on_divergence(id: &str, misplaced: &[&DocumentLocation]) {
    let Some((first, rest)) = misplaced.split_first() else {
        return;
    };
    let diverged: Vec<ShardIndex> = rest
        .iter()
        .filter(|other| !first.same_content(other))
        .map(|other| other.shard)
        .collect();
    if !diverged.is_empty() {
        warn!(
            id,
            canonical_shard = first.shard,
            diverged = ?diverged,
            "[vbd] Misplaced copies differ; restoring from the first"
        );
    }
}
