//! # Domain Invariants
//!
//! Rules a topology snapshot must satisfy before any document is touched.

use super::errors::{LocatorError, ShardIndex};

/// Shard counts the cluster can be configured with.
pub const SUPPORTED_SHARD_COUNTS: [u16; 3] = [64, 128, 1024];

/// Host token in the server list meaning "the node you asked".
pub const SELF_HOST_PLACEHOLDER: &str = "$HOST";

/// Collection path addressed when none is given.
pub const DEFAULT_COLLECTION: &str = "_default._default";

/// Hash algorithm name the shard hasher reproduces.
pub const SUPPORTED_HASH_ALGORITHM: &str = "CRC";

/// Datatype bit marking a value as JSON.
pub const DATATYPE_JSON: u8 = 0x01;

/// Value written by seed mode.
pub const SEED_PLACEHOLDER_VALUE: &[u8] = b"{}";

/// Invariant: shard assignment is deterministic.
///
/// Same identifier + same shard count = same shard.
pub fn invariant_deterministic_assignment<F>(assign_fn: F, identifier: &[u8], shard_count: u16) -> bool
where
    F: Fn(&[u8], u16) -> ShardIndex,
{
    let first = assign_fn(identifier, shard_count);
    let second = assign_fn(identifier, shard_count);
    first == second
}

/// Invariant: the shard count is one the cluster supports.
pub fn invariant_supported_shard_count(shard_count: usize) -> Result<u16, LocatorError> {
    SUPPORTED_SHARD_COUNTS
        .iter()
        .copied()
        .find(|supported| usize::from(*supported) == shard_count)
        .ok_or(LocatorError::UnsupportedShardCount(shard_count))
}

/// Invariant: every shard in `[0, shard_count)` has exactly one primary owner
/// and that owner is a known node.
///
/// `owners[shard]` is the primary owner's index into the server list, or a
/// negative value when the cluster reports no owner.
pub fn invariant_full_coverage(
    owners: &[i64],
    shard_count: u16,
    node_count: usize,
) -> Result<(), LocatorError> {
    if owners.len() != usize::from(shard_count) {
        return Err(LocatorError::MalformedTopology(format!(
            "owner table has {} entries for {} shards",
            owners.len(),
            shard_count
        )));
    }

    for (shard, owner) in owners.iter().enumerate() {
        let known = usize::try_from(*owner).map_or(false, |index| index < node_count);
        if !known {
            return Err(LocatorError::UnmappedShard(shard as ShardIndex));
        }
    }

    Ok(())
}

/// Invariant: an operator supplied shard lies inside the topology.
pub fn invariant_shard_in_range(shard: usize, shard_count: u16) -> Result<ShardIndex, LocatorError> {
    if shard < usize::from(shard_count) {
        Ok(shard as ShardIndex)
    } else {
        Err(LocatorError::ShardOutOfRange {
            shard,
            count: shard_count,
        })
    }
}
