//! # Inbound Ports
//!
//! API trait defining what the document doctor can do.

use crate::domain::{
    AddOutcome, DocumentLocation, LocatorError, RepairAction, RepairOptions, ShardCount,
    ShardIndex,
};
use async_trait::async_trait;

/// Document doctor API - inbound port.
#[async_trait]
pub trait DocumentDoctorApi: Send + Sync {
    /// Shard count of the resolved topology.
    fn shard_count(&self) -> ShardCount;

    /// Shard `id` hashes to.
    fn expected_shard(&self, id: &str) -> ShardIndex;

    /// Every location of `id` (computed shard only, or all shards).
    async fn locate(
        &self,
        id: &str,
        collection: &str,
        search_all_shards: bool,
    ) -> Result<Vec<DocumentLocation>, LocatorError>;

    /// Restore and/or delete the misplaced copies among `locations`.
    async fn repair(
        &self,
        id: &str,
        collection: &str,
        locations: &[DocumentLocation],
        options: RepairOptions,
    ) -> Vec<RepairAction>;

    /// Write the placeholder document for `id` directly on `shard`.
    async fn seed(
        &self,
        id: &str,
        collection: &str,
        shard: ShardIndex,
    ) -> Result<AddOutcome, LocatorError>;
}
