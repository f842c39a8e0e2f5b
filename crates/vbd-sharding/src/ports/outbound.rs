//! # Outbound Ports
//!
//! Traits for external dependencies: cluster nodes and the record stream.

use crate::domain::{
    AddOutcome, ConnectionConfig, DeleteOutcome, GetOutcome, LocatorError, NodeAddress,
    OperationRecord, ShardIndex, TopologyDescriptor,
};
use async_trait::async_trait;
use std::sync::Arc;

/// One authenticated, bucket-scoped session to a cluster node.
///
/// `NotFound`, `AlreadyExists` and cas conflicts come back as outcomes;
/// everything else is an error.
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Address this session is connected to.
    fn address(&self) -> &NodeAddress;

    /// Fetch the cluster topology descriptor.
    async fn get_topology(&self) -> Result<TopologyDescriptor, LocatorError>;

    /// Read a document from `shard`.
    async fn get(
        &self,
        id: &str,
        collection: &str,
        shard: ShardIndex,
    ) -> Result<GetOutcome, LocatorError>;

    /// Create a document on `shard` unless one exists.
    async fn add(
        &self,
        id: &str,
        collection: &str,
        shard: ShardIndex,
        value: &[u8],
        flags: u32,
        datatype: u8,
    ) -> Result<AddOutcome, LocatorError>;

    /// Delete a document on `shard` if its cas still equals `cas`.
    async fn delete(
        &self,
        id: &str,
        collection: &str,
        shard: ShardIndex,
        cas: u64,
    ) -> Result<DeleteOutcome, LocatorError>;

    /// Release the session.
    async fn close(&self) -> Result<(), LocatorError>;
}

/// Opens node sessions: connect, authenticate, select bucket.
#[async_trait]
pub trait NodeConnector: Send + Sync {
    /// Open a session to `address` using the run's credentials and bucket.
    async fn connect(
        &self,
        address: &NodeAddress,
        config: &ConnectionConfig,
    ) -> Result<Arc<dyn NodeClient>, LocatorError>;
}

/// Destination for operation records.
pub trait RecordSink {
    /// Emit one record.
    fn emit(&mut self, record: &OperationRecord) -> Result<(), LocatorError>;
}
