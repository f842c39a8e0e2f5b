//! # Doctor Service
//!
//! Implements `DocumentDoctorApi` on top of a resolved [`ClusterSession`].

pub mod batch;

pub use batch::{BatchDriver, BatchOptions};

use crate::algorithms::{locate, repair, resolve, shard_of, ClusterSession};
use crate::domain::{
    AddOutcome, ConnectionConfig, DocumentLocation, LocatorError, RepairAction, RepairOptions,
    ShardCount, ShardIndex, DATATYPE_JSON, SEED_PLACEHOLDER_VALUE,
};
use crate::ports::inbound::DocumentDoctorApi;
use crate::ports::outbound::NodeConnector;
use async_trait::async_trait;
use tracing::debug;

/// Document doctor bound to one cluster session.
#[derive(Debug)]
pub struct DoctorService {
    session: ClusterSession,
}

impl DoctorService {
    /// Wrap an already resolved session.
    pub fn new(session: ClusterSession) -> Self {
        Self { session }
    }

    /// Resolve the cluster behind `config` and wrap it.
    pub async fn connect(
        config: &ConnectionConfig,
        connector: &dyn NodeConnector,
    ) -> Result<Self, LocatorError> {
        resolve(config, connector).await.map(Self::new)
    }

    /// Underlying session.
    pub fn session(&self) -> &ClusterSession {
        &self.session
    }

    /// Close every node session.
    pub async fn close(self) -> Result<(), LocatorError> {
        self.session.close().await
    }
}

#[async_trait]
impl DocumentDoctorApi for DoctorService {
    fn shard_count(&self) -> ShardCount {
        self.session.shard_count()
    }

    fn expected_shard(&self, id: &str) -> ShardIndex {
        shard_of(id.as_bytes(), self.session.shard_count())
    }

    async fn locate(
        &self,
        id: &str,
        collection: &str,
        search_all_shards: bool,
    ) -> Result<Vec<DocumentLocation>, LocatorError> {
        locate(&self.session, id, collection, search_all_shards).await
    }

    async fn repair(
        &self,
        id: &str,
        collection: &str,
        locations: &[DocumentLocation],
        options: RepairOptions,
    ) -> Vec<RepairAction> {
        repair(&self.session, id, collection, locations, options).await
    }

    async fn seed(
        &self,
        id: &str,
        collection: &str,
        shard: ShardIndex,
    ) -> Result<AddOutcome, LocatorError> {
        let client = self.session.client_for(shard)?;
        debug!(id, shard, node = %client.address(), "[vbd] Seeding placeholder");
        client
            .add(id, collection, shard, SEED_PLACEHOLDER_VALUE, 0, DATATYPE_JSON)
            .await
    }
}
