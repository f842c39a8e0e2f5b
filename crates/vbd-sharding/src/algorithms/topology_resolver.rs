//! # Topology Resolver
//!
//! Turns a seed node into a [`ClusterSession`]: the validated topology plus
//! one open session per distinct node, routed by shard.
//!
//! ## Algorithm
//!
//! 1. Connect to the seed, fetch the descriptor, close the seed session
//! 2. Validate the descriptor (shard count, hash algorithm, full coverage)
//! 3. Open one session per distinct node address
//! 4. Route every shard to its primary owner's session
//!
//! Any failure aborts resolution and closes whatever was already opened.

use crate::domain::{
    ConnectionConfig, LocatorError, NodeAddress, ShardCount, ShardIndex, Topology,
};
use crate::ports::outbound::{NodeClient, NodeConnector};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Open sessions for every node of a resolved topology.
pub struct ClusterSession {
    topology: Topology,
    connections: Vec<Arc<dyn NodeClient>>,
    /// shard -> index into `connections`
    routes: Vec<usize>,
}

impl ClusterSession {
    /// Assemble a session from a topology and the connection opened for each
    /// server-list entry (`node_connections[node] -> connections index`).
    fn from_parts(
        topology: Topology,
        connections: Vec<Arc<dyn NodeClient>>,
        node_connections: &[usize],
    ) -> Self {
        let routes = topology
            .owners()
            .iter()
            .map(|owner| node_connections[*owner])
            .collect();

        Self {
            topology,
            connections,
            routes,
        }
    }

    /// The topology snapshot this session was built from.
    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    /// Shard count of the snapshot.
    pub fn shard_count(&self) -> ShardCount {
        self.topology.shard_count()
    }

    /// Session owning `shard`.
    pub fn client_for(&self, shard: ShardIndex) -> Result<&Arc<dyn NodeClient>, LocatorError> {
        let index = self
            .routes
            .get(usize::from(shard))
            .ok_or(LocatorError::ShardOutOfRange {
                shard: usize::from(shard),
                count: self.shard_count().get(),
            })?;
        Ok(&self.connections[*index])
    }

    /// Number of open node sessions.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Close every node session.
    ///
    /// All sessions are closed even if some fail; the first failure is
    /// returned.
    pub async fn close(self) -> Result<(), LocatorError> {
        debug!(connections = self.connections.len(), "[vbd] Closing cluster session");
        close_all(&self.connections).await
    }
}

impl std::fmt::Debug for ClusterSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterSession")
            .field("topology", &self.topology)
            .field("connections", &self.connections.len())
            .finish()
    }
}

/// Discover the cluster from the seed node in `config` and connect to every
/// node in it.
pub async fn resolve(
    config: &ConnectionConfig,
    connector: &dyn NodeConnector,
) -> Result<ClusterSession, LocatorError> {
    config.validate()?;

    let seed = config.seed_address();
    info!(seed = %seed, bucket = %config.bucket, tls = config.tls, "[vbd] Fetching cluster topology");

    let seed_client = connector.connect(&seed, config).await?;
    let descriptor = seed_client.get_topology().await;
    if let Err(e) = seed_client.close().await {
        warn!(node = %seed, error = %e, "[vbd] Failed to close seed session");
    }
    let topology = Topology::from_descriptor(&descriptor?, &seed, config.tls)?;

    info!(
        shards = topology.shard_count().get(),
        nodes = topology.servers().len(),
        rev = ?topology.revision(),
        "[vbd] Topology resolved"
    );

    let mut connections: Vec<Arc<dyn NodeClient>> = Vec::new();
    let mut by_address: HashMap<NodeAddress, usize> = HashMap::new();
    let mut node_connections = Vec::with_capacity(topology.servers().len());

    for address in topology.servers() {
        if let Some(index) = by_address.get(address) {
            node_connections.push(*index);
            continue;
        }

        debug!(node = %address, "[vbd] Connecting to node");
        match connector.connect(address, config).await {
            Ok(client) => {
                by_address.insert(address.clone(), connections.len());
                node_connections.push(connections.len());
                connections.push(client);
            }
            Err(e) => {
                warn!(node = %address, error = %e, "[vbd] Node connection failed, aborting");
                let _ = close_all(&connections).await;
                return Err(e);
            }
        }
    }

    Ok(ClusterSession::from_parts(topology, connections, &node_connections))
}

async fn close_all(connections: &[Arc<dyn NodeClient>]) -> Result<(), LocatorError> {
    let mut first_error = None;
    for client in connections {
        if let Err(e) = client.close().await {
            warn!(node = %client.address(), error = %e, "[vbd] Failed to close node session");
            first_error.get_or_insert(e);
        }
    }
    first_error.map_or(Ok(()), Err)
}
