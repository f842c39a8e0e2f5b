//! In-Memory Cluster Adapter
//!
//! Implements `NodeConnector` and `NodeClient` over shared in-process maps.
//! Nodes answer only for the shards the descriptor assigns them and reply
//! NOT_MY_VBUCKET otherwise, like a real node would.

use crate::domain::{
    AddOutcome, ConnectionConfig, DeleteOutcome, Document, GetOutcome, LocatorError,
    NodeAddress, ShardIndex, TopologyDescriptor, DATATYPE_JSON, SELF_HOST_PLACEHOLDER,
};
use crate::ports::outbound::{NodeClient, NodeConnector};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Status a node returns for a shard it does not own.
pub const STATUS_NOT_MY_VBUCKET: u16 = 0x0007;

/// Kind of call seen by a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallKind {
    /// Topology fetch.
    Topology,
    /// Document read.
    Get,
    /// Document create.
    Add,
    /// Document delete.
    Delete,
    /// Session close.
    Close,
}

/// One journaled call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientCall {
    /// Node the call was sent to.
    pub node: NodeAddress,
    /// What was called.
    pub kind: CallKind,
    /// Target shard, for document calls.
    pub shard: Option<ShardIndex>,
    /// Document identifier, for document calls.
    pub id: Option<String>,
    /// cas passed with a delete.
    pub cas: Option<u64>,
}

type DocumentKey = (String, String, ShardIndex);

struct ClusterState {
    descriptor: TopologyDescriptor,
    /// server-list entries with `$HOST` substituted
    nodes: Vec<NodeAddress>,
    /// (collection, id, shard) -> document
    documents: RwLock<BTreeMap<DocumentKey, Document>>,
    next_cas: AtomicU64,
    credentials: RwLock<Option<(String, String)>>,
    failing_connects: RwLock<HashSet<NodeAddress>>,
    failing_operations: RwLock<HashSet<NodeAddress>>,
    calls: Mutex<Vec<ClientCall>>,
    open_sessions: AtomicUsize,
    connects: AtomicUsize,
}

impl ClusterState {
    fn allocate_cas(&self) -> u64 {
        self.next_cas.fetch_add(1, Ordering::SeqCst)
    }

    fn owner_of(&self, shard: ShardIndex) -> Option<&NodeAddress> {
        let owner = *self
            .descriptor
            .server_map
            .vbucket_map
            .get(usize::from(shard))?
            .first()?;
        usize::try_from(owner).ok().and_then(|i| self.nodes.get(i))
    }

    fn record(&self, call: ClientCall) {
        self.calls.lock().push(call);
    }
}

/// A simulated cluster.
///
/// Cloning yields another handle to the same cluster.
#[derive(Clone)]
pub struct InMemoryCluster {
    state: Arc<ClusterState>,
}

impl InMemoryCluster {
    /// Cluster of `nodes` (`host:port`) with shard `s` owned by node
    /// `s % nodes.len()`.
    pub fn new(shard_count: u16, nodes: &[&str]) -> Self {
        Self::from_descriptor(TopologyDescriptor::round_robin(nodes, shard_count), "localhost")
    }

    /// Cluster publishing `descriptor`; `$HOST` entries resolve to
    /// `seed_host`.
    ///
    /// The descriptor is served as-is, so invalid ones can be used to test
    /// resolution failures.
    pub fn from_descriptor(descriptor: TopologyDescriptor, seed_host: &str) -> Self {
        let nodes = descriptor
            .server_map
            .server_list
            .iter()
            .filter_map(|entry| NodeAddress::parse(entry).ok())
            .map(|mut address| {
                if address.host == SELF_HOST_PLACEHOLDER {
                    address.host = seed_host.to_string();
                }
                address
            })
            .collect();

        Self {
            state: Arc::new(ClusterState {
                descriptor,
                nodes,
                documents: RwLock::new(BTreeMap::new()),
                next_cas: AtomicU64::new(1000),
                credentials: RwLock::new(None),
                failing_connects: RwLock::new(HashSet::new()),
                failing_operations: RwLock::new(HashSet::new()),
                calls: Mutex::new(Vec::new()),
                open_sessions: AtomicUsize::new(0),
                connects: AtomicUsize::new(0),
            }),
        }
    }

    /// Store a document directly on `shard`, bypassing ownership. Returns
    /// its cas.
    pub fn insert(&self, shard: ShardIndex, collection: &str, id: &str, value: &[u8], flags: u32) -> u64 {
        let datatype = if serde_json::from_slice::<serde_json::Value>(value).is_ok() {
            DATATYPE_JSON
        } else {
            0
        };
        let cas = self.state.allocate_cas();
        self.state.documents.write().insert(
            (collection.to_string(), id.to_string(), shard),
            Document {
                value: value.to_vec(),
                cas,
                flags,
                datatype,
            },
        );
        cas
    }

    /// Document stored on `shard`, if any.
    pub fn document(&self, shard: ShardIndex, collection: &str, id: &str) -> Option<Document> {
        self.state
            .documents
            .read()
            .get(&(collection.to_string(), id.to_string(), shard))
            .cloned()
    }

    /// Shards holding `id`, ascending.
    pub fn shards_holding(&self, collection: &str, id: &str) -> Vec<ShardIndex> {
        self.state
            .documents
            .read()
            .keys()
            .filter(|(c, k, _)| c == collection && k == id)
            .map(|(_, _, shard)| *shard)
            .collect()
    }

    /// Simulate another writer: bump the cas of a stored document.
    pub fn touch(&self, shard: ShardIndex, collection: &str, id: &str) -> Option<u64> {
        let mut documents = self.state.documents.write();
        let document = documents.get_mut(&(collection.to_string(), id.to_string(), shard))?;
        document.cas = self.state.allocate_cas();
        Some(document.cas)
    }

    /// Reject sessions whose credentials differ from these.
    pub fn require_credentials(&self, username: &str, password: &str) {
        *self.state.credentials.write() = Some((username.to_string(), password.to_string()));
    }

    /// Make connection attempts to `address` fail.
    pub fn fail_connect_to(&self, address: &str) {
        if let Ok(address) = NodeAddress::parse(address) {
            self.state.failing_connects.write().insert(address);
        }
    }

    /// Make every call on sessions to `address` fail with an I/O error.
    pub fn fail_operations_on(&self, address: &str) {
        if let Ok(address) = NodeAddress::parse(address) {
            self.state.failing_operations.write().insert(address);
        }
    }

    /// Calls received so far, in order.
    pub fn calls(&self) -> Vec<ClientCall> {
        self.state.calls.lock().clone()
    }

    /// Forget the call journal.
    pub fn clear_calls(&self) {
        self.state.calls.lock().clear();
    }

    /// Sessions currently open.
    pub fn open_sessions(&self) -> usize {
        self.state.open_sessions.load(Ordering::SeqCst)
    }

    /// Connection attempts made so far.
    pub fn connects(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NodeConnector for InMemoryCluster {
    async fn connect(
        &self,
        address: &NodeAddress,
        config: &ConnectionConfig,
    ) -> Result<Arc<dyn NodeClient>, LocatorError> {
        self.state.connects.fetch_add(1, Ordering::SeqCst);

        if self.state.failing_connects.read().contains(address) {
            return Err(LocatorError::Connection {
                address: address.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        if !self.state.nodes.contains(address) {
            return Err(LocatorError::Connection {
                address: address.to_string(),
                reason: "no such node".to_string(),
            });
        }
        if let Some((username, password)) = self.state.credentials.read().as_ref() {
            if *username != config.username || *password != config.password {
                return Err(LocatorError::Authentication {
                    address: address.to_string(),
                    reason: "invalid credentials".to_string(),
                });
            }
        }

        self.state.open_sessions.fetch_add(1, Ordering::SeqCst);
        debug!(node = %address, "[vbd] in-memory session opened");
        Ok(Arc::new(InMemoryNodeClient {
            address: address.clone(),
            state: Arc::clone(&self.state),
            closed: AtomicBool::new(false),
        }))
    }
}

/// Session to one simulated node.
pub struct InMemoryNodeClient {
    address: NodeAddress,
    state: Arc<ClusterState>,
    closed: AtomicBool,
}

impl InMemoryNodeClient {
    fn check_available(&self) -> Result<(), LocatorError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(LocatorError::Io(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                format!("session to {} is closed", self.address),
            )));
        }
        if self.state.failing_operations.read().contains(&self.address) {
            return Err(LocatorError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                format!("{} reset the connection", self.address),
            )));
        }
        Ok(())
    }

    fn check_owner(&self, shard: ShardIndex) -> Result<(), LocatorError> {
        match self.state.owner_of(shard) {
            Some(owner) if *owner == self.address => Ok(()),
            _ => Err(LocatorError::Protocol {
                status: STATUS_NOT_MY_VBUCKET,
                message: format!("{} does not own shard {shard}", self.address),
            }),
        }
    }

    fn journal(&self, kind: CallKind, shard: Option<ShardIndex>, id: Option<&str>, cas: Option<u64>) {
        self.state.record(ClientCall {
            node: self.address.clone(),
            kind,
            shard,
            id: id.map(str::to_string),
            cas,
        });
    }

    fn key(collection: &str, id: &str, shard: ShardIndex) -> DocumentKey {
        (collection.to_string(), id.to_string(), shard)
    }
}

#[async_trait]
impl NodeClient for InMemoryNodeClient {
    fn address(&self) -> &NodeAddress {
        &self.address
    }

    async fn get_topology(&self) -> Result<TopologyDescriptor, LocatorError> {
        self.journal(CallKind::Topology, None, None, None);
        self.check_available()?;
        Ok(self.state.descriptor.clone())
    }

    async fn get(
        &self,
        id: &str,
        collection: &str,
        shard: ShardIndex,
    ) -> Result<GetOutcome, LocatorError> {
        self.journal(CallKind::Get, Some(shard), Some(id), None);
        self.check_available()?;
        self.check_owner(shard)?;

        Ok(self
            .state
            .documents
            .read()
            .get(&Self::key(collection, id, shard))
            .cloned()
            .map_or(GetOutcome::NotFound, GetOutcome::Found))
    }

    async fn add(
        &self,
        id: &str,
        collection: &str,
        shard: ShardIndex,
        value: &[u8],
        flags: u32,
        datatype: u8,
    ) -> Result<AddOutcome, LocatorError> {
        self.journal(CallKind::Add, Some(shard), Some(id), None);
        self.check_available()?;
        self.check_owner(shard)?;

        let mut documents = self.state.documents.write();
        let key = Self::key(collection, id, shard);
        if documents.contains_key(&key) {
            return Ok(AddOutcome::AlreadyExists);
        }
        let cas = self.state.allocate_cas();
        documents.insert(
            key,
            Document {
                value: value.to_vec(),
                cas,
                flags,
                datatype,
            },
        );
        Ok(AddOutcome::Created { cas })
    }

    async fn delete(
        &self,
        id: &str,
        collection: &str,
        shard: ShardIndex,
        cas: u64,
    ) -> Result<DeleteOutcome, LocatorError> {
        self.journal(CallKind::Delete, Some(shard), Some(id), Some(cas));
        self.check_available()?;
        self.check_owner(shard)?;

        let mut documents = self.state.documents.write();
        let key = Self::key(collection, id, shard);
        match documents.get(&key) {
            None => Ok(DeleteOutcome::NotFound),
            Some(stored) if cas != 0 && stored.cas != cas => Ok(DeleteOutcome::Conflict),
            Some(_) => {
                documents.remove(&key);
                Ok(DeleteOutcome::Deleted)
            }
        }
    }

    async fn close(&self) -> Result<(), LocatorError> {
        self.journal(CallKind::Close, None, None, None);
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.state.open_sessions.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
