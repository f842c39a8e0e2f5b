//! # Domain Entities
//!
//! Connection settings, the topology snapshot and the run counters.

use super::errors::{LocatorError, ShardIndex};
use super::invariants::{
    invariant_full_coverage, SELF_HOST_PLACEHOLDER, SUPPORTED_HASH_ALGORITHM,
};
use super::value_objects::{NodeAddress, ShardCount};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Connection settings shared by every node session of a run.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Seed node hostname.
    pub host: String,
    /// Seed node KV port (11210, or 11207 for TLS).
    pub port: u16,
    /// Encrypted transport.
    pub tls: bool,
    /// Bucket (namespace) to select.
    pub bucket: String,
    /// SASL username.
    pub username: String,
    /// SASL password.
    pub password: String,
    /// Per-operation transport timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 11210,
            tls: false,
            bucket: "default".to_string(),
            username: "Administrator".to_string(),
            password: "password".to_string(),
            timeout_secs: 10,
        }
    }
}

impl ConnectionConfig {
    /// Seed node address.
    pub fn seed_address(&self) -> NodeAddress {
        NodeAddress::new(self.host.clone(), self.port)
    }

    /// Reject settings that cannot possibly connect.
    pub fn validate(&self) -> Result<(), LocatorError> {
        if self.host.trim().is_empty() {
            return Err(LocatorError::Config("host must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(LocatorError::Config(format!(
                "{} is not a valid port number",
                self.port
            )));
        }
        if self.bucket.is_empty() {
            return Err(LocatorError::Config("bucket must not be empty".to_string()));
        }
        if self.timeout_secs == 0 {
            return Err(LocatorError::Config(
                "timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .field("bucket", &self.bucket)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Cluster topology as published by a node (wire format).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TopologyDescriptor {
    /// Config revision.
    #[serde(default)]
    pub rev: Option<i64>,
    /// Bucket name.
    #[serde(default)]
    pub name: Option<String>,
    /// vbucket server map.
    #[serde(rename = "vBucketServerMap")]
    pub server_map: ServerMap,
}

/// The `vBucketServerMap` section of a descriptor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServerMap {
    /// Hash algorithm name (`CRC`).
    #[serde(rename = "hashAlgorithm", default)]
    pub hash_algorithm: Option<String>,
    /// Replica count.
    #[serde(rename = "numReplicas", default)]
    pub num_replicas: Option<u32>,
    /// `host:port` entries.
    #[serde(rename = "serverList")]
    pub server_list: Vec<String>,
    /// Per shard: server indexes, primary first, -1 for none.
    #[serde(rename = "vBucketMap")]
    pub vbucket_map: Vec<Vec<i64>>,
}

impl TopologyDescriptor {
    /// Parse the JSON document returned by a node.
    pub fn from_json(bytes: &[u8]) -> Result<Self, LocatorError> {
        serde_json::from_slice(bytes).map_err(|e| LocatorError::MalformedTopology(e.to_string()))
    }

    /// Build a descriptor where shard `s` is owned by node `s % servers`.
    pub fn round_robin(servers: &[&str], shard_count: u16) -> Self {
        let node_count = servers.len().max(1) as i64;
        Self {
            rev: Some(1),
            name: None,
            server_map: ServerMap {
                hash_algorithm: Some(SUPPORTED_HASH_ALGORITHM.to_string()),
                num_replicas: Some(0),
                server_list: servers.iter().map(|s| s.to_string()).collect(),
                vbucket_map: (0..i64::from(shard_count))
                    .map(|shard| vec![shard % node_count])
                    .collect(),
            },
        }
    }
}

/// Immutable snapshot of the shard to node assignment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Topology {
    servers: Vec<NodeAddress>,
    owners: Vec<usize>,
    shard_count: ShardCount,
    revision: Option<i64>,
}

impl Topology {
    /// Interpret a descriptor fetched from `seed`.
    ///
    /// `$HOST` entries become the seed host. With `tls` every node is reached
    /// on the seed port since encrypted descriptors omit per-node ports.
    pub fn from_descriptor(
        descriptor: &TopologyDescriptor,
        seed: &NodeAddress,
        tls: bool,
    ) -> Result<Self, LocatorError> {
        let map = &descriptor.server_map;

        if let Some(algorithm) = &map.hash_algorithm {
            if !algorithm.eq_ignore_ascii_case(SUPPORTED_HASH_ALGORITHM) {
                return Err(LocatorError::MalformedTopology(format!(
                    "unsupported hash algorithm {algorithm:?}"
                )));
            }
        }

        let shard_count = ShardCount::new(map.vbucket_map.len())?;

        let servers = map
            .server_list
            .iter()
            .map(|entry| {
                let mut address = NodeAddress::parse(entry)?;
                if address.host == SELF_HOST_PLACEHOLDER {
                    address.host = seed.host.clone();
                }
                if tls {
                    address.port = seed.port;
                }
                Ok(address)
            })
            .collect::<Result<Vec<_>, LocatorError>>()?;

        let primaries: Vec<i64> = map
            .vbucket_map
            .iter()
            .map(|chain| chain.first().copied().unwrap_or(-1))
            .collect();
        invariant_full_coverage(&primaries, shard_count.get(), servers.len())?;

        Ok(Self {
            servers,
            owners: primaries.into_iter().map(|owner| owner as usize).collect(),
            shard_count,
            revision: descriptor.rev,
        })
    }

    /// Node addresses in server-list order.
    pub fn servers(&self) -> &[NodeAddress] {
        &self.servers
    }

    /// Shard count of the snapshot.
    pub fn shard_count(&self) -> ShardCount {
        self.shard_count
    }

    /// Config revision, when published.
    pub fn revision(&self) -> Option<i64> {
        self.revision
    }

    /// Server-list index of the primary owner of `shard`.
    pub fn owner_of(&self, shard: ShardIndex) -> Result<usize, LocatorError> {
        self.owners
            .get(usize::from(shard))
            .copied()
            .ok_or(LocatorError::ShardOutOfRange {
                shard: usize::from(shard),
                count: self.shard_count.get(),
            })
    }

    /// Primary owner index of every shard, by shard.
    pub fn owners(&self) -> &[usize] {
        &self.owners
    }
}

/// Counters accumulated over one batch.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunResult {
    /// Locations found (one identifier may contribute several).
    pub found: u64,
    /// Identifiers found nowhere.
    pub not_found: u64,
    /// Identifiers whose processing failed.
    pub failed: u64,
    /// Documents re-created on their correct shard.
    pub restored: u64,
    /// Restores that found the document already in place.
    pub already_present: u64,
    /// Misplaced copies removed.
    pub deleted: u64,
    /// Deletes refused because the copy changed.
    pub delete_conflicts: u64,
    /// Placeholder documents written in seed mode.
    pub seeded: u64,
}

impl RunResult {
    /// Create empty counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether every item completed without an operational failure.
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.delete_conflicts == 0
    }
}
