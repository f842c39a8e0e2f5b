//! # vbd-sharding
//!
//! vbucket-aware document locator and repair engine.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! A cluster assigns every document to one of 64, 128 or 1024 vbuckets by
//! hashing its key, and every vbucket to one node. After an interrupted
//! rebalance or a buggy client, copies can end up on the wrong vbucket. This
//! crate:
//! - computes the vbucket a key belongs to (zlib CRC-32, same as the cluster)
//! - resolves the live vbucket to node map from a seed node
//! - finds every copy of a document (owner only, or a full scan)
//! - restores misplaced copies to their owner and deletes the strays,
//!   guarded by the cas captured at discovery
//!
//! ## Safety Rules
//!
//! | Rule | Enforcement |
//! |------|-------------|
//! | No duplicate restore | first resolved add wins per identifier |
//! | No lost documents | delete skipped while restore is pending |
//! | No blind deletes | cas from discovery guards every delete |
//! | No partial topology | any connection failure closes all sessions |
//!
//! ## Module Structure
//!
//! ```text
//! vbd-sharding/
//! ├── domain/          # Topology, outcomes, records, invariants
//! ├── algorithms/      # Shard hasher, resolver, locator, repair engine
//! ├── ports/           # API trait + node/sink traits
//! ├── adapters/        # Binary protocol, in-memory cluster, config, sinks
//! └── service/         # DoctorService + batch driver
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod domain;
pub mod ports;
pub mod service;

// Re-exports
pub use adapters::{
    ConnectionOverrides, InMemoryCluster, JsonLinesSink, MemcachedConnector, MemoryRecordSink,
    TomlConfigProvider,
};
pub use algorithms::{is_misplaced, locate, repair, resolve, shard_of, ClusterSession};
pub use domain::{
    AddOutcome, ConnectionConfig, DeleteOutcome, Document, DocumentLocation, GetOutcome,
    LocatorError, NodeAddress, OperationRecord, RecordAction, RecordOutcome, RepairAction,
    RepairOptions, RunResult, ShardCount, ShardIndex, Topology, TopologyDescriptor,
    DEFAULT_COLLECTION,
};
pub use ports::{DocumentDoctorApi, NodeClient, NodeConnector, RecordSink};
pub use service::{BatchDriver, BatchOptions, DoctorService};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
