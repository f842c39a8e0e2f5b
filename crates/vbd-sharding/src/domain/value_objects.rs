//! # Domain Value Objects
//!
//! Immutable value types shared by the locator, the repair engine and the
//! node client port.

use super::errors::{LocatorError, ShardIndex};
use super::invariants::invariant_supported_shard_count;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Validated shard count of a topology snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ShardCount(u16);

impl ShardCount {
    /// Validate a raw shard count.
    pub fn new(count: usize) -> Result<Self, LocatorError> {
        invariant_supported_shard_count(count).map(Self)
    }

    /// Raw count.
    pub fn get(self) -> u16 {
        self.0
    }

    /// Every shard index in `[0, count)`, ascending.
    pub fn indices(self) -> impl Iterator<Item = ShardIndex> {
        0..self.0
    }

    /// Whether `shard` belongs to this topology.
    pub fn contains(self, shard: ShardIndex) -> bool {
        shard < self.0
    }
}

impl TryFrom<usize> for ShardCount {
    type Error = LocatorError;

    fn try_from(count: usize) -> Result<Self, Self::Error> {
        Self::new(count)
    }
}

impl fmt::Display for ShardCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Network address of a cluster node.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeAddress {
    /// Hostname or IP literal (IPv6 keeps its brackets).
    pub host: String,
    /// KV port.
    pub port: u16,
}

impl NodeAddress {
    /// Create a new address.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Parse a `host:port` server entry.
    pub fn parse(entry: &str) -> Result<Self, LocatorError> {
        let (host, port) = entry.rsplit_once(':').ok_or_else(|| {
            LocatorError::MalformedTopology(format!("server entry without port: {entry:?}"))
        })?;
        if host.is_empty() {
            return Err(LocatorError::MalformedTopology(format!(
                "server entry without host: {entry:?}"
            )));
        }
        let port = port.parse::<u16>().map_err(|e| {
            LocatorError::MalformedTopology(format!("bad port in {entry:?}: {e}"))
        })?;
        Ok(Self::new(host, port))
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A stored document as returned by a get.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Document {
    /// Raw value bytes.
    pub value: Vec<u8>,
    /// Version token (cas).
    pub cas: u64,
    /// Client flags.
    pub flags: u32,
    /// Datatype bits (JSON, xattr, ...).
    pub datatype: u8,
}

/// Outcome of a get.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GetOutcome {
    /// Document present.
    Found(Document),
    /// No document under this key on this shard.
    NotFound,
}

/// Outcome of an add.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddOutcome {
    /// Document created with the given cas.
    Created {
        /// cas of the new document
        cas: u64,
    },
    /// A document already exists under this key.
    AlreadyExists,
}

/// Outcome of a cas-guarded delete.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// Deleted.
    Deleted,
    /// The document was modified since its cas was captured.
    Conflict,
    /// The document is gone already.
    NotFound,
}

/// One place a document was found.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentLocation {
    /// Document identifier.
    pub id: String,
    /// Shard the copy was found on.
    pub shard: ShardIndex,
    /// Value bytes.
    pub value: Vec<u8>,
    /// cas captured at discovery time.
    pub cas: u64,
    /// Client flags.
    pub flags: u32,
    /// Datatype bits.
    pub datatype: u8,
}

impl DocumentLocation {
    /// Build a location from a fetched document.
    pub fn new(id: impl Into<String>, shard: ShardIndex, document: Document) -> Self {
        Self {
            id: id.into(),
            shard,
            value: document.value,
            cas: document.cas,
            flags: document.flags,
            datatype: document.datatype,
        }
    }

    /// Whether two copies carry the same content.
    pub fn same_content(&self, other: &DocumentLocation) -> bool {
        self.value == other.value && self.flags == other.flags && self.datatype == other.datatype
    }
}

/// Which remediation steps the repair engine may take.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RepairOptions {
    /// Re-create misplaced documents on their correct shard.
    pub restore: bool,
    /// Remove misplaced copies.
    pub delete: bool,
}

impl RepairOptions {
    /// Whether any remediation is enabled.
    pub fn any(&self) -> bool {
        self.restore || self.delete
    }
}

/// One step taken (or refused) by the repair engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RepairAction {
    /// Document created on its correct shard.
    Restored {
        /// Misplaced shard the value came from
        from_shard: ShardIndex,
        /// Correct shard
        to_shard: ShardIndex,
        /// cas of the new document
        cas: u64,
    },
    /// Correct shard already holds the document.
    AlreadyPresent {
        /// Misplaced shard the value came from
        from_shard: ShardIndex,
        /// Correct shard
        to_shard: ShardIndex,
    },
    /// Restore failed; the copy is left in place.
    RestoreFailed {
        /// Misplaced shard the value came from
        from_shard: ShardIndex,
        /// Correct shard
        to_shard: ShardIndex,
        /// Failure description
        reason: String,
    },
    /// Misplaced copy removed.
    Deleted {
        /// Shard the copy was removed from
        shard: ShardIndex,
        /// cas the delete was guarded with
        cas: u64,
    },
    /// Copy changed since discovery; not deleted.
    DeleteConflict {
        /// Shard of the copy
        shard: ShardIndex,
        /// Stale cas
        cas: u64,
    },
    /// Copy disappeared before the delete.
    DeleteMissing {
        /// Shard of the copy
        shard: ShardIndex,
    },
    /// Delete withheld because the restore has not landed.
    DeleteSkipped {
        /// Shard of the copy
        shard: ShardIndex,
    },
    /// Delete failed.
    DeleteFailed {
        /// Shard of the copy
        shard: ShardIndex,
        /// Failure description
        reason: String,
    },
}

impl RepairAction {
    /// Whether the step must be reported as an operational failure.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Self::RestoreFailed { .. }
                | Self::DeleteConflict { .. }
                | Self::DeleteSkipped { .. }
                | Self::DeleteFailed { .. }
        )
    }
}
