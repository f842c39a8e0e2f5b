//! # Domain Errors
//!
//! Error types for the locator and repair engine.
//!
//! Expected outcomes ("not found", "already exists", cas conflicts) are not
//! errors; they live in [`super::value_objects`] as tagged outcomes.

use thiserror::Error;

/// vbucket index (supported shard counts stay well inside u16).
pub type ShardIndex = u16;

/// Locator error types.
#[derive(Debug, Error)]
pub enum LocatorError {
    /// Could not open a session to a node.
    #[error("Connection to {address} failed: {reason}")]
    Connection {
        /// Node address (host:port)
        address: String,
        /// Underlying cause
        reason: String,
    },

    /// Credentials or bucket access rejected.
    #[error("Authentication failed on {address}: {reason}")]
    Authentication {
        /// Node address (host:port)
        address: String,
        /// Server supplied reason
        reason: String,
    },

    /// Topology descriptor could not be interpreted.
    #[error("Malformed topology: {0}")]
    MalformedTopology(String),

    /// Shard count is not one the cluster supports.
    #[error("Unsupported shard count: {0} (expected 64, 128 or 1024)")]
    UnsupportedShardCount(usize),

    /// A shard has no usable primary owner.
    #[error("No owner for shard {0}")]
    UnmappedShard(ShardIndex),

    /// Shard index outside of the topology.
    #[error("Shard {shard} out of range for shard count {count}")]
    ShardOutOfRange {
        /// Requested shard
        shard: usize,
        /// Shard count of the topology
        count: u16,
    },

    /// Server answered with an unexpected status.
    #[error("Protocol error (status 0x{status:04x}): {message}")]
    Protocol {
        /// Response status code
        status: u16,
        /// Server supplied context
        message: String,
    },

    /// Transport failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Operation exceeded the transport timeout.
    #[error("Operation timed out after {0}s")]
    Timeout(u64),

    /// Capability not available on this connection.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Bad operator input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl LocatorError {
    /// Whether this error invalidates the whole run rather than one item.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::Authentication { .. }
                | Self::MalformedTopology(_)
                | Self::UnsupportedShardCount(_)
                | Self::UnmappedShard(_)
                | Self::InvalidInput(_)
                | Self::Config(_)
        )
    }
}
