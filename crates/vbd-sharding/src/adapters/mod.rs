//! # Adapters Layer (Hexagonal Architecture)
//!
//! Implements the outbound ports: node sessions (binary protocol and
//! in-memory), configuration files and record sinks.

pub mod config;
pub mod in_memory;
pub mod memcached;
pub mod record_sink;

pub use config::{ConnectionOverrides, TomlConfigProvider};
pub use in_memory::{CallKind, ClientCall, InMemoryCluster, InMemoryNodeClient};
pub use memcached::{MemcachedConnector, MemcachedNodeClient};
pub use record_sink::{JsonLinesSink, MemoryRecordSink};
