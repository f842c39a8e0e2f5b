//! # Binary KV Protocol Adapter
//!
//! `NodeConnector`/`NodeClient` over the cluster's binary protocol on TCP:
//! HELLO, SASL PLAIN, SELECT_BUCKET handshake, then GET / ADD / DELETE with
//! collection-prefixed keys and the vbucket set to the target shard.

pub mod codec;
mod client;

pub use client::{MemcachedConnector, MemcachedNodeClient};
