//! # Algorithms Module
//!
//! Hashing, topology resolution, lookup and repair.

pub mod locator;
pub mod repair;
pub mod shard_hasher;
pub mod topology_resolver;

pub use locator::locate;
pub use repair::repair;
pub use shard_hasher::{is_misplaced, shard_of};
pub use topology_resolver::{resolve, ClusterSession};
