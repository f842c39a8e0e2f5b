//! # vbd-doctor
//!
//! Operator CLI around `vbd-sharding`: reads identifiers, resolves the
//! cluster from a seed node, locates every copy of each document and
//! optionally moves misplaced copies to their correct vbucket.
//!
//! ## Output
//!
//! ```text
//! stdout  {"action":"locate","id":"abc123","shard":3,"expected_shard":2,"outcome":"found",...}
//!         {"action":"restore","id":"abc123","shard":2,"outcome":"created",...}
//!         {"summary":{"found":1,"not_found":0,...}}
//! stderr  tracing logs (VBD_LOG_LEVEL, -v)
//! ```
//!
//! Exit status: 0 clean run, 1 fatal error, 2 run completed with failures.

pub mod cli;
pub mod ids;
pub mod run;

pub use cli::{Args, Settings};
pub use run::execute;
