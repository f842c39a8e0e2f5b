//! # vbucket-doctor Test Suite
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/      # End-to-end flows against the in-memory cluster
//!     ├── e2e_repair.rs           # locate + restore + delete scenarios
//!     ├── topology_resolution.rs  # seed discovery, session lifecycle
//!     └── batch_flows.rs          # CLI-level runs, ids files, seed mode
//! tests/benches/
//! └── shard_benchmarks.rs         # hashing and full-scan throughput
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p vbd-tests
//! cargo test -p vbd-tests integration::e2e_repair
//! cargo bench -p vbd-tests
//! ```

pub mod integration;
