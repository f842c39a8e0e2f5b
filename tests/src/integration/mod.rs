//! # Integration Tests
//!
//! Cross-module flows: resolver, locator, repair engine and batch driver
//! wired together through the ports, with `InMemoryCluster` standing in for
//! the nodes.

pub mod batch_flows;
pub mod e2e_repair;
pub mod topology_resolution;
