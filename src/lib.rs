#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # tiersync
//!
//! Declarative tiered snapshot and replication policies for storage servers.
//!
//! This crate wires the reconciliation engine to the outside world: policy
//! files, the REST store adapter and the CLI's JSON output.

pub mod cli;
pub mod config;
pub mod http_store;
pub mod json;
pub mod runner;

// Re-export the workspace crates
pub use tiersync_core;
pub use tiersync_reconciler;

pub use config::{Policies, PolicyFile, StoreConfig};
pub use http_store::HttpStore;
pub use runner::{RunReport, Runner};
