//! Reconciliation engine for tiered snapshot and replication policies.
//!
//! This crate implements a declarative reconciliation pattern:
//!
//! - **Desired State**: a policy names tiers and retention counts
//! - **Actual State**: the owned tasks the remote store reports
//! - **Diff**: compare desired vs actual, per tier
//! - **Apply**: issue create, update and delete calls to converge
//!
//! # Key Concepts
//!
//! ## Ownership
//!
//! Tasks created here carry an `auto-<tier>-` naming schema. Only tasks whose
//! tag parses to a known tier are ever updated or deleted; everything else
//! on the remote is invisible to the reconciler.
//!
//! ## Check mode
//!
//! Every manager accepts an [`ExecutionMode`]. In check mode the remote
//! store is queried but never mutated, and the outcome reports what would
//! change.
//!
//! # Example
//!
//! ```
//! use tiersync_core::{ExecutionMode, RetentionMap};
//! use tiersync_reconciler::{InMemoryStore, SnapshotPolicyManager};
//!
//! let store = InMemoryStore::new();
//! let tiers = RetentionMap::from_raw([("hourly", 24), ("daily", 30)])?;
//!
//! let outcome = SnapshotPolicyManager::new(&store).sync("tank/data", &tiers, true, ExecutionMode::Apply)?;
//! assert_eq!(outcome.msg, "Policy synchronized: 2 created");
//! # Ok::<(), tiersync_core::Error>(())
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod api;
pub mod binder;
pub mod definition;
pub mod diff;
pub mod encryption;
pub mod heuristics;
pub mod replication;
pub mod resources;
pub mod snapshot;
pub mod store;

pub use tiersync_core::ExecutionMode;

// Re-export main types
pub use api::{ReplicationTaskApi, SnapshotTaskApi};
pub use binder::{Binding, SnapshotTaskBinder};
pub use definition::{DatasetContext, TierDefinition};
pub use diff::{DiffSummary, StateComparator, StateDiff};
pub use encryption::{EncryptionIntent, EncryptionOptions, EncryptionSettings, KeyFormat};
pub use heuristics::{longest_retention_tier, most_frequent_tier};
pub use replication::{
    LocalReplicationPolicy, RemoteReplicationPolicy, ReplicationAction, ReplicationOutcome,
    ReplicationPolicyManager,
};
pub use resources::{ManagedSnapshot, ReplicationTask, ReplicationTaskSpec, SnapshotTask, SnapshotTaskSpec};
pub use snapshot::{SnapshotPolicy, SnapshotPolicyManager, SnapshotPolicyOutcome};
pub use store::{Condition, Filter, InMemoryStore, RemoteStore, StoreError, StoreResult};
