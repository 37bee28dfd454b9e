//! Runs every policy of a file against one store.
//!
//! Snapshot policies go first so that push replications can bind to the
//! snapshot tasks they just created. The first failure stops the run.

use serde::Serialize;
use tiersync_core::{ExecutionMode, Result};
use tiersync_reconciler::{
    RemoteStore, ReplicationOutcome, ReplicationPolicyManager, SnapshotPolicyManager,
    SnapshotPolicyOutcome,
};
use tracing::info;

use crate::config::Policies;

/// Outcome of every policy in a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    pub mode: ExecutionMode,
    pub changed: bool,
    pub snapshot_policies: Vec<SnapshotPolicyOutcome>,
    pub local_replications: Vec<ReplicationOutcome>,
    pub remote_replications: Vec<ReplicationOutcome>,
}

/// Reconciles validated policies in a fixed order.
pub struct Runner<'a, S: RemoteStore + ?Sized> {
    snapshots: SnapshotPolicyManager<'a, S>,
    replications: ReplicationPolicyManager<'a, S>,
    mode: ExecutionMode,
}

impl<'a, S: RemoteStore + ?Sized> Runner<'a, S> {
    pub const fn new(store: &'a S, mode: ExecutionMode) -> Self {
        Self {
            snapshots: SnapshotPolicyManager::new(store),
            replications: ReplicationPolicyManager::new(store),
            mode,
        }
    }

    /// # Errors
    ///
    /// The first policy that fails. Policies already reconciled keep their
    /// changes.
    pub fn run(&self, policies: &Policies) -> Result<RunReport> {
        info!(policies = policies.len(), mode = ?self.mode, "Starting run");

        let snapshot_policies = policies
            .snapshots
            .iter()
            .map(|policy| self.snapshots.reconcile(policy, self.mode))
            .collect::<Result<Vec<_>>>()?;

        let local_replications = policies
            .local_replications
            .iter()
            .map(|policy| self.replications.sync_local(policy, self.mode))
            .collect::<Result<Vec<_>>>()?;

        let remote_replications = policies
            .remote_replications
            .iter()
            .map(|policy| self.replications.sync_remote(policy, self.mode))
            .collect::<Result<Vec<_>>>()?;

        let changed = snapshot_policies.iter().any(|o| o.changed)
            || local_replications
                .iter()
                .chain(&remote_replications)
                .any(|o| o.changed);

        info!(changed, "Run finished");
        Ok(RunReport {
            mode: self.mode,
            changed,
            snapshot_policies,
            local_replications,
            remote_replications,
        })
    }
}
