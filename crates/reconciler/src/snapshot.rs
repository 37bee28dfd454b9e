//! Snapshot policy reconciliation.
//!
//! A snapshot policy declares, for one dataset, which tiers should have a
//! periodic snapshot task and how many snapshots each keeps. The manager
//! queries the owned tasks, diffs them against the policy and applies the
//! diff: creates first, then updates, then deletes. The first failing call
//! aborts the run; mutations already made stay in place.

use std::collections::BTreeMap;

use serde::Serialize;
use tiersync_core::{Error, ExecutionMode, PolicyState, ResourceId, Result, RetentionMap};
use tracing::{debug, info};

use crate::api::SnapshotTaskApi;
use crate::definition::{DatasetContext, TierDefinition};
use crate::diff::{DiffSummary, StateComparator, StateDiff};
use crate::resources::SnapshotTask;
use crate::store::RemoteStore;

/// Desired snapshot tiers for one dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotPolicy {
    pub dataset: String,
    pub tiers: RetentionMap,
    pub recursive: bool,
    pub state: PolicyState,
}

impl SnapshotPolicy {
    /// Build a policy, rejecting an empty tier map when present.
    ///
    /// # Errors
    ///
    /// [`Error::EmptyPolicy`].
    pub fn new(
        dataset: impl Into<String>,
        tiers: RetentionMap,
        recursive: bool,
        state: PolicyState,
    ) -> Result<Self> {
        let tiers = match state {
            PolicyState::Present => tiers.require_non_empty()?,
            PolicyState::Absent => tiers,
        };
        Ok(Self {
            dataset: dataset.into(),
            tiers,
            recursive,
            state,
        })
    }
}

/// Result of reconciling one snapshot policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SnapshotPolicyOutcome {
    pub dataset: String,
    pub changed: bool,
    pub msg: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub created_tasks: Vec<SnapshotTask>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub updated_tasks: Vec<SnapshotTask>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub deleted_task_ids: Vec<ResourceId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_mode_changes: Option<DiffSummary>,
}

/// Joins non-zero counts into a message, or reports no change.
fn describe(prefix: &str, counts: &[(usize, &str)]) -> String {
    let parts: Vec<String> = counts
        .iter()
        .filter(|(n, _)| *n > 0)
        .map(|(n, what)| format!("{n} {what}"))
        .collect();

    if parts.is_empty() {
        "No changes needed".to_string()
    } else {
        format!("{prefix}: {}", parts.join(", "))
    }
}

/// Reconciles snapshot policies against a [`RemoteStore`].
pub struct SnapshotPolicyManager<'a, S: RemoteStore + ?Sized> {
    api: SnapshotTaskApi<'a, S>,
}

impl<'a, S: RemoteStore + ?Sized> SnapshotPolicyManager<'a, S> {
    pub const fn new(store: &'a S) -> Self {
        Self {
            api: SnapshotTaskApi::new(store),
        }
    }

    /// Converge `policy` according to its state.
    ///
    /// # Errors
    ///
    /// Validation, remote or decode failure.
    pub fn reconcile(
        &self,
        policy: &SnapshotPolicy,
        mode: ExecutionMode,
    ) -> Result<SnapshotPolicyOutcome> {
        match policy.state {
            PolicyState::Present => {
                self.sync(&policy.dataset, &policy.tiers, policy.recursive, mode)
            }
            PolicyState::Absent => self.remove(&policy.dataset, mode),
        }
    }

    /// Compute the diff for `tiers` on `dataset` without mutating anything.
    ///
    /// # Errors
    ///
    /// [`Error::EmptyPolicy`] before any remote call, or a
    /// remote or decode failure.
    pub fn plan(&self, dataset: &str, tiers: &RetentionMap, recursive: bool) -> Result<StateDiff> {
        if tiers.is_empty() {
            return Err(Error::EmptyPolicy);
        }

        let ctx = DatasetContext::new(dataset, recursive);
        let desired: BTreeMap<_, _> = TierDefinition::from_map(tiers)
            .into_iter()
            .map(|def| (def.tier, def.to_spec(&ctx)))
            .collect();

        let current = self.api.query_managed(dataset)?;
        debug!(
            dataset,
            owned = current.len(),
            desired = desired.len(),
            "Fetched snapshot state"
        );

        Ok(StateComparator::calculate(&current, &desired))
    }

    /// Make the owned tasks of `dataset` match `tiers`.
    ///
    /// # Errors
    ///
    /// Validation, remote or decode failure. On a remote failure the
    /// mutations made before it are not rolled back.
    pub fn sync(
        &self,
        dataset: &str,
        tiers: &RetentionMap,
        recursive: bool,
        mode: ExecutionMode,
    ) -> Result<SnapshotPolicyOutcome> {
        info!(dataset, tiers = tiers.len(), ?mode, "Reconciling snapshot policy");

        let diff = self.plan(dataset, tiers, recursive)?;

        if mode.is_check() {
            let summary = diff.summary();
            let msg = describe(
                "Would synchronize policy",
                &[
                    (summary.to_create.len(), "would be created"),
                    (summary.to_update.len(), "would be updated"),
                    (summary.deletions(), "would be deleted"),
                ],
            );
            info!(dataset, changes = diff.len(), "{msg}");
            return Ok(SnapshotPolicyOutcome {
                dataset: dataset.to_string(),
                changed: !diff.is_empty(),
                msg,
                check_mode_changes: Some(summary),
                ..SnapshotPolicyOutcome::default()
            });
        }

        let outcome = self.apply(dataset, diff)?;
        info!(dataset, changed = outcome.changed, "{}", outcome.msg);
        Ok(outcome)
    }

    fn apply(&self, dataset: &str, diff: StateDiff) -> Result<SnapshotPolicyOutcome> {
        let changed = !diff.is_empty();

        // 1. Create missing tiers
        let created_tasks = diff
            .to_create
            .iter()
            .map(|planned| self.api.create(&planned.spec))
            .collect::<Result<Vec<_>>>()?;

        // 2. Update drifted tiers
        let updated_tasks = diff
            .to_update
            .iter()
            .map(|planned| {
                debug!(id = %planned.id, tier = %planned.tier, fields = ?planned.fields, "Drift detected");
                self.api.update(planned.id, &planned.spec)
            })
            .collect::<Result<Vec<_>>>()?;

        // 3. Delete undesired tiers, then surplus claims
        let deleted_task_ids = diff
            .to_delete
            .iter()
            .chain(&diff.to_prune)
            .map(|planned| self.api.delete(planned.id).map(|()| planned.id))
            .collect::<Result<Vec<_>>>()?;

        let msg = describe(
            "Policy synchronized",
            &[
                (created_tasks.len(), "created"),
                (updated_tasks.len(), "updated"),
                (deleted_task_ids.len(), "deleted"),
            ],
        );

        Ok(SnapshotPolicyOutcome {
            dataset: dataset.to_string(),
            changed,
            msg,
            created_tasks,
            updated_tasks,
            deleted_task_ids,
            check_mode_changes: None,
        })
    }

    /// Delete every owned task of `dataset`, whatever its tier.
    ///
    /// # Errors
    ///
    /// Remote or decode failure.
    pub fn remove(&self, dataset: &str, mode: ExecutionMode) -> Result<SnapshotPolicyOutcome> {
        info!(dataset, ?mode, "Removing snapshot policy");

        let ids: Vec<ResourceId> = self
            .api
            .query_managed(dataset)?
            .into_iter()
            .map(|managed| managed.id)
            .collect();

        if mode.is_check() {
            return Ok(SnapshotPolicyOutcome {
                dataset: dataset.to_string(),
                changed: !ids.is_empty(),
                msg: format!("Would delete {} snapshot tasks", ids.len()),
                check_mode_changes: Some(DiffSummary {
                    to_delete: ids,
                    ..DiffSummary::default()
                }),
                ..SnapshotPolicyOutcome::default()
            });
        }

        let deleted_task_ids = ids
            .into_iter()
            .map(|id| self.api.delete(id).map(|()| id))
            .collect::<Result<Vec<_>>>()?;

        let msg = format!("Deleted {} snapshot tasks", deleted_task_ids.len());
        info!(dataset, deleted = deleted_task_ids.len(), "{msg}");

        Ok(SnapshotPolicyOutcome {
            dataset: dataset.to_string(),
            changed: !deleted_task_ids.is_empty(),
            msg,
            deleted_task_ids,
            ..SnapshotPolicyOutcome::default()
        })
    }
}
