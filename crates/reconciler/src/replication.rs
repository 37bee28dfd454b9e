//! Replication policy reconciliation.
//!
//! Replication tasks are keyed by name. A present policy creates the task if
//! it is missing and updates it only when a declared field drifted; an
//! absent policy deletes it. Push policies first bind to the source
//! dataset's snapshot tasks, and fail before any replication mutation when
//! one of them is missing.

use serde::Serialize;
use serde_json::Value;
use tiersync_core::naming::{naming_schemas, replication_task_name};
use tiersync_core::{
    Error, ExecutionMode, PolicyState, ResourceId, ResourceKind, Result, RetentionMap, Tier,
};
use tracing::{debug, info};

use crate::api::ReplicationTaskApi;
use crate::binder::SnapshotTaskBinder;
use crate::encryption::EncryptionIntent;
use crate::heuristics::{longest_retention_tier, most_frequent_tier};
use crate::resources::{
    Lifetime, PullRetention, ReplicationTarget, ReplicationTask, ReplicationTaskSpec,
};
use crate::store::RemoteStore;

/// Push replication between two datasets on the same machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalReplicationPolicy {
    pub name: String,
    pub source_dataset: String,
    pub target_dataset: String,
    pub tiers: Vec<Tier>,
    pub recursive: bool,
    pub encryption: EncryptionIntent,
    pub state: PolicyState,
}

impl LocalReplicationPolicy {
    /// Present policy named after the source dataset, preserving source
    /// encryption.
    pub fn new(
        source_dataset: impl Into<String>,
        target_dataset: impl Into<String>,
        tiers: Vec<Tier>,
    ) -> Self {
        let source_dataset = source_dataset.into();
        Self {
            name: replication_task_name(&source_dataset),
            source_dataset,
            target_dataset: target_dataset.into(),
            tiers,
            recursive: false,
            encryption: EncryptionIntent::PreserveSource,
            state: PolicyState::Present,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub const fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    #[must_use]
    pub fn with_encryption(mut self, encryption: EncryptionIntent) -> Self {
        self.encryption = encryption;
        self
    }

    #[must_use]
    pub const fn with_state(mut self, state: PolicyState) -> Self {
        self.state = state;
        self
    }

    /// Distinct tiers in frequency order.
    fn validated_tiers(&self) -> Result<Vec<Tier>> {
        let mut tiers = self.tiers.clone();
        tiers.sort_unstable();
        tiers.dedup();
        if tiers.is_empty() {
            Err(Error::EmptyPolicy)
        } else {
            Ok(tiers)
        }
    }

    fn target(&self) -> ReplicationTarget {
        ReplicationTarget {
            name: self.name.clone(),
            source_dataset: self.source_dataset.clone(),
            target_dataset: self.target_dataset.clone(),
            recursive: self.recursive,
            encryption: self.encryption.settings(),
        }
    }
}

/// Pull replication from a remote machine over SSH.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteReplicationPolicy {
    pub name: String,
    pub source_dataset: String,
    pub target_dataset: String,
    pub ssh_credentials: u64,
    pub tiers: RetentionMap,
    pub recursive: bool,
    pub encryption: EncryptionIntent,
    pub state: PolicyState,
}

impl RemoteReplicationPolicy {
    /// Present policy named after the source dataset, preserving source
    /// encryption.
    pub fn new(
        source_dataset: impl Into<String>,
        target_dataset: impl Into<String>,
        ssh_credentials: u64,
        tiers: RetentionMap,
    ) -> Self {
        let source_dataset = source_dataset.into();
        Self {
            name: replication_task_name(&source_dataset),
            source_dataset,
            target_dataset: target_dataset.into(),
            ssh_credentials,
            tiers,
            recursive: false,
            encryption: EncryptionIntent::PreserveSource,
            state: PolicyState::Present,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub const fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    #[must_use]
    pub fn with_encryption(mut self, encryption: EncryptionIntent) -> Self {
        self.encryption = encryption;
        self
    }

    #[must_use]
    pub const fn with_state(mut self, state: PolicyState) -> Self {
        self.state = state;
        self
    }

    fn target(&self) -> ReplicationTarget {
        ReplicationTarget {
            name: self.name.clone(),
            source_dataset: self.source_dataset.clone(),
            target_dataset: self.target_dataset.clone(),
            recursive: self.recursive,
            encryption: self.encryption.settings(),
        }
    }

    /// Task spec derived from the tier map.
    ///
    /// # Errors
    ///
    /// [`Error::EmptyPolicy`] when the map has no tier.
    pub fn to_spec(&self) -> Result<ReplicationTaskSpec> {
        let trigger = most_frequent_tier(&self.tiers).ok_or(Error::EmptyPolicy)?;
        let (longest, count) = longest_retention_tier(&self.tiers).ok_or(Error::EmptyPolicy)?;

        let retention = PullRetention {
            schedule: trigger.schedule(),
            simple_lifetime: (count, longest.unit()),
            lifetimes: self
                .tiers
                .iter()
                .map(|(tier, count)| Lifetime::for_tier(tier, count))
                .collect(),
        };

        Ok(ReplicationTaskSpec::remote_pull(
            self.target(),
            self.ssh_credentials,
            naming_schemas(self.tiers.tiers()),
            retention,
        ))
    }
}

/// What a replication reconciliation did, or would do in check mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplicationAction {
    Create,
    Update,
    Delete,
    /// Nothing to do.
    Keep,
}

/// Result of reconciling one replication policy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplicationOutcome {
    pub name: String,
    pub action: ReplicationAction,
    pub changed: bool,
    pub msg: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub drifted_fields: Vec<String>,
    /// Planned spec, reported in check mode with the key masked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<ReplicationTaskSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<ReplicationTask>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<ResourceId>,
}

impl ReplicationOutcome {
    fn new(name: &str, action: ReplicationAction, msg: String) -> Self {
        Self {
            name: name.to_string(),
            action,
            changed: !matches!(action, ReplicationAction::Keep),
            msg,
            drifted_fields: Vec::new(),
            config: None,
            task: None,
            task_id: None,
        }
    }
}

/// Reconciles replication policies against a [`RemoteStore`].
pub struct ReplicationPolicyManager<'a, S: RemoteStore + ?Sized> {
    store: &'a S,
    api: ReplicationTaskApi<'a, S>,
}

impl<'a, S: RemoteStore + ?Sized> ReplicationPolicyManager<'a, S> {
    pub const fn new(store: &'a S) -> Self {
        Self {
            store,
            api: ReplicationTaskApi::new(store),
        }
    }

    /// Converge a push replication policy.
    ///
    /// # Errors
    ///
    /// Validation, binding, remote or decode failure. Binding failures
    /// happen before any replication task is touched.
    pub fn sync_local(
        &self,
        policy: &LocalReplicationPolicy,
        mode: ExecutionMode,
    ) -> Result<ReplicationOutcome> {
        info!(
            name = %policy.name,
            source = %policy.source_dataset,
            target = %policy.target_dataset,
            ?mode,
            "Reconciling local replication policy"
        );

        if policy.state == PolicyState::Absent {
            return self.remove(&policy.name, mode);
        }

        let tiers = policy.validated_tiers()?;
        let binding = SnapshotTaskBinder::new(self.store).bind(&policy.source_dataset, &tiers)?;

        let spec = ReplicationTaskSpec::local_push(
            policy.target(),
            binding.task_ids(),
            naming_schemas(tiers),
        );
        self.converge(&spec, mode)
    }

    /// Converge a pull replication policy.
    ///
    /// # Errors
    ///
    /// Validation, remote or decode failure.
    pub fn sync_remote(
        &self,
        policy: &RemoteReplicationPolicy,
        mode: ExecutionMode,
    ) -> Result<ReplicationOutcome> {
        info!(
            name = %policy.name,
            source = %policy.source_dataset,
            target = %policy.target_dataset,
            ?mode,
            "Reconciling remote replication policy"
        );

        if policy.state == PolicyState::Absent {
            return self.remove(&policy.name, mode);
        }

        let spec = policy.to_spec()?;
        self.converge(&spec, mode)
    }

    /// Create `spec` if missing, update it if drifted, otherwise keep it.
    ///
    /// # Errors
    ///
    /// Remote or decode failure.
    pub fn converge(
        &self,
        spec: &ReplicationTaskSpec,
        mode: ExecutionMode,
    ) -> Result<ReplicationOutcome> {
        let name = spec.name.as_str();
        let existing = self.api.query_by_name(name)?;

        let Some(task) = existing else {
            if mode.is_check() {
                let mut outcome = ReplicationOutcome::new(
                    name,
                    ReplicationAction::Create,
                    format!("Would create replication task '{name}'"),
                );
                outcome.config = Some(spec.redacted());
                return Ok(outcome);
            }

            let created = self.api.create(spec)?;
            info!(name, id = %created.id, "Replication task created");
            let mut outcome = ReplicationOutcome::new(
                name,
                ReplicationAction::Create,
                format!("Replication task '{name}' created"),
            );
            outcome.task = Some(created.redacted());
            return Ok(outcome);
        };

        let desired = serde_json::to_value(spec)
            .map_err(|e| Error::malformed_resource(ResourceKind::ReplicationTask, e))?;
        let drifted = drifted_fields(&desired, &task);

        if drifted.is_empty() {
            debug!(name, id = %task.id, "Replication task up to date");
            let mut outcome = ReplicationOutcome::new(
                name,
                ReplicationAction::Keep,
                format!("Replication task '{name}' is up to date"),
            );
            outcome.task_id = Some(task.id);
            return Ok(outcome);
        }

        debug!(name, id = %task.id, fields = ?drifted, "Replication task drifted");

        if mode.is_check() {
            let mut outcome = ReplicationOutcome::new(
                name,
                ReplicationAction::Update,
                format!("Would update replication task '{name}'"),
            );
            outcome.drifted_fields = drifted;
            outcome.config = Some(spec.redacted());
            outcome.task_id = Some(task.id);
            return Ok(outcome);
        }

        let updated = self.api.update(task.id, spec)?;
        info!(name, id = %updated.id, "Replication task updated");
        let mut outcome = ReplicationOutcome::new(
            name,
            ReplicationAction::Update,
            format!("Replication task '{name}' updated"),
        );
        outcome.drifted_fields = drifted;
        outcome.task = Some(updated.redacted());
        Ok(outcome)
    }

    /// Delete the task named `name` if it exists.
    ///
    /// # Errors
    ///
    /// Remote or decode failure.
    pub fn remove(&self, name: &str, mode: ExecutionMode) -> Result<ReplicationOutcome> {
        let Some(task) = self.api.query_by_name(name)? else {
            return Ok(ReplicationOutcome::new(
                name,
                ReplicationAction::Keep,
                format!("Replication task '{name}' does not exist"),
            ));
        };

        let msg = if mode.is_check() {
            format!("Would delete replication task '{name}'")
        } else {
            self.api.delete(&task)?;
            info!(name, id = %task.id, "Replication task deleted");
            format!("Replication task '{name}' deleted")
        };

        let mut outcome = ReplicationOutcome::new(name, ReplicationAction::Delete, msg);
        outcome.task_id = Some(task.id);
        Ok(outcome)
    }
}

/// Declared fields of `desired` whose value differs on `task`.
///
/// Fields the remote adds are ignored. A write-only `encryption_key` the
/// remote does not echo back is not treated as drift.
pub fn drifted_fields(desired: &Value, task: &ReplicationTask) -> Vec<String> {
    let Value::Object(fields) = desired else {
        return Vec::new();
    };

    fields
        .iter()
        .filter(|(key, _)| key.as_str() != "name")
        .filter(|(key, wanted)| match task.attributes.get(key.as_str()) {
            None => !(key.as_str() == "encryption_key" || wanted.is_null()),
            Some(actual) => !values_match(wanted, actual),
        })
        .map(|(key, _)| key.clone())
        .collect()
}

/// Whether `actual` satisfies `wanted`.
///
/// Objects match on the keys `wanted` declares. A bare id matches an
/// expanded object carrying that id, as remote stores return referenced
/// resources expanded.
fn values_match(wanted: &Value, actual: &Value) -> bool {
    match (wanted, actual) {
        (Value::Array(w), Value::Array(a)) => {
            w.len() == a.len() && w.iter().zip(a).all(|(w, a)| values_match(w, a))
        }
        (Value::Object(w), Value::Object(a)) => w
            .iter()
            .all(|(k, v)| a.get(k).is_some_and(|actual| values_match(v, actual))),
        (Value::Number(_), Value::Object(a)) => a.get("id") == Some(wanted),
        _ => wanted == actual,
    }
}
